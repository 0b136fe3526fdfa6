use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity value a frame classifier assigns when it has no identity for a region.
pub const NO_IDENTITY: u64 = 0;

/// Bounding box in normalized (0..1) frame coordinates, origin at the top left.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl BoundingBox {
    pub const FULL_FRAME: BoundingBox = BoundingBox {
        x: 0.0,
        y: 0.0,
        w: 1.0,
        h: 1.0,
    };

    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Exactly the whole frame. No tolerance: classifiers emit the literal unit rect.
    pub fn is_full_frame(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.w == 1.0 && self.h == 1.0
    }
}

/// Unclassified provider output for one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct RawDetection {
    pub bounds: BoundingBox,
    pub payload: DetectionPayload,
}

impl RawDetection {
    pub fn salient_region(bounds: BoundingBox, identity: u64) -> Self {
        Self {
            bounds,
            payload: DetectionPayload::SalientRegion { identity },
        }
    }

    pub fn face(bounds: BoundingBox, face: FaceReadout) -> Self {
        Self {
            bounds,
            payload: DetectionPayload::Face(face),
        }
    }

    pub fn code(bounds: BoundingBox, code: CodeReadout) -> Self {
        Self {
            bounds,
            payload: DetectionPayload::Code(code),
        }
    }

    pub fn other(bounds: BoundingBox, tag: impl Into<String>) -> Self {
        Self {
            bounds,
            payload: DetectionPayload::Other { tag: tag.into() },
        }
    }

    pub fn kind(&self) -> DetectionKind {
        match &self.payload {
            DetectionPayload::SalientRegion { .. } => DetectionKind::SalientRegion,
            DetectionPayload::Face(_) => DetectionKind::FaceLike,
            DetectionPayload::Code(_) => DetectionKind::MachineReadableCode,
            DetectionPayload::Other { .. } => DetectionKind::Other,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DetectionKind {
    SalientRegion,
    FaceLike,
    MachineReadableCode,
    Other,
}

/// Kind-specific fields of a raw detection.
#[derive(Clone, Debug, PartialEq)]
pub enum DetectionPayload {
    /// Attention/objectness region. `identity` is `NO_IDENTITY` when unassigned.
    SalientRegion { identity: u64 },
    Face(FaceReadout),
    Code(CodeReadout),
    /// Anything the provider reports that this pipeline has no use for.
    Other { tag: String },
}

/// Face-like detection. Angles are in radians and only present when the provider
/// estimated them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FaceReadout {
    /// Stable per-track id assigned by the provider.
    pub track_id: i64,
    pub roll: Option<f32>,
    pub yaw: Option<f32>,
    pub pitch: Option<f32>,
}

/// Machine-readable-code detection as the provider reported it.
#[derive(Clone, Debug, PartialEq)]
pub struct CodeReadout {
    pub symbol: SymbolType,
    /// Decoded string, when the symbology has one.
    pub decoded: Option<String>,
    /// Raw error-corrected payload bytes.
    pub corrected_payload: Option<Vec<u8>>,
    /// Symbol version (QR family).
    pub version: Option<u32>,
}

impl CodeReadout {
    pub fn new(symbol: SymbolType) -> Self {
        Self {
            symbol,
            decoded: None,
            corrected_payload: None,
            version: None,
        }
    }

    pub fn with_decoded(mut self, decoded: impl Into<String>) -> Self {
        self.decoded = Some(decoded.into());
        self
    }

    pub fn with_corrected_payload(mut self, bytes: Vec<u8>) -> Self {
        self.corrected_payload = Some(bytes);
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }
}

/// Symbol type tag carried by code detections.
///
/// Providers report body/animal detections on the same metadata channel; those and
/// anything else unrecognised land in `Unlisted`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolType {
    Qr,
    MicroQr,
    Pdf417,
    MicroPdf417,
    Ean8,
    Ean13,
    Code39,
    Code39Mod43,
    Code93,
    Code128,
    Codabar,
    DataMatrix,
    Unlisted(String),
}

/// Allowlisted symbology families.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodeFamily {
    Qr,
    Pdf417,
    Ean,
    Code39To128,
    Codabar,
    DataMatrix,
}

impl CodeFamily {
    pub const ALL: [CodeFamily; 6] = [
        CodeFamily::Qr,
        CodeFamily::Pdf417,
        CodeFamily::Ean,
        CodeFamily::Code39To128,
        CodeFamily::Codabar,
        CodeFamily::DataMatrix,
    ];
}

impl SymbolType {
    /// Parse a provider symbol identifier such as `org.iso.QRCode`, `org.gs1.EAN-13`
    /// or a bare `qr`. Never fails; unknown identifiers become `Unlisted`.
    pub fn from_provider(identifier: &str) -> Self {
        let last = identifier.rsplit('.').next().unwrap_or(identifier);
        let normalized: String = last
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "qr" | "qrcode" => SymbolType::Qr,
            "microqr" | "microqrcode" => SymbolType::MicroQr,
            "pdf417" => SymbolType::Pdf417,
            "micropdf417" => SymbolType::MicroPdf417,
            "ean8" => SymbolType::Ean8,
            "ean13" => SymbolType::Ean13,
            "code39" => SymbolType::Code39,
            "code39mod43" => SymbolType::Code39Mod43,
            "code93" => SymbolType::Code93,
            "code128" => SymbolType::Code128,
            "codabar" => SymbolType::Codabar,
            "datamatrix" => SymbolType::DataMatrix,
            _ => SymbolType::Unlisted(identifier.to_string()),
        }
    }

    pub fn family(&self) -> Option<CodeFamily> {
        match self {
            SymbolType::Qr | SymbolType::MicroQr => Some(CodeFamily::Qr),
            SymbolType::Pdf417 | SymbolType::MicroPdf417 => Some(CodeFamily::Pdf417),
            SymbolType::Ean8 | SymbolType::Ean13 => Some(CodeFamily::Ean),
            SymbolType::Code39
            | SymbolType::Code39Mod43
            | SymbolType::Code93
            | SymbolType::Code128 => Some(CodeFamily::Code39To128),
            SymbolType::Codabar => Some(CodeFamily::Codabar),
            SymbolType::DataMatrix => Some(CodeFamily::DataMatrix),
            SymbolType::Unlisted(_) => None,
        }
    }
}

impl fmt::Display for SymbolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolType::Unlisted(id) => write!(f, "unlisted({})", id),
            other => write!(f, "{:?}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_identifiers_parse_to_symbols() {
        assert_eq!(SymbolType::from_provider("org.iso.QRCode"), SymbolType::Qr);
        assert_eq!(SymbolType::from_provider("org.iso.MicroQR"), SymbolType::MicroQr);
        assert_eq!(SymbolType::from_provider("org.gs1.EAN-13"), SymbolType::Ean13);
        assert_eq!(SymbolType::from_provider("com.intermec.Code93"), SymbolType::Code93);
        assert_eq!(SymbolType::from_provider("DataMatrix"), SymbolType::DataMatrix);
        assert_eq!(
            SymbolType::from_provider("catBody"),
            SymbolType::Unlisted("catBody".to_string())
        );
    }

    #[test]
    fn only_unlisted_symbols_lack_a_family() {
        assert_eq!(SymbolType::Code39Mod43.family(), Some(CodeFamily::Code39To128));
        assert_eq!(SymbolType::MicroPdf417.family(), Some(CodeFamily::Pdf417));
        assert_eq!(SymbolType::from_provider("humanBody").family(), None);
    }

    #[test]
    fn full_frame_is_exact() {
        assert!(BoundingBox::FULL_FRAME.is_full_frame());
        assert!(!BoundingBox::new(0.0, 0.0, 1.0, 0.999).is_full_frame());
        assert!(!BoundingBox::new(0.001, 0.0, 1.0, 1.0).is_full_frame());
    }
}
