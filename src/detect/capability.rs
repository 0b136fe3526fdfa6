use serde::{Deserialize, Serialize};

use super::raw::{DetectionPayload, RawDetection, SymbolType};

/// Detection kinds a frame source can be asked to produce.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionCapability {
    Faces,
    Codes,
    SalientRegions,
    HumanBody,
    CatBody,
    DogBody,
}

impl DetectionCapability {
    /// Body kinds are never enabled; they cost source work and nothing consumes them.
    pub fn is_excluded(self) -> bool {
        matches!(
            self,
            DetectionCapability::HumanBody
                | DetectionCapability::CatBody
                | DetectionCapability::DogBody
        )
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "faces" | "face" => Some(DetectionCapability::Faces),
            "codes" | "code" => Some(DetectionCapability::Codes),
            "salient_regions" | "salient" => Some(DetectionCapability::SalientRegions),
            "human_body" => Some(DetectionCapability::HumanBody),
            "cat_body" => Some(DetectionCapability::CatBody),
            "dog_body" => Some(DetectionCapability::DogBody),
            _ => None,
        }
    }

    /// Capability a raw detection belongs to, if any.
    pub fn of(detection: &RawDetection) -> Option<Self> {
        match &detection.payload {
            DetectionPayload::Face(_) => Some(DetectionCapability::Faces),
            DetectionPayload::SalientRegion { .. } => Some(DetectionCapability::SalientRegions),
            DetectionPayload::Code(code) => match &code.symbol {
                SymbolType::Unlisted(tag) => match tag.to_ascii_lowercase().as_str() {
                    "humanbody" => Some(DetectionCapability::HumanBody),
                    "catbody" => Some(DetectionCapability::CatBody),
                    "dogbody" => Some(DetectionCapability::DogBody),
                    _ => None,
                },
                _ => Some(DetectionCapability::Codes),
            },
            DetectionPayload::Other { .. } => None,
        }
    }
}

/// Pick the kinds to enable for a session: what was requested and the source offers,
/// minus the excluded body kinds. Order follows `requested`.
pub fn negotiate(
    requested: &[DetectionCapability],
    available: &[DetectionCapability],
) -> Vec<DetectionCapability> {
    let mut enabled = Vec::new();
    for cap in requested {
        if cap.is_excluded() || !available.contains(cap) || enabled.contains(cap) {
            continue;
        }
        enabled.push(*cap);
    }
    enabled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::raw::{BoundingBox, CodeReadout};

    #[test]
    fn negotiation_strips_bodies_and_unavailable_kinds() {
        let requested = [
            DetectionCapability::Faces,
            DetectionCapability::HumanBody,
            DetectionCapability::Codes,
            DetectionCapability::Faces,
        ];
        let available = [
            DetectionCapability::Codes,
            DetectionCapability::Faces,
            DetectionCapability::HumanBody,
            DetectionCapability::DogBody,
        ];
        assert_eq!(
            negotiate(&requested, &available),
            vec![DetectionCapability::Faces, DetectionCapability::Codes]
        );
        assert!(negotiate(&[DetectionCapability::Codes], &[DetectionCapability::Faces]).is_empty());
    }

    #[test]
    fn body_tags_map_to_body_capabilities() {
        let det = RawDetection::code(
            BoundingBox::default(),
            CodeReadout::new(SymbolType::from_provider("dogBody")),
        );
        assert_eq!(DetectionCapability::of(&det), Some(DetectionCapability::DogBody));
        let qr = RawDetection::code(BoundingBox::default(), CodeReadout::new(SymbolType::Qr));
        assert_eq!(DetectionCapability::of(&qr), Some(DetectionCapability::Codes));
    }

    #[test]
    fn parse_accepts_config_names() {
        assert_eq!(DetectionCapability::parse(" Faces "), Some(DetectionCapability::Faces));
        assert_eq!(DetectionCapability::parse("codes"), Some(DetectionCapability::Codes));
        assert_eq!(DetectionCapability::parse("plates"), None);
    }
}
