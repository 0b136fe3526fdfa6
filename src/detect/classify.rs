use super::raw::{CodeFamily, CodeReadout, DetectionPayload, FaceReadout, RawDetection};
use crate::track::{ObservedBarcode, ObservedPerson};

/// A classified detection.
#[derive(Clone, Debug, PartialEq)]
pub enum Entity {
    Person(ObservedPerson),
    Code(ObservedBarcode),
    Discarded,
}

impl Entity {
    pub fn is_discarded(&self) -> bool {
        matches!(self, Entity::Discarded)
    }
}

/// Map a junk-filtered detection to a typed entity.
///
/// Unknown kinds, unlisted symbologies and malformed code payloads are `Discarded`;
/// none of them is an error.
pub fn classify(detection: &RawDetection) -> Entity {
    match &detection.payload {
        DetectionPayload::Face(face) => Entity::Person(person_from(face)),
        DetectionPayload::Code(code) => match code_from(code) {
            Some(barcode) => Entity::Code(barcode),
            None => Entity::Discarded,
        },
        DetectionPayload::SalientRegion { .. } | DetectionPayload::Other { .. } => {
            Entity::Discarded
        }
    }
}

fn person_from(face: &FaceReadout) -> ObservedPerson {
    ObservedPerson {
        track_id: face.track_id,
        roll: face.roll,
        yaw: face.yaw,
        pitch: face.pitch,
    }
}

fn code_from(code: &CodeReadout) -> Option<ObservedBarcode> {
    let family = code.symbol.family()?;
    let barcode = match family {
        CodeFamily::Qr => {
            let payload = code.decoded.as_deref().filter(|s| !s.is_empty())?;
            ObservedBarcode {
                symbol: code.symbol.clone(),
                payload: payload.to_string(),
                descriptor: code.corrected_payload.clone(),
                version: code.version,
            }
        }
        // PDF417 has no decoded-string field; the payload is a textual rendering of the
        // error-corrected bytes.
        CodeFamily::Pdf417 => {
            let bytes = code.corrected_payload.as_ref().filter(|b| !b.is_empty())?;
            ObservedBarcode {
                symbol: code.symbol.clone(),
                payload: hex::encode(bytes),
                descriptor: Some(bytes.clone()),
                version: None,
            }
        }
        CodeFamily::Ean
        | CodeFamily::Code39To128
        | CodeFamily::Codabar
        | CodeFamily::DataMatrix => {
            ObservedBarcode {
                symbol: code.symbol.clone(),
                payload: String::new(),
                descriptor: None,
                version: None,
            }
        }
    };
    Some(barcode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::raw::{BoundingBox, SymbolType};

    fn code(symbol: SymbolType) -> RawDetection {
        RawDetection::code(BoundingBox::new(0.1, 0.1, 0.2, 0.2), CodeReadout::new(symbol))
    }

    #[test]
    fn face_becomes_person_with_angles() {
        let det = RawDetection::face(
            BoundingBox::new(0.3, 0.3, 0.2, 0.2),
            FaceReadout {
                track_id: 17,
                roll: Some(0.25),
                yaw: None,
                pitch: Some(-0.1),
            },
        );
        match classify(&det) {
            Entity::Person(p) => {
                assert_eq!(p.track_id, 17);
                assert_eq!(p.roll, Some(0.25));
                assert_eq!(p.yaw, None);
                assert_eq!(p.pitch, Some(-0.1));
            }
            other => panic!("expected person, got {:?}", other),
        }
    }

    #[test]
    fn qr_copies_decoded_bytes_and_version() {
        let det = RawDetection::code(
            BoundingBox::default(),
            CodeReadout::new(SymbolType::Qr)
                .with_decoded("https://example.org/item/1")
                .with_corrected_payload(vec![0x41, 0x42])
                .with_version(3),
        );
        let Entity::Code(c) = classify(&det) else {
            panic!("expected code");
        };
        assert_eq!(c.payload, "https://example.org/item/1");
        assert_eq!(c.descriptor, Some(vec![0x41, 0x42]));
        assert_eq!(c.version, Some(3));
    }

    #[test]
    fn qr_without_decoded_string_is_discarded() {
        assert!(classify(&code(SymbolType::MicroQr)).is_discarded());
        let empty = RawDetection::code(
            BoundingBox::default(),
            CodeReadout::new(SymbolType::Qr).with_decoded(""),
        );
        assert!(classify(&empty).is_discarded());
    }

    #[test]
    fn pdf417_payload_comes_from_corrected_bytes() {
        let det = RawDetection::code(
            BoundingBox::default(),
            CodeReadout::new(SymbolType::MicroPdf417).with_corrected_payload(vec![0xde, 0xad]),
        );
        let Entity::Code(c) = classify(&det) else {
            panic!("expected code");
        };
        assert_eq!(c.payload, "dead");
        assert_eq!(c.descriptor, Some(vec![0xde, 0xad]));
        assert!(classify(&code(SymbolType::Pdf417)).is_discarded());
    }

    #[test]
    fn every_allowlisted_family_yields_a_code() {
        let samples = [
            RawDetection::code(
                BoundingBox::default(),
                CodeReadout::new(SymbolType::Qr).with_decoded("q"),
            ),
            RawDetection::code(
                BoundingBox::default(),
                CodeReadout::new(SymbolType::Pdf417).with_corrected_payload(vec![1]),
            ),
            code(SymbolType::Ean13),
            code(SymbolType::Code128),
            code(SymbolType::Codabar),
            code(SymbolType::DataMatrix),
        ];
        let families: Vec<_> = samples
            .iter()
            .map(|det| match classify(det) {
                Entity::Code(c) => c.symbol.family().expect("allowlisted"),
                other => panic!("expected code, got {:?}", other),
            })
            .collect();
        assert_eq!(families, CodeFamily::ALL.to_vec());
    }

    #[test]
    fn linear_codes_forward_with_empty_payload() {
        for symbol in [SymbolType::Ean8, SymbolType::Code39, SymbolType::Code93] {
            let Entity::Code(c) = classify(&code(symbol.clone())) else {
                panic!("expected code for {symbol}");
            };
            assert!(c.payload.is_empty());
            assert_eq!(c.symbol, symbol);
        }
    }

    #[test]
    fn body_detections_are_discarded() {
        for tag in ["catBody", "dogBody", "humanBody"] {
            assert!(classify(&code(SymbolType::from_provider(tag))).is_discarded(), "{tag}");
        }
    }

    #[test]
    fn salient_and_other_kinds_are_discarded() {
        let region = RawDetection::salient_region(BoundingBox::new(0.1, 0.1, 0.5, 0.5), 4);
        assert!(classify(&region).is_discarded());
        assert!(classify(&RawDetection::other(BoundingBox::default(), "text")).is_discarded());
    }
}
