use serde::{Serialize, Serializer};
use std::collections::HashSet;
use std::sync::Arc;

use crate::detect::SymbolType;

/// A face track. Two records with the same `track_id` are the same physical track.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ObservedPerson {
    pub track_id: i64,
    pub roll: Option<f32>,
    pub yaw: Option<f32>,
    pub pitch: Option<f32>,
}

/// A machine-readable code. Equality is payload plus raw descriptor bytes.
///
/// The symbology is not part of a code's identity. Symbologies that decode to an empty
/// payload (EAN, Code39 to 128, Codabar, DataMatrix) without a descriptor are therefore
/// all one code for the session: the first one seen is new, the rest are not.
#[derive(Clone, Debug, Serialize)]
pub struct ObservedBarcode {
    pub symbol: SymbolType,
    pub payload: String,
    #[serde(serialize_with = "serialize_hex_opt")]
    pub descriptor: Option<Vec<u8>>,
    pub version: Option<u32>,
}

impl ObservedBarcode {
    /// Same logical code: equal payloads, and equal descriptors when both carry one.
    ///
    /// This is what the tracker deduplicates on. A missing descriptor matches any, which
    /// is not transitive, so `PartialEq` keeps the exact payload + descriptor comparison.
    pub fn same_code_as(&self, other: &ObservedBarcode) -> bool {
        if self.payload != other.payload {
            return false;
        }
        match (&self.descriptor, &other.descriptor) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}

impl PartialEq for ObservedBarcode {
    fn eq(&self, other: &Self) -> bool {
        self.payload == other.payload && self.descriptor == other.descriptor
    }
}

fn serialize_hex_opt<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
    match bytes {
        Some(b) => s.serialize_some(&hex::encode(b)),
        None => s.serialize_none(),
    }
}

/// Everything observed since the session started. Append-only; `clear` is the
/// caller's session reset.
#[derive(Debug, Default)]
pub struct ObservedSet {
    persons: Vec<ObservedPerson>,
    person_ids: HashSet<i64>,
    barcodes: Vec<ObservedBarcode>,
}

impl ObservedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_person(&self, track_id: i64) -> bool {
        self.person_ids.contains(&track_id)
    }

    pub fn contains_barcode(&self, barcode: &ObservedBarcode) -> bool {
        self.barcodes.iter().any(|seen| seen.same_code_as(barcode))
    }

    pub(crate) fn push_person(&mut self, person: ObservedPerson) {
        self.person_ids.insert(person.track_id);
        self.persons.push(person);
    }

    pub(crate) fn push_barcode(&mut self, barcode: ObservedBarcode) {
        self.barcodes.push(barcode);
    }

    /// Current end of both collections.
    pub fn mark(&self) -> ObservedMark {
        ObservedMark {
            persons: self.persons.len(),
            barcodes: self.barcodes.len(),
        }
    }

    /// Forget everything recorded after `mark`.
    pub(crate) fn truncate(&mut self, mark: ObservedMark) {
        let from = mark.persons.min(self.persons.len());
        for person in self.persons.drain(from..) {
            self.person_ids.remove(&person.track_id);
        }
        self.barcodes.truncate(mark.barcodes);
    }

    pub fn persons(&self) -> &[ObservedPerson] {
        &self.persons
    }

    pub fn barcodes(&self) -> &[ObservedBarcode] {
        &self.barcodes
    }

    pub fn len(&self) -> usize {
        self.persons.len() + self.barcodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.persons.clear();
        self.person_ids.clear();
        self.barcodes.clear();
    }

    pub fn snapshot(&self) -> Arc<ObservedSnapshot> {
        Arc::new(ObservedSnapshot {
            persons: self.persons.clone(),
            barcodes: self.barcodes.clone(),
        })
    }
}

/// A position in an `ObservedSet`, taken before a pass that may have to be undone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObservedMark {
    persons: usize,
    barcodes: usize,
}

/// Immutable copy of an `ObservedSet`, safe to hand to other threads.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ObservedSnapshot {
    pub persons: Vec<ObservedPerson>,
    pub barcodes: Vec<ObservedBarcode>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn barcode(payload: &str, descriptor: Option<&[u8]>) -> ObservedBarcode {
        ObservedBarcode {
            symbol: SymbolType::Qr,
            payload: payload.to_string(),
            descriptor: descriptor.map(|d| d.to_vec()),
            version: None,
        }
    }

    #[test]
    fn barcode_identity_ignores_missing_descriptor() {
        let with = barcode("ABC", Some(b"\x01"));
        let without = barcode("ABC", None);
        let other_desc = barcode("ABC", Some(b"\x02"));
        assert!(with.same_code_as(&without));
        assert!(!with.same_code_as(&other_desc));
        assert!(!with.same_code_as(&barcode("XYZ", Some(b"\x01"))));
    }

    #[test]
    fn equality_is_payload_and_descriptor_not_version() {
        let mut a = barcode("ABC", Some(b"\x01"));
        let b = barcode("ABC", Some(b"\x01"));
        a.version = Some(4);
        a.symbol = SymbolType::MicroQr;
        assert_eq!(a, b);
    }

    #[test]
    fn equality_is_stricter_than_identity_on_missing_descriptor() {
        let with = barcode("ABC", Some(b"\x01"));
        let without = barcode("ABC", None);
        assert!(with.same_code_as(&without));
        assert_ne!(with, without);
    }

    #[test]
    fn empty_payload_codes_share_one_identity_across_symbologies() {
        let code = |symbol| ObservedBarcode {
            symbol,
            payload: String::new(),
            descriptor: None,
            version: None,
        };
        let mut set = ObservedSet::new();
        set.push_barcode(code(SymbolType::Ean13));
        assert!(set.contains_barcode(&code(SymbolType::DataMatrix)));
        assert!(set.contains_barcode(&code(SymbolType::Codabar)));
    }

    #[test]
    fn truncate_forgets_people_and_codes_after_mark() {
        let mut set = ObservedSet::new();
        set.push_barcode(barcode("kept", None));
        let mark = set.mark();
        set.push_barcode(barcode("gone", None));
        set.push_person(ObservedPerson {
            track_id: 5,
            roll: None,
            yaw: None,
            pitch: None,
        });

        set.truncate(mark);
        assert_eq!(set.mark(), mark);
        assert!(set.contains_barcode(&barcode("kept", None)));
        assert!(!set.contains_barcode(&barcode("gone", None)));
        assert!(!set.contains_person(5));
    }

    #[test]
    fn snapshot_is_detached_from_later_growth() {
        let mut set = ObservedSet::new();
        set.push_barcode(barcode("one", None));
        let snap = set.snapshot();
        set.push_person(ObservedPerson {
            track_id: 3,
            roll: None,
            yaw: None,
            pitch: None,
        });
        assert_eq!(snap.barcodes.len(), 1);
        assert!(snap.persons.is_empty());
        assert_eq!(set.len(), 2);
        assert!(set.contains_person(3));

        set.clear();
        assert!(set.is_empty());
        assert!(!set.contains_person(3));
    }

    #[test]
    fn barcode_serializes_descriptor_as_hex() -> anyhow::Result<()> {
        let json = serde_json::to_string(&barcode("ABC", Some(&[0xab, 0x01])))?;
        assert!(json.contains("\"descriptor\":\"ab01\""));
        Ok(())
    }
}
