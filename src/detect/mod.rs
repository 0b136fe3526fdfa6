//! Detection taxonomy and the classification stages.
//!
//! Raw provider output flows `junk::is_junk` → `classify::classify`; what survives is a
//! typed `Entity` for the tracker.

mod backend;
mod backends;
pub mod capability;
pub mod classify;
pub mod junk;
mod raw;

pub use backend::FrameAnalyzer;
pub use backends::StubAnalyzer;
pub use capability::{negotiate, DetectionCapability};
pub use classify::{classify, Entity};
pub use junk::is_junk;
pub use raw::{
    BoundingBox, CodeFamily, CodeReadout, DetectionKind, DetectionPayload, FaceReadout,
    RawDetection, SymbolType, NO_IDENTITY,
};
