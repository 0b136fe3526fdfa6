//! Real-time sensor pipeline for item scanning.
//!
//! Ingests a continuous stream of camera frames and metadata detections, applies
//! backpressure so processing never falls behind the sensor, classifies raw detections
//! into people and machine-readable codes, reports each one the first time it is seen,
//! and throttles a preview frame to the display at a bounded rate.
//!
//! # Architecture
//!
//! ```text
//! FrameSource ──on_frame──▶ FrameIngestPipeline ──(gate)──▶ worker: analyzer → junk filter
//!      │                         │                              → classifier → tracker
//!      └──on_detections──────────┤                                          │
//!                                └──RenderThrottle──▶ UI thread ◀──novelty──┘
//! ```
//!
//! Invariants held by construction:
//!
//! 1. **Never block the sensor**: entry points only try-acquire a gate and send on a
//!    bounded channel.
//! 2. **Drop, don't queue**: at most one classification pass per gate is in flight;
//!    frames arriving meanwhile are discarded.
//! 3. **Self-healing**: the gate is released when a pass ends, including by error or panic.
//! 4. **One-shot novelty**: an entity fires at most once per session.
//! 5. **Bounded preview**: at most one display frame per render interval, in capture order.
//!
//! # Module Structure
//!
//! - `frame`: frame ownership (SensorSample, Frame, DisplayFrame, Timestamp)
//! - `detect`: detection taxonomy, junk filter, classifier, analyzer trait
//! - `track`: observed set and novelty tracking
//! - `pipeline`: busy gate, render throttle, ingest pipeline
//! - `ingest`: frame sources and session lifecycle
//! - `config`: file + environment configuration

pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod pipeline;
pub mod track;

pub use detect::{
    classify, is_junk, negotiate, BoundingBox, CodeReadout, DetectionCapability, Entity,
    FaceReadout, FrameAnalyzer, RawDetection, StubAnalyzer, SymbolType,
};
pub use frame::{DisplayFrame, Frame, SensorSample, Timestamp};
pub use ingest::{FrameSource, ScanSession, SensorSink, SyntheticConfig, SyntheticSource};
pub use pipeline::{
    BusyGate, FrameIngestPipeline, PipelineOptions, PipelineStats, RenderThrottle, UiConsumer,
};
pub use track::{
    EntityTracker, InteractionLauncher, LogLauncher, NoveltyEvent, NoveltySink, ObservationLog,
    ObservedBarcode, ObservedMark, ObservedPerson, ObservedSet, ObservedSnapshot,
};
