//! Novelty tracking.
//!
//! `EntityTracker` owns the session's `ObservedSet`. It decides whether an entity has
//! been seen before, records it when it has not, and fans the novelty out to
//! subscribers. Codes are also handed to the interaction launcher.

mod observed;

pub use observed::{ObservedBarcode, ObservedMark, ObservedPerson, ObservedSet, ObservedSnapshot};

use serde::Serialize;

use crate::detect::Entity;

/// Emitted once per newly observed entity.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoveltyEvent {
    Person(ObservedPerson),
    Code(ObservedBarcode),
}

/// Novelty subscriber. Called synchronously on the thread that runs `observe`.
pub trait NoveltySink: Send {
    fn on_novelty(&mut self, event: &NoveltyEvent);
}

impl<F> NoveltySink for F
where
    F: FnMut(&NoveltyEvent) + Send,
{
    fn on_novelty(&mut self, event: &NoveltyEvent) {
        self(event)
    }
}

/// Receives the payload of every newly observed code, to interpret it as a resource
/// locator. Symbologies without a decoded payload arrive as an empty string.
pub trait InteractionLauncher: Send {
    fn launch(&mut self, payload: &str);
}

impl<F> InteractionLauncher for F
where
    F: FnMut(&str) + Send,
{
    fn launch(&mut self, payload: &str) {
        self(payload)
    }
}

/// Launcher that only logs. Used when the host wires no real launcher.
#[derive(Debug, Default)]
pub struct LogLauncher;

impl InteractionLauncher for LogLauncher {
    fn launch(&mut self, payload: &str) {
        if payload.is_empty() {
            log::debug!("interaction launcher: code without payload, nothing to open");
            return;
        }
        log::info!("interaction launcher: {}", payload);
    }
}

/// Debug subscriber writing each novelty event as a JSON line.
#[derive(Debug, Default)]
pub struct ObservationLog {
    entries: u64,
}

impl ObservationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> u64 {
        self.entries
    }
}

impl NoveltySink for ObservationLog {
    fn on_novelty(&mut self, event: &NoveltyEvent) {
        self.entries += 1;
        match serde_json::to_string(event) {
            Ok(line) => log::debug!("observation #{}: {}", self.entries, line),
            Err(e) => log::debug!("observation #{}: unserializable ({})", self.entries, e),
        }
    }
}

/// Session-scoped novelty tracker.
pub struct EntityTracker {
    observed: ObservedSet,
    sinks: Vec<Box<dyn NoveltySink>>,
    launcher: Option<Box<dyn InteractionLauncher>>,
}

impl EntityTracker {
    pub fn new() -> Self {
        Self {
            observed: ObservedSet::new(),
            sinks: Vec::new(),
            launcher: None,
        }
    }

    pub fn with_launcher<L: InteractionLauncher + 'static>(mut self, launcher: L) -> Self {
        self.launcher = Some(Box::new(launcher));
        self
    }

    pub fn subscribe<S: NoveltySink + 'static>(&mut self, sink: S) {
        self.sinks.push(Box::new(sink));
    }

    pub fn observed(&self) -> &ObservedSet {
        &self.observed
    }

    /// Session reset.
    pub fn reset(&mut self) {
        self.observed.clear();
    }

    pub fn checkpoint(&self) -> ObservedMark {
        self.observed.mark()
    }

    /// Undo every observation made since `mark`, so those entities count as new again.
    pub fn rollback(&mut self, mark: ObservedMark) {
        let before = self.observed.len();
        self.observed.truncate(mark);
        let undone = before - self.observed.len();
        if undone > 0 {
            log::debug!("rolled back {} observations", undone);
        }
    }

    /// Record an entity. Returns true exactly once per logical entity.
    pub fn observe(&mut self, entity: Entity) -> bool {
        let event = match entity {
            Entity::Person(person) => {
                if self.observed.contains_person(person.track_id) {
                    return false;
                }
                log::info!("new person track {}", person.track_id);
                self.observed.push_person(person.clone());
                NoveltyEvent::Person(person)
            }
            Entity::Code(barcode) => {
                if self.observed.contains_barcode(&barcode) {
                    return false;
                }
                log::info!(
                    "new {} code payload={:?} descriptor={}",
                    barcode.symbol,
                    barcode.payload,
                    barcode.descriptor.as_deref().map(hex::encode).unwrap_or_default()
                );
                self.observed.push_barcode(barcode.clone());
                NoveltyEvent::Code(barcode)
            }
            Entity::Discarded => return false,
        };

        for sink in self.sinks.iter_mut() {
            sink.on_novelty(&event);
        }
        if let (NoveltyEvent::Code(barcode), Some(launcher)) = (&event, self.launcher.as_mut()) {
            launcher.launch(&barcode.payload);
        }
        true
    }
}

impl Default for EntityTracker {
    fn default() -> Self {
        Self::new()
    }
}
