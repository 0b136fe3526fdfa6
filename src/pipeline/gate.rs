use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Single-permit, non-blocking gate. At most one `GatePermit` exists at a time.
///
/// `try_acquire` never waits: when the gate is held it fails immediately so the caller
/// can drop its work.
#[derive(Debug)]
pub struct BusyGate {
    busy: AtomicBool,
    epoch: Instant,
    /// Nanoseconds after `epoch` at which the current permit was taken.
    acquired_at_ns: AtomicU64,
    stall_reported: AtomicBool,
}

impl BusyGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            busy: AtomicBool::new(false),
            epoch: Instant::now(),
            acquired_at_ns: AtomicU64::new(0),
            stall_reported: AtomicBool::new(false),
        })
    }

    pub fn try_acquire(self: &Arc<Self>) -> Option<GatePermit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        self.acquired_at_ns
            .store(self.nanos_since_epoch(), Ordering::Release);
        self.stall_reported.store(false, Ordering::Release);
        Some(GatePermit {
            gate: Arc::clone(self),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// How long the current permit has been held, if any.
    pub fn held_for(&self) -> Option<Duration> {
        if !self.is_busy() {
            return None;
        }
        let since = self.acquired_at_ns.load(Ordering::Acquire);
        Some(Duration::from_nanos(
            self.nanos_since_epoch().saturating_sub(since),
        ))
    }

    /// True for the first caller per acquisition; later callers get false.
    pub fn claim_stall_report(&self) -> bool {
        !self.stall_reported.swap(true, Ordering::AcqRel)
    }

    fn release(&self) {
        self.busy.store(false, Ordering::Release);
    }

    fn nanos_since_epoch(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }
}

/// Proof of holding the gate. Dropping it releases the gate, including during unwind.
#[derive(Debug)]
pub struct GatePermit {
    gate: Arc<BusyGate>,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.gate.release();
    }
}
