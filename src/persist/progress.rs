//! Synchronous progress reporting across persistence sub-handlers.
//!
//! The manager gives every handler one cost slot, normalizes all slots into
//! a single 0..1 stream, and rescales sub-handler updates into their slot.
//! Delivery is push-based on the caller's thread; there is no buffering or
//! async dispatch.

/// Which pipeline is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Load,
    Save,
}

/// Lifecycle stage of a progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStage {
    Start,
    Update,
    Done,
}

/// One progress notification.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub stage: ProgressStage,
    pub operation: OperationKind,
    /// Human-readable description of the current task.
    pub task: String,
    /// Overall completion in [0, 1].
    pub fraction: f64,
}

/// Receives progress events on the caller's thread.
pub trait ProgressSink {
    fn update(&mut self, event: &ProgressEvent);
}

/// A sink that discards everything.
#[derive(Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn update(&mut self, _event: &ProgressEvent) {}
}

/// A handler's estimated share of the total work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressWeight {
    /// Content length in bytes.
    Bytes(u64),
    /// Item count (slices, records, …).
    Items(u64),
    /// No estimate available; counts as one unit.
    Unknown,
}

impl ProgressWeight {
    /// The weight's contribution to the normalization total.
    pub fn units(self) -> u64 {
        match self {
            Self::Bytes(n) | Self::Items(n) => n,
            Self::Unknown => 1,
        }
    }
}

/// Normalizes per-slot progress into one 0..1 stream.
pub struct ProgressAggregator<'a> {
    sink: &'a mut dyn ProgressSink,
    operation: OperationKind,
    total: u64,
    base: u64,
}

impl<'a> ProgressAggregator<'a> {
    /// Create an aggregator over `total_units` of work.
    pub fn new(
        sink: &'a mut dyn ProgressSink,
        operation: OperationKind,
        total_units: u64,
    ) -> Self {
        Self {
            sink,
            operation,
            total: total_units.max(1),
            base: 0,
        }
    }

    /// Emit the single start event.
    pub fn start(&mut self, task: &str) {
        let event = ProgressEvent {
            stage: ProgressStage::Start,
            operation: self.operation,
            task: task.to_string(),
            fraction: 0.0,
        };
        self.sink.update(&event);
    }

    /// Borrow a slot of the given weight for one handler.
    pub fn slot(&mut self, weight: u64) -> SlotProgress<'_> {
        SlotProgress {
            sink: &mut *self.sink,
            operation: self.operation,
            base: self.base,
            weight,
            total: self.total,
        }
    }

    /// Close the current slot: advance the base and emit an update, so
    /// handlers that never reported anything still produce one event.
    pub fn complete_slot(&mut self, weight: u64, task: &str) {
        self.base = (self.base + weight).min(self.total);
        let event = ProgressEvent {
            stage: ProgressStage::Update,
            operation: self.operation,
            task: task.to_string(),
            fraction: self.base as f64 / self.total as f64,
        };
        self.sink.update(&event);
    }

    /// Emit the single done event at fraction 1.
    pub fn done(&mut self, task: &str) {
        let event = ProgressEvent {
            stage: ProgressStage::Done,
            operation: self.operation,
            task: task.to_string(),
            fraction: 1.0,
        };
        self.sink.update(&event);
    }
}

/// One handler's window into the aggregated stream.
///
/// `update(fraction, task)` rescales the handler-local fraction into the
/// slot: overall = (base + fraction × weight) / total.
pub struct SlotProgress<'a> {
    sink: &'a mut dyn ProgressSink,
    operation: OperationKind,
    base: u64,
    weight: u64,
    total: u64,
}

impl SlotProgress<'_> {
    /// Report handler-local progress in [0, 1].
    pub fn update(&mut self, fraction: f64, task: &str) {
        let within = fraction.clamp(0.0, 1.0) * self.weight as f64;
        let event = ProgressEvent {
            stage: ProgressStage::Update,
            operation: self.operation,
            task: task.to_string(),
            fraction: (self.base as f64 + within) / self.total as f64,
        };
        self.sink.update(&event);
    }
}
