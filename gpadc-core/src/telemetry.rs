//! Event history for sampling sessions and power transitions.
//!
//! Records land in a fixed-size ring so the device never allocates; the host
//! emulator and the integration tests read them back in chronological order
//! to check session ordering and power sequencing.

use core::cell::RefCell;
use core::fmt;

use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::Instant;
use heapless::{HistoryBuf, OldestOrdered};

use crate::sampling::ReadKind;

/// Default number of records retained per device.
pub const TELEMETRY_RING_CAPACITY: usize = 32;

/// Monotonic identifier assigned to each record.
pub type EventId = u32;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GpadcEvent {
    /// A session took the exclusive lock and armed `kind`.
    SessionArmed(ReadKind),
    SessionCompleted(ReadKind),
    SessionTimedOut(ReadKind),
    /// A register access aborted the session.
    SessionFailed(ReadKind),
    Resumed,
    Suspended,
    /// A free-running sample interrupt fanned out to every logical sensor.
    SampleFresh,
    /// Calibration fell back to zero defaults.
    CalibrationDefaulted,
}

impl fmt::Display for GpadcEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpadcEvent::SessionArmed(kind) => write!(f, "session-armed {kind}"),
            GpadcEvent::SessionCompleted(kind) => write!(f, "session-completed {kind}"),
            GpadcEvent::SessionTimedOut(kind) => write!(f, "session-timed-out {kind}"),
            GpadcEvent::SessionFailed(kind) => write!(f, "session-failed {kind}"),
            GpadcEvent::Resumed => f.write_str("resumed"),
            GpadcEvent::Suspended => f.write_str("suspended"),
            GpadcEvent::SampleFresh => f.write_str("sample-fresh"),
            GpadcEvent::CalibrationDefaulted => f.write_str("calibration-defaulted"),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TelemetryRecord {
    pub id: EventId,
    pub timestamp: Instant,
    pub event: GpadcEvent,
}

/// Fixed-capacity telemetry ring.
pub struct TelemetryRecorder<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    ring: HistoryBuf<TelemetryRecord, CAPACITY>,
    next_event_id: EventId,
}

impl<const CAPACITY: usize> TelemetryRecorder<CAPACITY> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    #[must_use]
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord> {
        self.ring.oldest_ordered()
    }

    #[must_use]
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.ring.recent()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn record(&mut self, event: GpadcEvent, timestamp: Instant) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);
        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
        });
        id
    }

    pub fn clear(&mut self) {
        self.ring.clear();
    }
}

impl<const CAPACITY: usize> Default for TelemetryRecorder<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

/// Recorder shared between tasks and interrupt context.
pub struct SharedTelemetry {
    inner: BlockingMutex<CriticalSectionRawMutex, RefCell<TelemetryRecorder>>,
}

impl SharedTelemetry {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: BlockingMutex::new(RefCell::new(TelemetryRecorder::new())),
        }
    }

    pub fn record(&self, event: GpadcEvent) -> EventId {
        let now = Instant::now();
        self.inner
            .lock(|recorder| recorder.borrow_mut().record(event, now))
    }

    /// Runs `f` against the recorder while holding the lock.
    #[must_use]
    pub fn with<T>(&self, f: impl FnOnce(&TelemetryRecorder) -> T) -> T {
        self.inner.lock(|recorder| f(&recorder.borrow()))
    }

    pub fn clear(&self) {
        self.inner.lock(|recorder| recorder.borrow_mut().clear());
    }
}

impl Default for SharedTelemetry {
    fn default() -> Self {
        Self::new()
    }
}
