//! Journal of compensations that failed and side effects that need an operator.
//!
//! Nothing here is retried automatically. The journal only makes failures
//! visible after the log line has scrolled away.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use common::{OrderId, VehicleId};
use serde::Serialize;

/// What was being undone, or left undone, when the failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompensationKind {
    /// Releasing a reservation after a later saga step failed.
    ReleaseReservation,
    /// Removing a paid-for vehicle from stock; never compensated.
    RemoveFromStock,
    /// Marking an order cancelled after its vehicle was already released.
    CancelAfterRelease,
    /// Attaching a payment the gateway issued to its order.
    AttachPayment,
}

impl CompensationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompensationKind::ReleaseReservation => "release_reservation",
            CompensationKind::RemoveFromStock => "remove_from_stock",
            CompensationKind::CancelAfterRelease => "cancel_after_release",
            CompensationKind::AttachPayment => "attach_payment",
        }
    }
}

/// One journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompensationRecord {
    pub order_id: OrderId,
    pub vehicle_id: VehicleId,
    pub kind: CompensationKind,
    pub attempts: u32,
    pub error: String,
    pub at: DateTime<Utc>,
}

/// Shared, append-only list of [`CompensationRecord`]s.
#[derive(Debug, Clone, Default)]
pub struct CompensationJournal {
    entries: Arc<Mutex<Vec<CompensationRecord>>>,
}

impl CompensationJournal {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries_mut(&self) -> MutexGuard<'_, Vec<CompensationRecord>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a failure.
    pub fn record(
        &self,
        order_id: OrderId,
        vehicle_id: VehicleId,
        kind: CompensationKind,
        error: impl Into<String>,
    ) {
        self.entries_mut().push(CompensationRecord {
            order_id,
            vehicle_id,
            kind,
            attempts: 1,
            error: error.into(),
            at: Utc::now(),
        });
    }

    /// Returns all entries, oldest first.
    pub fn entries(&self) -> Vec<CompensationRecord> {
        self.entries_mut().clone()
    }

    /// Returns the entries recorded for one order.
    pub fn entries_for(&self, order_id: OrderId) -> Vec<CompensationRecord> {
        self.entries_mut()
            .iter()
            .filter(|entry| entry.order_id == order_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries_mut().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries_mut().is_empty()
    }
}
