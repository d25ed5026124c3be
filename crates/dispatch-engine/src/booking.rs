//! Serialized booking on top of the advisory conflict detector.
//!
//! [`check_availability`] only reads a snapshot, so two writers can both pass
//! it. [`book`] runs check-then-insert while holding a per-technician,
//! per-date lock from [`SlotLocks`]. This excludes races only among callers
//! that share the same `SlotLocks`; across processes the store must provide
//! its own conditional write.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::conflict::{check_availability, BookingRequest, ConflictReport, ExistingJob};
use crate::error::{DispatchError, Result};

/// The persistence collaborator's view of jobs.
pub trait JobStore {
    /// Jobs assigned to `technician_id` on `date`.
    fn jobs_for(&self, technician_id: &str, date: NaiveDate) -> Result<Vec<ExistingJob>>;

    /// Persist the request as a job and return its id.
    fn insert(&self, request: &BookingRequest) -> Result<String>;
}

type SlotKey = (String, NaiveDate);

/// In-process locks keyed by technician and date.
#[derive(Debug, Default)]
pub struct SlotLocks {
    slots: Mutex<HashMap<SlotKey, Arc<Mutex<()>>>>,
}

impl SlotLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `(technician_id, date)`.
    pub fn with_slot<R>(&self, technician_id: &str, date: NaiveDate, f: impl FnOnce() -> R) -> R {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(
                slots
                    .entry((technician_id.to_string(), date))
                    .or_default(),
            )
        };
        let _guard = slot.lock().unwrap_or_else(|e| e.into_inner());
        f()
    }

    /// Drop locks nobody is holding or waiting on.
    pub fn prune(&self) {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.retain(|_, slot| Arc::strong_count(slot) > 1);
    }

    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BookingOutcome {
    Booked { job_id: String },
    Rejected { report: ConflictReport },
}

/// Check the request against the store and insert it if it is conflict-free,
/// holding the slot lock across both steps.
///
/// # Errors
/// Returns `DispatchError::MissingField` if the request has no technician or
/// no parseable date, and propagates store errors.
pub fn book<S: JobStore + ?Sized>(
    locks: &SlotLocks,
    store: &S,
    request: &BookingRequest,
) -> Result<BookingOutcome> {
    let technician = request
        .technician_id
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or(DispatchError::MissingField("technicianId"))?;
    let interval = request
        .interval()
        .ok_or(DispatchError::MissingField("date"))?;

    locks.with_slot(technician, interval.date, || -> Result<BookingOutcome> {
        let jobs = store.jobs_for(technician, interval.date)?;
        let report = check_availability(request, &jobs);
        if report.has_conflict {
            debug!(
                technician,
                date = %interval.date,
                conflicts = report.conflicts.len(),
                "booking rejected"
            );
            return Ok(BookingOutcome::Rejected { report });
        }

        let job_id = store.insert(request)?;
        info!(technician, date = %interval.date, job_id = %job_id, "booking accepted");
        Ok(BookingOutcome::Booked { job_id })
    })
}
