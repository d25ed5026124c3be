//! # dispatch-engine
//!
//! Scheduling-consistency core for field-service dispatch.
//!
//! Everything here is pure computation over records the caller supplies:
//! the engine performs no I/O and holds no shared state (apart from the
//! opt-in [`booking::SlotLocks`]). Malformed free text is normalized with
//! observable fallbacks instead of errors, and a genuine booking conflict is
//! a normal result, not a failure.
//!
//! ## Modules
//!
//! - [`interval`] — free-form time/duration text → canonical minute intervals
//! - [`conflict`] — advisory double-booking detection for a technician's day
//! - [`recurrence`] — next occurrence of a recurring job template
//! - [`sweep`] — idempotent planning for the recurring-job generation sweep
//! - [`exceptions`] — work-day rules and leave/overtime exception resolution
//! - [`route`] — distance, time, speed and job-site visits from location samples
//! - [`openings`] — open slots in a technician's day within business hours
//! - [`booking`] — check-then-insert serialized per technician and date
//! - [`error`] — Error types

pub mod booking;
pub mod conflict;
pub mod error;
pub mod exceptions;
pub mod interval;
pub mod openings;
pub mod recurrence;
pub mod route;
pub mod sweep;

pub use conflict::{check_availability, find_double_bookings, BookingRequest, ConflictReport, ExistingJob};
pub use error::DispatchError;
pub use exceptions::{resolve_tracking, SchedulingSettings, ScheduleException, TrackingDecision};
pub use interval::{normalize, DurationInput, Parsed, ScheduledInterval};
pub use openings::open_slots;
pub use recurrence::{next_occurrence, Frequency, RecurringTemplate};
pub use route::{route_statistics, LocationSample, RouteStatistics};
