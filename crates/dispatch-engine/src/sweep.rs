//! Recurring-job generation sweep.
//!
//! The sweep runs periodically and may run more than once for the same
//! template. [`plan_next`] is pure; the check for a job already materialized
//! on a date belongs to the persistence layer through [`OccurrenceLedger`].
//! Re-running the sweep before the next occurrence is due, or after it was
//! created, is a no-op.

use std::collections::{BTreeSet, HashSet};

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::recurrence::RecurringTemplate;

/// Answers whether a template already has a job on a date.
pub trait OccurrenceLedger {
    fn has_occurrence(&self, template_id: &str, date: NaiveDate) -> bool;
}

impl OccurrenceLedger for BTreeSet<(String, NaiveDate)> {
    fn has_occurrence(&self, template_id: &str, date: NaiveDate) -> bool {
        self.contains(&(template_id.to_string(), date))
    }
}

impl OccurrenceLedger for HashSet<(String, NaiveDate)> {
    fn has_occurrence(&self, template_id: &str, date: NaiveDate) -> bool {
        self.contains(&(template_id.to_string(), date))
    }
}

/// What the sweep should do for one template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SweepDecision {
    /// Materialize a job on `date`.
    Create { date: NaiveDate },
    /// The ledger already holds a job for `date`.
    AlreadyGenerated { date: NaiveDate },
    /// `date` is beyond the generation horizon.
    NotDue { date: NaiveDate },
    /// The template has been deactivated.
    Inactive,
    /// The next occurrence would fall after the template's end date.
    Ended { next: NaiveDate },
    /// The template itself is malformed (e.g. a day index above 6).
    Invalid { reason: String },
}

/// Decide the next action for one template.
///
/// `lead_days` is how far ahead of `as_of` occurrences are materialized;
/// 0 creates a job only once its date has arrived.
pub fn plan_next<L: OccurrenceLedger + ?Sized>(
    template: &RecurringTemplate,
    last_occurrence: Option<NaiveDate>,
    as_of: NaiveDate,
    lead_days: u32,
    ledger: &L,
) -> SweepDecision {
    if !template.is_active {
        return SweepDecision::Inactive;
    }

    let next = match template.next_after(last_occurrence) {
        Ok(next) => next,
        Err(e) => {
            warn!(template_id = %template.id, error = %e, "skipping malformed recurring template");
            return SweepDecision::Invalid {
                reason: e.to_string(),
            };
        }
    };

    if template.end_date.is_some_and(|end| next > end) {
        return SweepDecision::Ended { next };
    }

    let horizon = as_of
        .checked_add_days(Days::new(lead_days as u64))
        .unwrap_or(NaiveDate::MAX);
    if next > horizon {
        return SweepDecision::NotDue { date: next };
    }

    if ledger.has_occurrence(&template.id, next) {
        debug!(template_id = %template.id, date = %next, "occurrence already generated");
        return SweepDecision::AlreadyGenerated { date: next };
    }

    info!(template_id = %template.id, date = %next, "recurring occurrence due");
    SweepDecision::Create { date: next }
}

/// One template's entry in a sweep pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepEntry {
    pub template_id: String,
    pub decision: SweepDecision,
}

/// Plan a whole pass over `(template, last_occurrence)` pairs.
pub fn sweep<'a, L, I>(templates: I, as_of: NaiveDate, lead_days: u32, ledger: &L) -> Vec<SweepEntry>
where
    L: OccurrenceLedger + ?Sized,
    I: IntoIterator<Item = (&'a RecurringTemplate, Option<NaiveDate>)>,
{
    templates
        .into_iter()
        .map(|(template, last)| SweepEntry {
            template_id: template.id.clone(),
            decision: plan_next(template, last, as_of, lead_days, ledger),
        })
        .collect()
}
