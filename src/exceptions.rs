use crate::calendar::HolidayCalendar;
use crate::error::ResolveError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const MAX_RESOLVE_ATTEMPTS: usize = 365;

/// Per-schedule overrides applied on top of the generated dates.
///
/// `manual_dates` and `excluded_dates` never share a date with
/// `removed_dates`; every mutator keeps that true.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionSet {
    excluded_dates: BTreeSet<NaiveDate>,
    manual_dates: BTreeSet<NaiveDate>,
    removed_dates: BTreeSet<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    holidays: Option<HolidayCalendar>,
}

impl ExceptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn excluded_dates(&self) -> &BTreeSet<NaiveDate> {
        &self.excluded_dates
    }

    pub fn manual_dates(&self) -> &BTreeSet<NaiveDate> {
        &self.manual_dates
    }

    pub fn removed_dates(&self) -> &BTreeSet<NaiveDate> {
        &self.removed_dates
    }

    pub fn holidays(&self) -> Option<HolidayCalendar> {
        self.holidays
    }

    pub fn set_holidays(&mut self, holidays: Option<HolidayCalendar>) {
        self.holidays = holidays;
    }

    pub fn add_date(&mut self, date: NaiveDate) {
        self.removed_dates.remove(&date);
        self.manual_dates.insert(date);
    }

    pub fn remove_date(&mut self, date: NaiveDate) {
        self.manual_dates.remove(&date);
        self.excluded_dates.remove(&date);
        self.removed_dates.insert(date);
    }

    /// Skip `date` whenever the rule lands on it. A removed date already is
    /// skipped, so it is left where it is.
    pub fn exclude_date(&mut self, date: NaiveDate) {
        if !self.removed_dates.contains(&date) {
            self.excluded_dates.insert(date);
        }
    }

    pub fn clear_exclusions(&mut self) {
        self.excluded_dates.clear();
    }

    pub fn is_skipped(&self, date: NaiveDate) -> bool {
        self.excluded_dates.contains(&date)
            || self.removed_dates.contains(&date)
            || self.holidays.is_some_and(|calendar| calendar.is_holiday(date))
    }

    /// Walk forward from `candidate` with `advance` until a date that is
    /// neither excluded nor removed. `Ok(None)` means the rule ran dry.
    pub fn resolve<F>(&self, candidate: NaiveDate, mut advance: F) -> Result<Option<NaiveDate>, ResolveError>
    where
        F: FnMut(NaiveDate) -> Option<NaiveDate>,
    {
        let mut current = candidate;
        for _ in 0..MAX_RESOLVE_ATTEMPTS {
            if !self.is_skipped(current) {
                return Ok(Some(current));
            }
            match advance(current) {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Err(ResolveError {
            attempted: current,
            attempts: MAX_RESOLVE_ATTEMPTS,
        })
    }

    pub fn soonest_manual(&self, reference: NaiveDate) -> Option<NaiveDate> {
        self.manual_dates.range(reference..).next().copied()
    }

    /// Forget removals older than `date`; no candidate can land on them anymore.
    pub fn prune_removed_before(&mut self, date: NaiveDate) -> usize {
        let kept = self.removed_dates.split_off(&date);
        let pruned = std::mem::replace(&mut self.removed_dates, kept);
        pruned.len()
    }
}
