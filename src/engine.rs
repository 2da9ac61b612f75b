use crate::definition::ScheduleDefinition;
use crate::error::{DefinitionError, ScheduleError};
use crate::exceptions::ExceptionSet;
use crate::presentation::{self, CollectionState};
use crate::rules;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const DEFAULT_THROTTLE_SECONDS: i64 = 30;

pub fn default_throttle() -> Duration {
    Duration::seconds(DEFAULT_THROTTLE_SECONDS)
}

/// Last computed result of a schedule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleState {
    pub next_date: Option<NaiveDate>,
    pub days: Option<i64>,
    pub last_updated: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    Uninitialized,
    Idle,
    Computing,
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Refreshed,
    Throttled,
}

/// Read-only view of one engine for listings and adapters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub id: String,
    pub title: String,
    pub frequency: String,
    pub next_date: Option<NaiveDate>,
    pub days: Option<i64>,
    pub last_updated: Option<NaiveDateTime>,
    pub state: CollectionState,
    pub label: String,
    pub status: EngineStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct ScheduleEngine {
    id: String,
    definition: ScheduleDefinition,
    exceptions: ExceptionSet,
    state: ScheduleState,
    status: EngineStatus,
    throttle: Duration,
    last_error: Option<ScheduleError>,
}

impl ScheduleEngine {
    pub fn new(id: impl Into<String>, definition: ScheduleDefinition) -> Result<Self, DefinitionError> {
        definition.validate()?;
        let mut exceptions = ExceptionSet::new();
        for date in &definition.include_dates {
            exceptions.add_date(*date);
        }
        for date in &definition.exclude_dates {
            exceptions.exclude_date(*date);
        }
        exceptions.set_holidays(definition.holidays);

        Ok(Self {
            id: id.into(),
            definition,
            exceptions,
            state: ScheduleState::default(),
            status: EngineStatus::Uninitialized,
            throttle: default_throttle(),
            last_error: None,
        })
    }

    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Friendly name, falling back to the id.
    pub fn title(&self) -> &str {
        if self.definition.name.is_empty() {
            &self.id
        } else {
            &self.definition.name
        }
    }

    pub fn definition(&self) -> &ScheduleDefinition {
        &self.definition
    }

    pub fn exceptions(&self) -> &ExceptionSet {
        &self.exceptions
    }

    pub fn state(&self) -> &ScheduleState {
        &self.state
    }

    pub fn next_date(&self) -> Option<NaiveDate> {
        self.state.next_date
    }

    pub fn days(&self) -> Option<i64> {
        self.state.days
    }

    pub fn last_updated(&self) -> Option<NaiveDateTime> {
        self.state.last_updated
    }

    pub fn status(&self) -> EngineStatus {
        self.status
    }

    pub fn throttle(&self) -> Duration {
        self.throttle
    }

    pub fn last_error(&self) -> Option<&ScheduleError> {
        self.last_error.as_ref()
    }

    pub fn collection_state(&self) -> CollectionState {
        CollectionState::from_days(self.state.days)
    }

    pub fn state_label(&self) -> String {
        presentation::render_state(&self.definition, &self.state)
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            id: self.id.clone(),
            title: self.title().to_string(),
            frequency: self.definition.frequency.name().to_string(),
            next_date: self.state.next_date,
            days: self.state.days,
            last_updated: self.state.last_updated,
            state: self.collection_state(),
            label: self.state_label(),
            status: self.status,
            error: self.last_error.as_ref().map(ToString::to_string),
        }
    }

    /// Throttled recompute.
    pub fn update(&mut self, reference: NaiveDateTime) -> Result<UpdateOutcome, ScheduleError> {
        self.refresh(reference, false)
    }

    pub fn force_update(&mut self, reference: NaiveDateTime) -> Result<UpdateOutcome, ScheduleError> {
        self.refresh(reference, true)
    }

    pub fn add_date(
        &mut self,
        date: NaiveDate,
        reference: NaiveDateTime,
    ) -> Result<UpdateOutcome, ScheduleError> {
        self.ensure_active()?;
        debug!(entity = %self.id, %date, "adding manual date");
        self.exceptions.add_date(date);
        self.refresh(reference, true)
    }

    pub fn remove_date(
        &mut self,
        date: NaiveDate,
        reference: NaiveDateTime,
    ) -> Result<UpdateOutcome, ScheduleError> {
        self.ensure_active()?;
        debug!(entity = %self.id, %date, "removing date");
        self.exceptions.remove_date(date);
        self.refresh(reference, true)
    }

    pub fn exclude_dates<I>(
        &mut self,
        dates: I,
        reference: NaiveDateTime,
    ) -> Result<UpdateOutcome, ScheduleError>
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        self.ensure_active()?;
        for date in dates {
            self.exceptions.exclude_date(date);
        }
        self.refresh(reference, true)
    }

    /// Swap in a new definition. Runtime manual and removed dates survive;
    /// static exclusions come from the new definition. The next `update`
    /// recomputes regardless of the throttle.
    pub fn reconfigure(&mut self, definition: ScheduleDefinition) -> Result<(), DefinitionError> {
        definition.validate()?;
        self.exceptions.clear_exclusions();
        for date in &definition.include_dates {
            self.exceptions.add_date(*date);
        }
        for date in &definition.exclude_dates {
            self.exceptions.exclude_date(*date);
        }
        self.exceptions.set_holidays(definition.holidays);
        self.definition = definition;
        self.state.last_updated = None;
        debug!(entity = %self.id, "schedule reconfigured");
        Ok(())
    }

    /// Terminal: every later call reports [`ScheduleError::Removed`].
    pub fn remove(&mut self) {
        self.status = EngineStatus::Removed;
        self.state = ScheduleState::default();
    }

    fn ensure_active(&self) -> Result<(), ScheduleError> {
        if self.status == EngineStatus::Removed {
            return Err(ScheduleError::Removed {
                entity: self.id.clone(),
            });
        }
        Ok(())
    }

    fn within_throttle(&self, reference: NaiveDateTime) -> bool {
        match self.state.last_updated {
            Some(last) => {
                let elapsed = reference - last;
                elapsed >= Duration::zero() && elapsed < self.throttle
            }
            None => false,
        }
    }

    fn refresh(
        &mut self,
        reference: NaiveDateTime,
        force: bool,
    ) -> Result<UpdateOutcome, ScheduleError> {
        self.ensure_active()?;
        if !force && self.within_throttle(reference) {
            debug!(entity = %self.id, "update throttled");
            return Ok(UpdateOutcome::Throttled);
        }

        self.status = EngineStatus::Computing;
        let pruned = self.exceptions.prune_removed_before(reference.date());
        if pruned > 0 {
            debug!(entity = %self.id, pruned, "dropped past removed dates");
        }
        let computed = self.compute(reference);
        self.status = EngineStatus::Idle;

        match computed {
            Ok(next_date) => {
                self.state = ScheduleState {
                    next_date,
                    days: next_date.map(|date| (date - reference.date()).num_days()),
                    last_updated: Some(reference),
                };
                self.last_error = None;
                debug!(
                    entity = %self.id,
                    next_date = ?self.state.next_date,
                    days = ?self.state.days,
                    "schedule updated"
                );
                Ok(UpdateOutcome::Refreshed)
            }
            Err(err) => {
                warn!(entity = %self.id, error = %err, "keeping previous collection date");
                self.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    fn compute(&self, reference: NaiveDateTime) -> Result<Option<NaiveDate>, ScheduleError> {
        let cutoff = self.definition.expire_after;
        let manual = self
            .exceptions
            .soonest_manual(rules::first_eligible_date(reference, cutoff));

        let generated = match rules::next_occurrence(&self.definition, reference, cutoff) {
            Some(candidate) => self
                .exceptions
                .resolve(candidate, |date| {
                    rules::following_occurrence(&self.definition, date)
                })
                .map_err(|err| ScheduleError::Unresolvable {
                    entity: self.id.clone(),
                    attempted: err.attempted,
                })?,
            None => None,
        };

        Ok(match (generated, manual) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, Weekday};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn at(date: NaiveDate, h: u32, m: u32, s: u32) -> NaiveDateTime {
        date.and_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn new_engine_starts_uninitialized() {
        let engine = ScheduleEngine::new("sensor.blank", ScheduleDefinition::blank("")).unwrap();
        assert_eq!(engine.status(), EngineStatus::Uninitialized);
        assert_eq!(engine.state(), &ScheduleState::default());
        assert_eq!(engine.title(), "sensor.blank");
        assert_eq!(engine.throttle(), Duration::seconds(30));
    }

    #[test]
    fn invalid_definition_never_builds_an_engine() {
        let def = ScheduleDefinition::weekly("paper", vec![]);
        assert!(ScheduleEngine::new("sensor.paper", def).is_err());
    }

    #[test]
    fn throttle_window_blocks_unforced_updates() {
        let mut engine =
            ScheduleEngine::new("sensor.paper", ScheduleDefinition::weekly("", vec![Weekday::Wed]))
                .unwrap();
        let now = at(d(2020, 4, 1), 8, 0, 0);
        assert_eq!(engine.update(now), Ok(UpdateOutcome::Refreshed));
        assert_eq!(engine.status(), EngineStatus::Idle);

        let later = at(d(2020, 4, 2), 8, 0, 0);
        let within = now + Duration::seconds(29);
        assert_eq!(engine.update(within), Ok(UpdateOutcome::Throttled));
        assert_eq!(engine.last_updated(), Some(now));
        assert_eq!(engine.update(later), Ok(UpdateOutcome::Refreshed));
        assert_eq!(engine.next_date(), Some(d(2020, 4, 8)));
        assert_eq!(engine.days(), Some(6));
    }

    #[test]
    fn cutoff_consumes_todays_collection() {
        let def = ScheduleDefinition::weekly("", vec![Weekday::Wed])
            .with_expire_after(NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        let mut engine = ScheduleEngine::new("sensor.paper", def).unwrap();
        engine.update(at(d(2020, 4, 1), 9, 0, 0)).unwrap();
        assert_eq!(engine.days(), Some(0));
        engine.force_update(at(d(2020, 4, 1), 10, 0, 0)).unwrap();
        assert_eq!(engine.next_date(), Some(d(2020, 4, 8)));
        assert_eq!(engine.days(), Some(7));
    }

    #[test]
    fn manual_dates_join_rule_dates() {
        let def = ScheduleDefinition::weekly("", vec![Weekday::Wed]);
        let mut engine = ScheduleEngine::new("sensor.paper", def).unwrap();
        let now = at(d(2020, 4, 2), 8, 0, 0);
        engine.add_date(d(2020, 4, 4), now).unwrap();
        assert_eq!(engine.next_date(), Some(d(2020, 4, 4)));
        engine.remove_date(d(2020, 4, 4), now).unwrap();
        assert_eq!(engine.next_date(), Some(d(2020, 4, 8)));
        engine.remove_date(d(2020, 4, 8), now).unwrap();
        assert_eq!(engine.next_date(), Some(d(2020, 4, 15)));
    }

    #[test]
    fn unresolvable_keeps_last_known_good() {
        let def = ScheduleDefinition::every_n_days("", 1, d(2020, 1, 1));
        let mut engine = ScheduleEngine::new("sensor.daily", def).unwrap();
        let now = at(d(2020, 4, 1), 8, 0, 0);
        engine.update(now).unwrap();
        assert_eq!(engine.next_date(), Some(d(2020, 4, 1)));

        let every_day = (0..400).map(|offset| d(2020, 4, 1) + Duration::days(offset));
        let err = engine.exclude_dates(every_day, now).unwrap_err();
        assert!(matches!(err, ScheduleError::Unresolvable { .. }));
        assert_eq!(err.entity(), "sensor.daily");
        assert_eq!(engine.next_date(), Some(d(2020, 4, 1)));
        assert_eq!(engine.days(), Some(0));
        assert_eq!(engine.last_error(), Some(&err));
        assert!(engine.snapshot().error.is_some());
    }

    #[test]
    fn removed_engine_rejects_commands() {
        let mut engine = ScheduleEngine::new("sensor.blank", ScheduleDefinition::blank("")).unwrap();
        engine.remove();
        assert_eq!(engine.status(), EngineStatus::Removed);
        let now = at(d(2020, 4, 1), 8, 0, 0);
        assert_eq!(
            engine.add_date(d(2020, 4, 1), now),
            Err(ScheduleError::Removed {
                entity: "sensor.blank".to_string()
            })
        );
        assert!(engine.update(now).is_err());
    }

    #[test]
    fn reconfigure_keeps_manual_dates_and_forces_recompute() {
        let mut engine = ScheduleEngine::new("sensor.x", ScheduleDefinition::blank("")).unwrap();
        let now = at(d(2020, 4, 1), 8, 0, 0);
        engine.add_date(d(2020, 4, 20), now).unwrap();
        engine
            .reconfigure(ScheduleDefinition::weekly("", vec![Weekday::Fri]))
            .unwrap();
        assert_eq!(engine.update(now + Duration::seconds(1)), Ok(UpdateOutcome::Refreshed));
        assert_eq!(engine.next_date(), Some(d(2020, 4, 3)));
        assert!(engine.exceptions().manual_dates().contains(&d(2020, 4, 20)));
    }

    #[test]
    fn snapshot_reports_label_and_state() {
        let def = ScheduleDefinition::blank("Bulky waste").with_include_dates([d(2020, 4, 2)]);
        let mut engine = ScheduleEngine::new("sensor.bulky", def).unwrap();
        engine.update(at(d(2020, 4, 1), 8, 0, 0)).unwrap();
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.title, "Bulky waste");
        assert_eq!(snapshot.frequency, "blank");
        assert_eq!(snapshot.state, CollectionState::Tomorrow);
        assert_eq!(snapshot.label, "1");
        assert_eq!(snapshot.days, Some(1));
    }
}
