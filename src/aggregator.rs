use crate::engine::{EngineSnapshot, EngineStatus, ScheduleEngine, UpdateOutcome};
use crate::error::{ScheduleError, ServiceError};
use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub type SharedEngine = Arc<Mutex<ScheduleEngine>>;

/// One upcoming collection as shown in a calendar listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub date: NaiveDate,
}

/// Commands a host can route to a single schedule by entity id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "service", rename_all = "snake_case")]
pub enum ServiceCommand {
    AddDate { entity_id: String, date: NaiveDate },
    RemoveDate { entity_id: String, date: NaiveDate },
    UpdateState { entity_id: String },
}

impl ServiceCommand {
    pub fn entity_id(&self) -> &str {
        match self {
            ServiceCommand::AddDate { entity_id, .. }
            | ServiceCommand::RemoveDate { entity_id, .. }
            | ServiceCommand::UpdateState { entity_id } => entity_id,
        }
    }
}

struct Registered {
    id: String,
    engine: SharedEngine,
}

/// Registry of schedule engines in registration order. Lookups by id go
/// through `index` and never lock an engine.
#[derive(Default)]
pub struct Aggregator {
    engines: Vec<Registered>,
    index: HashMap<String, usize>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `engine`; returns `false` if its id is already taken.
    pub fn add_engine(&mut self, engine: ScheduleEngine) -> bool {
        if self.index.contains_key(engine.id()) {
            return false;
        }
        let id = engine.id().to_string();
        debug!(entity = %id, "registering schedule");
        self.index.insert(id.clone(), self.engines.len());
        self.engines.push(Registered {
            id,
            engine: Arc::new(Mutex::new(engine)),
        });
        true
    }

    pub fn remove_engine(&mut self, id: &str) -> bool {
        let Some(position) = self.index.remove(id) else {
            return false;
        };
        let removed = self.engines.remove(position);
        for (offset, entry) in self.engines[position..].iter().enumerate() {
            self.index.insert(entry.id.clone(), position + offset);
        }
        removed.engine.lock().remove();
        debug!(entity = %id, "schedule removed");
        true
    }

    pub fn get(&self, id: &str) -> Option<SharedEngine> {
        self.index
            .get(id)
            .map(|position| self.engines[*position].engine.clone())
    }

    pub fn ids(&self) -> Vec<String> {
        self.engines.iter().map(|entry| entry.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    pub fn snapshot(&self) -> Vec<EngineSnapshot> {
        self.engines
            .iter()
            .map(|entry| entry.engine.lock().snapshot())
            .collect()
    }

    /// Events whose next date falls in `[start, end]`, oldest first.
    pub fn list_events(&self, start: NaiveDate, end: NaiveDate) -> Vec<CalendarEvent> {
        let mut events: Vec<CalendarEvent> = self
            .events()
            .into_iter()
            .filter(|event| event.date >= start && event.date <= end)
            .collect();
        // Stable sort keeps registration order for equal dates.
        events.sort_by_key(|event| event.date);
        events
    }

    pub fn soonest(&self) -> Option<CalendarEvent> {
        self.events().into_iter().fold(None, |best, event| match best {
            Some(current) if current.date <= event.date => Some(current),
            _ => Some(event),
        })
    }

    /// Throttled update of every engine. Schedules marked `manual_update`
    /// are left alone. Returns the errors, one per failing engine.
    pub fn refresh_all(&self, now: NaiveDateTime) -> Vec<ScheduleError> {
        self.engines
            .par_iter()
            .filter_map(|entry| {
                let mut engine = entry.engine.lock();
                if engine.status() == EngineStatus::Removed || engine.definition().manual_update {
                    return None;
                }
                engine.update(now).err()
            })
            .collect()
    }

    pub fn dispatch(
        &self,
        command: ServiceCommand,
        now: NaiveDateTime,
    ) -> Result<UpdateOutcome, ServiceError> {
        let engine = self
            .get(command.entity_id())
            .ok_or_else(|| ServiceError::UnknownEntity(command.entity_id().to_string()))?;
        let mut engine = engine.lock();
        let outcome = match command {
            ServiceCommand::AddDate { date, .. } => engine.add_date(date, now)?,
            ServiceCommand::RemoveDate { date, .. } => engine.remove_date(date, now)?,
            ServiceCommand::UpdateState { .. } => engine.force_update(now)?,
        };
        Ok(outcome)
    }

    fn events(&self) -> Vec<CalendarEvent> {
        self.engines
            .iter()
            .filter_map(|entry| {
                let engine = entry.engine.lock();
                engine.next_date().map(|date| CalendarEvent {
                    id: engine.id().to_string(),
                    title: engine.title().to_string(),
                    date,
                })
            })
            .collect()
    }
}
