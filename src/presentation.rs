use crate::definition::ScheduleDefinition;
use crate::engine::ScheduleState;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Coarse sensor state: 0 today, 1 tomorrow, 2 anything later or nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionState {
    Today,
    Tomorrow,
    Later,
}

impl CollectionState {
    pub fn from_days(days: Option<i64>) -> Self {
        match days {
            Some(0) => CollectionState::Today,
            Some(1) => CollectionState::Tomorrow,
            _ => CollectionState::Later,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            CollectionState::Today => 0,
            CollectionState::Tomorrow => 1,
            CollectionState::Later => 2,
        }
    }
}

pub fn render_state(definition: &ScheduleDefinition, state: &ScheduleState) -> String {
    let collection = CollectionState::from_days(state.days);
    if !definition.verbose_state {
        return collection.code().to_string();
    }
    match (state.next_date, state.days, collection) {
        (Some(_), _, CollectionState::Today) => "Today".to_string(),
        (Some(_), _, CollectionState::Tomorrow) => "Tomorrow".to_string(),
        (Some(date), Some(days), CollectionState::Later) => {
            let mut formatted = String::new();
            if write!(formatted, "{}", date.format(&definition.date_format)).is_err() {
                formatted = date.to_string();
            }
            definition
                .verbose_format
                .replace("{date}", &formatted)
                .replace("{days}", &days.to_string())
        }
        _ => "No collection scheduled".to_string(),
    }
}
