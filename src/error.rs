use chrono::NaiveDate;
use thiserror::Error;

/// A schedule definition that can never reach an engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("{frequency} schedule requires at least one collection day")]
    EmptyCollectionDays { frequency: &'static str },
    #[error("{frequency} schedule has invalid period {period} (must be at least 1)")]
    InvalidPeriod { frequency: &'static str, period: u32 },
    #[error("first_week {0} is outside 1..=53")]
    InvalidFirstWeek(u32),
    #[error("monthly schedule requires at least one weekday_order_number")]
    EmptyWeekdayOrder,
    #[error("weekday_order_number {0} is outside 1..=5")]
    InvalidWeekdayOrder(u32),
    #[error("monthly offset {0} is outside -31..=31 days")]
    OffsetOutOfRange(i64),
    #[error("{field} {value} is not a month (1..=12)")]
    InvalidMonth { field: &'static str, value: u32 },
    #[error("invalid date_format '{0}'")]
    InvalidDateFormat(String),
}

/// Failures surfaced by a schedule engine. The engine keeps its last good state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("schedule {entity} has no valid occurrence (gave up at {attempted})")]
    Unresolvable { entity: String, attempted: NaiveDate },
    #[error("schedule {entity} has been removed")]
    Removed { entity: String },
}

impl ScheduleError {
    pub fn entity(&self) -> &str {
        match self {
            ScheduleError::Unresolvable { entity, .. } | ScheduleError::Removed { entity } => {
                entity
            }
        }
    }
}

/// Raised by [`ExceptionSet::resolve`](crate::ExceptionSet::resolve) when every
/// candidate inside the retry bound is excluded or removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no admissible date after {attempts} attempts (last candidate {attempted})")]
pub struct ResolveError {
    pub attempted: NaiveDate,
    pub attempts: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("unknown entity {0}")]
    UnknownEntity(String),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("schedule {id}: {source}")]
    Definition {
        id: String,
        #[source]
        source: DefinitionError,
    },
    #[error("duplicate schedule id {0}")]
    DuplicateEntity(String),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid data: {0}")]
    InvalidData(String),
}
