pub mod aggregator;
pub mod calendar;
pub mod config;
pub mod definition;
pub mod engine;
pub mod error;
pub mod exceptions;
pub mod export;
#[cfg(feature = "http_api")]
pub mod http_api;
pub mod presentation;
pub mod rules;
pub(crate) mod validation;

pub use aggregator::{Aggregator, CalendarEvent, ServiceCommand, SharedEngine};
pub use calendar::HolidayCalendar;
pub use config::{
    GarbageCollectionConfig, ScheduleEntry, load_config_from_json, parse_config,
    save_config_to_json,
};
pub use definition::{AnnualDate, Frequency, ScheduleDefinition, Season, WeekdayOrdinal};
pub use engine::{
    EngineSnapshot, EngineStatus, ScheduleEngine, ScheduleState, UpdateOutcome,
};
pub use error::{
    ConfigError, DefinitionError, ExportError, ResolveError, ScheduleError, ServiceError,
};
pub use exceptions::ExceptionSet;
pub use export::{load_dates_from_csv, read_dates_csv, save_events_to_csv, write_events_csv};
pub use presentation::CollectionState;
