use crate::aggregator::Aggregator;
use crate::definition::ScheduleDefinition;
use crate::engine::{DEFAULT_THROTTLE_SECONDS, ScheduleEngine};
use crate::error::ConfigError;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

pub type ConfigResult<T> = Result<T, ConfigError>;

/// On-disk description of every configured schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GarbageCollectionConfig {
    #[serde(default = "default_throttle_seconds")]
    pub throttle_seconds: i64,
    #[serde(default)]
    pub schedules: Vec<ScheduleEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: String,
    #[serde(flatten)]
    pub definition: ScheduleDefinition,
}

fn default_throttle_seconds() -> i64 {
    DEFAULT_THROTTLE_SECONDS
}

impl Default for GarbageCollectionConfig {
    fn default() -> Self {
        Self {
            throttle_seconds: DEFAULT_THROTTLE_SECONDS,
            schedules: Vec::new(),
        }
    }
}

impl GarbageCollectionConfig {
    pub fn throttle(&self) -> Duration {
        Duration::seconds(self.throttle_seconds.max(0))
    }

    /// Checks every definition and id without building anything.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut seen = HashSet::new();
        for entry in &self.schedules {
            if !seen.insert(entry.id.as_str()) {
                return Err(ConfigError::DuplicateEntity(entry.id.clone()));
            }
            entry
                .definition
                .validate()
                .map_err(|source| ConfigError::Definition {
                    id: entry.id.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    pub fn build_aggregator(&self) -> ConfigResult<Aggregator> {
        self.validate()?;
        let mut aggregator = Aggregator::new();
        for entry in &self.schedules {
            let engine = ScheduleEngine::new(entry.id.clone(), entry.definition.clone())
                .map_err(|source| ConfigError::Definition {
                    id: entry.id.clone(),
                    source,
                })?
                .with_throttle(self.throttle());
            if !aggregator.add_engine(engine) {
                return Err(ConfigError::DuplicateEntity(entry.id.clone()));
            }
        }
        info!(schedules = aggregator.len(), "schedules configured");
        Ok(aggregator)
    }

    /// Captures the definitions currently registered in `aggregator`.
    pub fn from_aggregator(aggregator: &Aggregator, throttle_seconds: i64) -> Self {
        let schedules = aggregator
            .ids()
            .into_iter()
            .filter_map(|id| {
                let engine = aggregator.get(&id)?;
                let definition = engine.lock().definition().clone();
                Some(ScheduleEntry { id, definition })
            })
            .collect();
        Self {
            throttle_seconds,
            schedules,
        }
    }
}

pub fn parse_config(input: &str) -> ConfigResult<GarbageCollectionConfig> {
    let config: GarbageCollectionConfig = serde_json::from_str(input)?;
    config.validate()?;
    Ok(config)
}

pub fn load_config_from_json<P: AsRef<Path>>(path: P) -> ConfigResult<GarbageCollectionConfig> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let config: GarbageCollectionConfig = serde_json::from_reader(BufReader::new(file))?;
    config.validate()?;
    info!(path = %path.display(), schedules = config.schedules.len(), "loaded configuration");
    Ok(config)
}

pub fn save_config_to_json<P: AsRef<Path>>(
    config: &GarbageCollectionConfig,
    path: P,
) -> ConfigResult<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, config)?;
    Ok(())
}
