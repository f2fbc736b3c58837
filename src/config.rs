//! Configuration loader and validator for the shift reflection engine.
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::availability::{GridBuilder, WindowParser};
use crate::timegrid::{GridError, TimeGrid};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
    #[error("Invalid operating window: {0}")]
    Grid(#[from] GridError),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub schedule: Schedule,
    pub labels: Labels,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
}

/// Operating hours, grid shape and batch limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schedule {
    #[serde(with = "hm")]
    pub default_open: NaiveTime,
    #[serde(with = "hm")]
    pub default_close: NaiveTime,
    #[serde(with = "hm")]
    pub operating_window_start: NaiveTime,
    #[serde(with = "hm")]
    pub operating_window_end: NaiveTime,
    pub slot_step_minutes: u32,
    pub batch_cap: usize,
    pub cache_freshness_seconds: u64,
}

/// Cell strings the sheet uses for statuses and sentinels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Labels {
    pub no_preference: Vec<String>,
    pub wish_available: String,
    pub wish_unavailable: String,
    pub submitted: String,
    pub not_submitted: String,
    pub reflected: String,
    pub not_reflected: String,
    pub shared: String,
    pub not_shared: String,
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        fs::create_dir_all(&self.app.data_dir)
    }

    pub fn database_url(&self) -> String {
        format!("sqlite://{}/shifts.db", self.app.data_dir.trim_end_matches('/'))
    }

    pub fn time_grid(&self) -> Result<TimeGrid, GridError> {
        TimeGrid::new(
            self.schedule.operating_window_start,
            self.schedule.operating_window_end,
            self.schedule.slot_step_minutes,
        )
    }

    pub fn grid_builder(&self) -> Result<GridBuilder, GridError> {
        Ok(GridBuilder::new(
            self.time_grid()?,
            self.schedule.default_open,
            self.schedule.default_close,
        ))
    }

    pub fn window_parser(&self) -> WindowParser {
        WindowParser::new(self.labels.no_preference.iter().cloned())
    }

    pub fn cache_freshness(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.schedule.cache_freshness_seconds as i64)
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }

    let s = &cfg.schedule;
    if s.default_open >= s.default_close {
        return Err(ConfigError::Invalid(
            "schedule.default_open must be before schedule.default_close",
        ));
    }
    if s.batch_cap == 0 {
        return Err(ConfigError::Invalid("schedule.batch_cap must be > 0"));
    }
    if s.cache_freshness_seconds == 0 {
        return Err(ConfigError::Invalid("schedule.cache_freshness_seconds must be > 0"));
    }
    cfg.time_grid()?;

    let l = &cfg.labels;
    if l.no_preference.is_empty() || l.no_preference.iter().any(|s| s.trim().is_empty()) {
        return Err(ConfigError::Invalid("labels.no_preference must list non-empty strings"));
    }
    let pairs = [
        (&l.wish_available, &l.wish_unavailable),
        (&l.submitted, &l.not_submitted),
        (&l.reflected, &l.not_reflected),
        (&l.shared, &l.not_shared),
    ];
    for (yes, no) in pairs {
        if yes.trim().is_empty() || no.trim().is_empty() {
            return Err(ConfigError::Invalid("status labels must be non-empty"));
        }
        if yes == no {
            return Err(ConfigError::Invalid("paired status labels must differ"));
        }
    }

    Ok(())
}

/// `H:mm` times in YAML.
mod hm {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    use crate::timegrid::{format_hm, parse_time_of_day};

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_hm(*t))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse_time_of_day(&raw).map_err(de::Error::custom)
    }
}

/// Returns the example YAML content.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"

schedule:
  # Used when a member leaves a side blank, writes "no preference",
  # or enters something that is not a time.
  default_open: "8:00"
  default_close: "22:00"
  # Slot rows on each daily sheet: [start, end) in fixed steps.
  operating_window_start: "8:00"
  operating_window_end: "22:00"
  slot_step_minutes: 30
  # Members reflected per run; the rest wait for the next run.
  batch_cap: 15
  cache_freshness_seconds: 300

labels:
  no_preference:
    - "指定なし"
    - "unspecified"
  wish_available: "◯"
  wish_unavailable: "×"
  submitted: "✅提出済み"
  not_submitted: "未提出"
  reflected: "✅反映済み"
  not_reflected: "未反映"
  shared: "✅共有済み"
  not_shared: "未共有"
"#
}
