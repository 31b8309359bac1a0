//! TOML-based application configuration.
//!
//! Stores the generation horizon and output bounds used by the planner, and
//! a few display preferences. Located at `PLANUST_CONFIG` if set, otherwise
//! `~/.config/planust/config.toml` (platform config dir).

use std::fs;
use std::path::PathBuf;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// How far ahead and how much the planner generates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationConfig {
    /// Task instances are generated this many weeks past the window start.
    #[serde(default = "default_ahead_weeks")]
    pub ahead_weeks: u32,
    /// Upper bound on instances produced by a single call.
    #[serde(default = "default_max_instances")]
    pub max_instances_per_call: usize,
    /// Carry cancelled flags and overrides over when meetings are regenerated.
    #[serde(default)]
    pub preserve_meeting_overrides: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisplayConfig {
    #[serde(default = "default_agenda_days")]
    pub agenda_days: u32,
    /// Used for courses created without an explicit color.
    #[serde(default = "default_course_color")]
    pub default_course_color: String,
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

fn default_ahead_weeks() -> u32 {
    8
}
fn default_max_instances() -> usize {
    5000
}
fn default_agenda_days() -> u32 {
    7
}
fn default_course_color() -> String {
    "#4F81BD".into()
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            ahead_weeks: default_ahead_weeks(),
            max_instances_per_call: default_max_instances(),
            preserve_meeting_overrides: false,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            agenda_days: default_agenda_days(),
            default_course_color: default_course_color(),
        }
    }
}

impl GenerationConfig {
    pub fn ahead(&self) -> Duration {
        Duration::weeks(i64::from(self.ahead_weeks))
    }
}

/// Returns the path to the config file.
pub fn config_path() -> PathBuf {
    std::env::var("PLANUST_CONFIG").map(PathBuf::from).unwrap_or_else(|_| {
        let mut p = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        p.push("planust");
        p.push("config.toml");
        p
    })
}

impl Config {
    /// Loads the config, falling back to defaults when the file does not exist.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }
        let s = fs::read_to_string(&path)?;
        Self::from_toml(&s)
    }

    pub fn from_toml(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Writes the config file, creating its directory if needed.
    pub fn save(&self) -> Result<PathBuf> {
        let path = config_path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&path, self.to_toml()?)?;
        Ok(path)
    }
}
