//! Simulation configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via RULEFSM_CONFIG or --config)
//! 3. Environment variables
//!
//! ```yaml
//! clock:
//!   start: 0
//!   stop: 7200
//!   max_step: 600
//! engine:
//!   scan: first_match
//!   granularity: 1
//! objects:
//!   - name: heater1
//!     properties:
//!       mode: { type: enumeration, keywords: { OFF: 0, ON: 1 } }
//!       temp: { type: double, value: 50 }
//!     machines:
//!       - "state:mode; rule:OFF->ON=temp<45; rule:ON->OFF=temp>55; hold:ON=10min"
//! events:
//!   - { at: 600, object: heater1, property: temp, value: 40 }
//! ```

use rulefsm_core::{MachineOptions, ScanPolicy};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Simulation configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Simulated time window.
    pub clock: ClockConfig,
    /// Options applied to every machine.
    pub engine: MachineOptions,
    /// Host objects and their machines.
    pub objects: Vec<ObjectConfig>,
    /// Timed external property changes.
    pub events: Vec<EventConfig>,
}

impl Config {
    /// Loads configuration from `path` (or RULEFSM_CONFIG), then applies
    /// environment variable overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match std::env::var("RULEFSM_CONFIG") {
                Ok(path) => Self::from_file(path)?,
                Err(_) => Self::default(),
            },
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))
    }

    /// Parses configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content)
            .map_err(|e| ConfigError::ParseError(PathBuf::from("<inline>"), e.to_string()))
    }

    fn apply_env_overrides(&mut self) {
        self.clock.apply_env_overrides();
        apply_engine_env_overrides(&mut self.engine);
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.clock.validate()?;

        if self.engine.granularity <= 0 {
            return Err(ConfigError::ValidationError(format!(
                "engine.granularity must be positive, got {}",
                self.engine.granularity
            )));
        }

        let mut names = HashSet::new();
        for object in &self.objects {
            if !names.insert(object.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate object name '{}'",
                    object.name
                )));
            }
        }

        Ok(())
    }
}

/// Simulated time window, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// First simulated time.
    pub start: i64,
    /// Last simulated time (inclusive).
    pub stop: i64,
    /// Largest advance between two steps.
    pub max_step: i64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            start: 0,
            stop: 86400,
            max_step: 3600,
        }
    }
}

impl ClockConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(start) = std::env::var("RULEFSM_START") {
            if let Ok(secs) = start.parse() {
                self.start = secs;
            }
        }

        if let Ok(stop) = std::env::var("RULEFSM_STOP") {
            if let Ok(secs) = stop.parse() {
                self.stop = secs;
            }
        }

        if let Ok(step) = std::env::var("RULEFSM_STEP") {
            if let Ok(secs) = step.parse() {
                self.max_step = secs;
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.stop < self.start {
            return Err(ConfigError::ValidationError(format!(
                "clock.stop ({}) is before clock.start ({})",
                self.stop, self.start
            )));
        }
        if self.max_step <= 0 {
            return Err(ConfigError::ValidationError(format!(
                "clock.max_step must be positive, got {}",
                self.max_step
            )));
        }
        Ok(())
    }
}

fn apply_engine_env_overrides(engine: &mut MachineOptions) {
    if let Ok(scan) = std::env::var("RULEFSM_SCAN") {
        engine.scan = match scan.to_lowercase().as_str() {
            "exhaustive" => ScanPolicy::Exhaustive,
            _ => ScanPolicy::FirstMatch,
        };
    }

    if let Ok(granularity) = std::env::var("RULEFSM_GRANULARITY") {
        if let Ok(secs) = granularity.parse() {
            engine.granularity = secs;
        }
    }
}

/// A host object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectConfig {
    pub name: String,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyConfig>,
    /// Machine configuration strings, e.g. `state:mode; rule:OFF->ON=$timer>=5`.
    #[serde(default)]
    pub machines: Vec<String>,
}

/// A property of a host object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropertyConfig {
    Enumeration {
        keywords: BTreeMap<String, i64>,
        #[serde(default)]
        value: i64,
    },
    Double {
        #[serde(default)]
        value: f64,
    },
    DoubleArray {
        values: Vec<f64>,
    },
    Text {
        #[serde(default)]
        value: String,
    },
}

/// An external change to a property at a given time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventConfig {
    pub at: i64,
    pub object: String,
    pub property: String,
    /// Array element for `double_array` properties.
    #[serde(default)]
    pub index: usize,
    pub value: f64,
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
clock:
  start: 0
  stop: 3600
  max_step: 60
engine:
  scan: exhaustive
objects:
  - name: heater1
    properties:
      mode: { type: enumeration, keywords: { OFF: 0, ON: 1 } }
      temp: { type: double, value: 50 }
      limits: { type: double_array, values: [45, 55] }
      label: { type: text, value: basement }
    machines:
      - "state:mode; rule:OFF->ON=temp<limits#OFF"
events:
  - { at: 600, object: heater1, property: temp, value: 40 }
"#;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.clock.start, 0);
        assert_eq!(config.clock.stop, 86400);
        assert_eq!(config.engine.scan, ScanPolicy::FirstMatch);
        assert_eq!(config.engine.granularity, 1);
        assert!(config.objects.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_sample() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.clock.max_step, 60);
        assert_eq!(config.engine.scan, ScanPolicy::Exhaustive);
        // Unspecified engine fields keep their defaults.
        assert_eq!(config.engine.granularity, 1);

        let object = &config.objects[0];
        assert_eq!(object.name, "heater1");
        assert_eq!(object.machines.len(), 1);
        match &object.properties["mode"] {
            PropertyConfig::Enumeration { keywords, value } => {
                assert_eq!(keywords["ON"], 1);
                assert_eq!(*value, 0);
            }
            other => panic!("unexpected property {:?}", other),
        }
        assert!(matches!(
            object.properties["limits"],
            PropertyConfig::DoubleArray { .. }
        ));
        assert_eq!(config.events[0].index, 0);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.objects.len(), 1);

        let missing = Config::from_file("/nonexistent/rulefsm.yaml").unwrap_err();
        assert!(matches!(missing, ConfigError::IoError(..)));
    }

    #[test]
    fn test_yaml_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.yaml");
        let config = Config::from_yaml(SAMPLE).unwrap();
        config.save(&path).unwrap();

        let parsed = Config::from_file(&path).unwrap();
        assert_eq!(parsed.clock.stop, config.clock.stop);
        assert_eq!(parsed.objects[0].machines, config.objects[0].machines);
    }

    #[test]
    fn test_parse_error() {
        let err = Config::from_yaml("objects: [ { name: 3, properties: nope } ]").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(..)));
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.clock.stop = -1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.clock.max_step = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.engine.granularity = 0;
        assert!(config.validate().is_err());

        let config = Config::from_yaml("objects: [ { name: a }, { name: a } ]").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }
}
