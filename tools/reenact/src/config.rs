use crate::errors::ReenactError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_SAMPLING_FREQUENCY_HZ: f64 = 30.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub recorder: RecorderConfig,
    pub events: EventsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecorderConfig {
    pub sampling_frequency_hz: f64,
    pub record_continuous_transforms: bool,
    pub stop_after_first_release: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventsConfig {
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    pub path: Option<PathBuf>,
    pub max_payload_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            recorder: RecorderConfig::default(),
            events: EventsConfig::default(),
            logging: LoggingConfig {
                path: None,
                max_payload_bytes: crate::logging::DEFAULT_MAX_PAYLOAD_BYTES,
            },
        }
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            sampling_frequency_hz: DEFAULT_SAMPLING_FREQUENCY_HZ,
            record_continuous_transforms: true,
            stop_after_first_release: true,
        }
    }
}

impl RecorderConfig {
    /// Minimum spacing in seconds between two snapshots of one object.
    pub fn sample_interval(&self) -> f64 {
        1.0 / self.sampling_frequency_hz
    }

    pub fn validate(&self) -> Result<(), ReenactError> {
        let hz = self.sampling_frequency_hz;
        if !hz.is_finite() || hz <= 0.0 {
            return Err(ReenactError::InvalidConfig(
                "recorder.sampling_frequency_hz must be a positive finite number".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialAppConfig {
    recorder: Option<PartialRecorderConfig>,
    events: Option<PartialEventsConfig>,
    logging: Option<PartialLoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialRecorderConfig {
    sampling_frequency_hz: Option<f64>,
    record_continuous_transforms: Option<bool>,
    stop_after_first_release: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialEventsConfig {
    channel_capacity: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialLoggingConfig {
    path: Option<PathBuf>,
    max_payload_bytes: Option<usize>,
}

/// Load `path` over the defaults, or the defaults alone when `path` is `None`.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ReenactError> {
    let Some(path) = path else {
        return Ok(AppConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|e| ReenactError::Io(format!("{}: {e}", path.display())))?;
    parse_config(&text)
}

pub fn parse_config(text: &str) -> Result<AppConfig, ReenactError> {
    let partial: PartialAppConfig =
        toml::from_str(text).map_err(|e| ReenactError::ConfigParse(e.to_string()))?;
    let mut cfg = AppConfig::default();
    apply_partial(&mut cfg, partial);
    validate_config(&cfg)?;
    Ok(cfg)
}

fn apply_partial(cfg: &mut AppConfig, partial: PartialAppConfig) {
    if let Some(recorder) = partial.recorder {
        if let Some(value) = recorder.sampling_frequency_hz {
            cfg.recorder.sampling_frequency_hz = value;
        }
        if let Some(value) = recorder.record_continuous_transforms {
            cfg.recorder.record_continuous_transforms = value;
        }
        if let Some(value) = recorder.stop_after_first_release {
            cfg.recorder.stop_after_first_release = value;
        }
    }

    if let Some(events) = partial.events {
        if let Some(value) = events.channel_capacity {
            cfg.events.channel_capacity = value;
        }
    }

    if let Some(logging) = partial.logging {
        if logging.path.is_some() {
            cfg.logging.path = logging.path;
        }
        if let Some(value) = logging.max_payload_bytes {
            cfg.logging.max_payload_bytes = value;
        }
    }
}

pub fn validate_config(cfg: &AppConfig) -> Result<(), ReenactError> {
    cfg.recorder.validate()?;

    if cfg.events.channel_capacity == 0 {
        return Err(ReenactError::InvalidConfig(
            "events.channel_capacity must be greater than zero".to_string(),
        ));
    }

    if cfg.logging.max_payload_bytes < 16 {
        return Err(ReenactError::InvalidConfig(
            "logging.max_payload_bytes must be at least 16".to_string(),
        ));
    }

    Ok(())
}
