// Configuration file support (logmill.toml)

use crate::error::{LogmillError, Result};
use crate::handler::{HandlerConfig, LevelThreshold, SinkTarget};
use crate::logger::Logger;
use crate::record::CollectionRequirements;
use crate::sink::{Colorize, ConsoleStream};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub logmill: Option<LogmillConfig>,
}

#[derive(Debug, Deserialize, Default)]
pub struct LogmillConfig {
    #[serde(default)]
    pub level: Option<Vec<LevelSection>>,
    #[serde(default)]
    pub handler: Option<Vec<HandlerSection>>,
}

/// A `[[logmill.level]]` entry declaring a custom level.
#[derive(Debug, Deserialize, Default)]
pub struct LevelSection {
    pub name: String,
    pub no: u16,
    pub color: Option<String>,
    pub icon: Option<String>,
}

/// A `[[logmill.handler]]` entry. Exactly one of `path` and `stream` must
/// be set.
#[derive(Debug, Deserialize, Default)]
pub struct HandlerSection {
    pub path: Option<String>,
    pub stream: Option<String>,
    pub level: Option<String>,
    pub format: Option<String>,
    pub rotation: Option<String>,
    pub retention: Option<String>,
    pub compression: Option<bool>,
    pub serialize: Option<bool>,
    pub enqueue: Option<bool>,
    pub colorize: Option<Colorize>,
    pub queue_capacity: Option<usize>,
    pub buffer_size: Option<usize>,
    pub collect: Option<CollectSection>,
}

#[derive(Debug, Deserialize, Default, Clone, Copy)]
pub struct CollectSection {
    #[serde(default)]
    pub caller: bool,
    #[serde(default)]
    pub thread: bool,
    #[serde(default)]
    pub process: bool,
    #[serde(default)]
    pub elapsed: bool,
}

impl HandlerSection {
    fn into_config(self) -> Result<HandlerConfig> {
        let sink = match (self.path, self.stream) {
            (Some(path), None) => SinkTarget::Path(PathBuf::from(path)),
            (None, Some(stream)) => match stream.to_lowercase().as_str() {
                "stdout" => SinkTarget::Console(ConsoleStream::Stdout),
                "stderr" => SinkTarget::Console(ConsoleStream::Stderr),
                other => {
                    return Err(LogmillError::InvalidConfig(format!(
                        "unknown stream: {}",
                        other
                    )));
                }
            },
            (Some(_), Some(_)) => {
                return Err(LogmillError::InvalidConfig(
                    "handler declares both path and stream".to_string(),
                ));
            }
            (None, None) => {
                return Err(LogmillError::InvalidConfig(
                    "handler declares neither path nor stream".to_string(),
                ));
            }
        };

        let defaults = HandlerConfig::default();
        Ok(HandlerConfig {
            sink,
            level: self
                .level
                .map(LevelThreshold::Name)
                .unwrap_or_default(),
            format: self.format,
            rotation: self.rotation,
            retention: self.retention,
            compression: self.compression.unwrap_or(false),
            serialize: self.serialize.unwrap_or(false),
            filter: None,
            enqueue: self.enqueue.unwrap_or(false),
            queue_capacity: self.queue_capacity.unwrap_or(defaults.queue_capacity),
            colorize: self.colorize.unwrap_or_default(),
            collect: self.collect.map(|c| CollectionRequirements {
                caller: c.caller,
                thread: c.thread,
                process: c.process,
                elapsed: c.elapsed,
            }),
            buffer_size: self.buffer_size.unwrap_or(defaults.buffer_size),
        })
    }
}

pub struct ConfigFileLoader {
    scan_enabled: bool,
    custom_path: Option<PathBuf>,
}

impl ConfigFileLoader {
    pub fn new() -> Self {
        Self {
            scan_enabled: true,
            custom_path: None,
        }
    }

    pub fn disable_scan(&mut self) {
        self.scan_enabled = false;
    }

    pub fn set_custom_path(&mut self, path: PathBuf) {
        self.custom_path = Some(path);
    }

    /// Parses the config file. Returns Ok(None) when scanning is enabled
    /// and no `logmill.toml` is present.
    pub fn load(&self) -> Result<Option<ConfigFile>> {
        let config_path = if let Some(ref path) = self.custom_path {
            if !path.exists() {
                return Err(LogmillError::InvalidConfig(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            path.clone()
        } else {
            if !self.scan_enabled {
                return Ok(None);
            }
            let default_path = PathBuf::from("logmill.toml");
            if !default_path.exists() {
                return Ok(None);
            }
            default_path
        };

        let content = fs::read_to_string(&config_path)
            .map_err(|e| LogmillError::InvalidConfig(format!("failed to read config file: {}", e)))?;
        let config: ConfigFile = toml::from_str(&content)
            .map_err(|e| LogmillError::InvalidConfig(format!("failed to parse config file: {}", e)))?;
        Ok(Some(config))
    }
}

impl Default for ConfigFileLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger {
    /// Registers the levels and handlers a `logmill.toml` declares.
    /// Returns the ids of the added handlers.
    pub fn configure_from_file(&self, path: &Path) -> Result<Vec<u64>> {
        let mut loader = ConfigFileLoader::new();
        loader.set_custom_path(path.to_path_buf());
        let Some(config) = loader.load()? else {
            return Ok(Vec::new());
        };
        let Some(config) = config.logmill else {
            return Ok(Vec::new());
        };

        for level in config.level.unwrap_or_default() {
            self.register_level(
                &level.name,
                level.no,
                level.color.as_deref(),
                level.icon.as_deref(),
            )?;
        }

        let mut ids = Vec::new();
        for section in config.handler.unwrap_or_default() {
            ids.push(self.add(section.into_config()?)?);
        }
        Ok(ids)
    }
}
