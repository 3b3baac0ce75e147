//! Configuration file definitions for the demo

use parley_core::prelude::*;
use serde::Deserialize;
use thiserror::Error;
use tracing_core::LevelFilter;

use std::{
    collections::HashMap,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

/// Errors that could happen when loading or processing a config
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error on {1}: {0}")]
    IoError(std::io::Error, PathBuf),
    #[error("JSON parse error in {1}: {0}")]
    JsonError(serde_json::Error, PathBuf),
    #[error("{1}: {0}")]
    FormatError(String, PathBuf),
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuiltinLogTarget {
    Stdout,
    Stderr,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum LogTarget {
    File { filename: PathBuf },
    Builtin(BuiltinLogTarget),
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Off,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LogEntry {
    pub target: LogTarget,
    #[serde(default)]
    pub modules: Vec<String>,
    pub level: Option<LogLevel>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoggingConfig {
    /// Directory for file log targets
    pub dir: PathBuf,
    pub default_level: Option<LogLevel>,
    #[serde(default)]
    pub module_levels: HashMap<String, LogLevel>,
    pub targets: Vec<LogEntry>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            default_level: Some(LogLevel::Info),
            module_levels: HashMap::new(),
            targets: vec![LogEntry {
                target: LogTarget::Builtin(BuiltinLogTarget::Stderr),
                modules: Vec::new(),
                level: None,
            }],
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(arg: LogLevel) -> LevelFilter {
        match arg {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Off => LevelFilter::OFF,
        }
    }
}

/// A network for the generator to simulate
#[derive(Clone, Debug, Deserialize)]
pub struct DemoNetwork {
    pub name: String,
    pub nick: String,
    pub channels: Vec<String>,
}

impl DemoNetwork {
    pub fn scopes(&self) -> impl Iterator<Item = Scope> + '_ {
        self.channels
            .iter()
            .map(move |channel| Scope::channel(self.name.clone(), channel.clone()))
    }
}

fn default_interval() -> u64 {
    250
}

fn default_message_count() -> usize {
    100
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DemoConfig {
    pub networks: Vec<DemoNetwork>,
    /// Delay between generated messages
    #[serde(default = "default_interval")]
    pub interval_ms: u64,
    /// Number of messages to generate before stopping
    #[serde(default = "default_message_count")]
    pub message_count: usize,
    /// Historical events loaded into each channel before live traffic starts
    #[serde(default)]
    pub backfill: usize,
    /// Simulate a reconnect every this many messages; 0 never reconnects
    #[serde(default)]
    pub reconnect_every: usize,
    /// Simulated time taken by each render
    #[serde(default)]
    pub render_delay_ms: u64,
    /// The scope shown on the demo's display surface
    pub surface: Scope,
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    #[serde(default)]
    pub log: LoggingConfig,
}

impl DemoConfig {
    /// Load the demo configuration from a given file path
    pub fn load_file<P: AsRef<Path> + Copy>(filename: P) -> Result<Self, ConfigError> {
        let file = File::open(filename)
            .map_err(|e| ConfigError::IoError(e, filename.as_ref().to_owned()))?;
        let reader = BufReader::new(file);
        let config: Self = serde_json::from_reader(reader)
            .map_err(|e| ConfigError::JsonError(e, filename.as_ref().to_owned()))?;

        config
            .validate()
            .map_err(|e| ConfigError::FormatError(e, filename.as_ref().to_owned()))?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.networks.is_empty() {
            return Err("No networks configured".to_string());
        }

        let surface_known = self.networks.iter().any(|n| {
            n.name == self.surface.network
                && self
                    .surface
                    .name()
                    .map_or(true, |name| n.channels.iter().any(|c| c == name))
        });
        if !surface_known {
            return Err(format!("Surface {} is not a configured scope", self.surface));
        }
        Ok(())
    }
}
