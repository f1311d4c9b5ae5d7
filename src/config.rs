// Configuration parsing for zram-tune
// SPDX-License-Identifier: GPL-3.0-or-later

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use glob::glob;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Missing key: {0}")]
    MissingKey(String),
    #[error("Parse error for {0}: {1}")]
    ParseError(String, String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration paths
pub const DEF_CONFIG: &str = "/usr/share/zram-tune/default.conf";
pub const ETC_CONFIG: &str = "/etc/zram-tune.conf";
pub const VEN_DIR: &str = "/usr/lib";
pub const RUN_DIR: &str = "/run";
pub const ETC_DIR: &str = "/etc";

/// Key prefix for default preset overrides: `preset.<tunable>.<field>=value`
pub const PRESET_PREFIX: &str = "preset.";

/// Configuration holder
#[derive(Debug, Clone, Default)]
pub struct Config {
    values: HashMap<String, String>,
}

impl Config {
    /// Load configuration from all sources
    pub fn load() -> Result<Self> {
        let mut values = HashMap::new();

        if Path::new(DEF_CONFIG).exists() {
            if let Ok(cfg) = Self::parse_file(DEF_CONFIG) {
                values.extend(cfg);
            }
        }

        if Path::new(ETC_CONFIG).exists() {
            match Self::parse_file(ETC_CONFIG) {
                Ok(cfg) => values.extend(cfg),
                Err(e) => warn!("Could not load {}: {}", ETC_CONFIG, e),
            }
        }

        // conf.d fragments (etc > run > lib for same basename)
        let mut config_files: HashMap<String, String> = HashMap::new();
        for base_path in [VEN_DIR, RUN_DIR, ETC_DIR] {
            let pattern = format!("{}/zram-tune.conf.d/*.conf", base_path);
            if let Ok(entries) = glob(&pattern) {
                for entry in entries.flatten() {
                    if !entry.is_file() {
                        continue;
                    }
                    if let (Some(basename), Some(path_str)) = (entry.file_name(), entry.to_str()) {
                        debug!("Found {}", path_str);
                        config_files
                            .insert(basename.to_string_lossy().to_string(), path_str.to_string());
                    }
                }
            }
        }

        let mut sorted_files: Vec<_> = config_files.into_iter().collect();
        sorted_files.sort_by(|a, b| a.0.cmp(&b.0));

        for (_, path) in sorted_files {
            info!("Load: {}", path);
            match Self::parse_file(&path) {
                Ok(cfg) => values.extend(cfg),
                Err(e) => warn!("Could not load {}: {}", path, e),
            }
        }

        Ok(Self { values })
    }

    /// Build a configuration from in-memory `key=value` text
    pub fn parse_str(content: &str) -> Self {
        Self {
            values: Self::parse_lines(content),
        }
    }

    fn parse_file<P: AsRef<Path>>(path: P) -> Result<HashMap<String, String>> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse_lines(&content))
    }

    fn parse_lines(content: &str) -> HashMap<String, String> {
        let mut config = HashMap::new();

        for line in content.lines() {
            let line = line.trim();

            if line.starts_with('#') || !line.contains('=') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let value = value.trim().trim_matches('"');
                config.insert(key.trim().to_string(), value.to_string());
            }
        }

        config
    }

    /// Get a string value
    pub fn get(&self, key: &str) -> Result<&str> {
        self.values
            .get(key)
            .map(|s| s.as_str())
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))
    }

    /// Get value as specific type
    pub fn get_as<T: std::str::FromStr>(&self, key: &str) -> Result<T>
    where
        T::Err: std::fmt::Display,
    {
        let value = self.get(key)?;
        value
            .parse()
            .map_err(|e: T::Err| ConfigError::ParseError(key.to_string(), e.to_string()))
    }

    /// Get optional value
    pub fn get_opt(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    /// All `preset.<tunable>.*` entries, keyed by field name
    pub fn preset_overrides(&self, tunable: &str) -> Vec<(&str, &str)> {
        let prefix = format!("{}{}.", PRESET_PREFIX, tunable);
        let mut overrides: Vec<(&str, &str)> = self
            .values
            .iter()
            .filter_map(|(k, v)| k.strip_prefix(&prefix).map(|field| (field, v.as_str())))
            .filter(|(field, _)| !field.is_empty())
            .collect();
        overrides.sort();
        overrides
    }
}
