//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.surveytab.toml` files.

use crate::cli::{Args, Command};
use crate::labels::{AxisOverride, OverrideTable};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = ".surveytab.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Generation model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Label and metadata settings.
    #[serde(default)]
    pub labels: LabelsConfig,

    /// Fixed code tables for override axes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<AxisOverride>,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory for output files when no explicit path is given.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            verbose: false,
        }
    }
}

fn default_output_dir() -> String {
    ".".to_string()
}

/// Text generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Gemini model name.
    #[serde(default = "default_model")]
    pub name: String,

    /// Base URL of the Gemini REST API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// API key. Prefer the GEMINI_API_KEY environment variable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens in a response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Minimum delay between requests in per-pair mode.
    #[serde(default = "default_interval")]
    pub request_interval_seconds: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            api_url: default_api_url(),
            api_key: None,
            temperature: default_temperature(),
            max_output_tokens: None,
            timeout_seconds: default_timeout(),
            request_interval_seconds: default_interval(),
        }
    }
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_api_url() -> String {
    crate::generation::DEFAULT_API_URL.to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_timeout() -> u64 {
    120
}

fn default_interval() -> u64 {
    4 // free-tier rate limit
}

/// Label resolution and metadata parsing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelsConfig {
    /// Attribute name of the whole-sample rows in aggregate files.
    #[serde(default = "default_overall")]
    pub overall_attribute: String,

    /// Require `type` in every definition block.
    #[serde(default)]
    pub strict_metadata: bool,

    /// Start from the built-in area and age tables.
    #[serde(default = "default_true")]
    pub builtin_overrides: bool,
}

impl Default for LabelsConfig {
    fn default() -> Self {
        Self {
            overall_attribute: default_overall(),
            strict_metadata: false,
            builtin_overrides: true,
        }
    }
}

fn default_overall() -> String {
    "Overall".to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &Args) {
        if args.verbose {
            self.general.verbose = true;
        }

        match &args.command {
            Command::Narrate(narrate) => {
                if let Some(ref model) = narrate.model {
                    self.model.name = model.clone();
                }
                if let Some(ref key) = narrate.api_key {
                    self.model.api_key = Some(key.clone());
                }
                if let Some(temperature) = narrate.temperature {
                    self.model.temperature = temperature;
                }
                if let Some(timeout) = narrate.timeout {
                    self.model.timeout_seconds = timeout;
                }
                if let Some(interval) = narrate.interval {
                    self.model.request_interval_seconds = interval;
                }
                if let Some(ref overall) = narrate.overall {
                    self.labels.overall_attribute = overall.clone();
                }
            }
            Command::Questions(a) => self.merge_metadata_flag(a.metadata.strict),
            Command::Tidy(a) => self.merge_metadata_flag(a.metadata.strict),
            Command::Crosstab(a) => self.merge_metadata_flag(a.metadata.strict),
            Command::AxisReport(a) => self.merge_metadata_flag(a.metadata.strict),
            Command::Percentages(_) | Command::SampleAggregate(_) | Command::InitConfig => {}
        }
    }

    fn merge_metadata_flag(&mut self, strict: bool) {
        if strict {
            self.labels.strict_metadata = true;
        }
    }

    /// Override tables: built-ins (unless disabled) with configured axes on top.
    pub fn override_table(&self) -> OverrideTable {
        if self.labels.builtin_overrides {
            let mut table = OverrideTable::builtin();
            table.apply(&self.overrides);
            table
        } else {
            OverrideTable::from_overrides(&self.overrides)
        }
    }

    /// Resolve a path against `general.output_dir` unless it is given explicitly.
    pub fn output_path(&self, explicit: Option<&Path>, default_name: &str) -> PathBuf {
        match explicit {
            Some(path) => path.to_path_buf(),
            None => Path::new(&self.general.output_dir).join(default_name),
        }
    }

    /// Generate a default configuration file content.
    ///
    /// The built-in override tables are written out so they can be edited.
    pub fn default_toml() -> String {
        let config = Config {
            overrides: OverrideTable::builtin().to_overrides(),
            ..Config::default()
        };
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
