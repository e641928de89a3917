//! Configuration for chanscribe.
//!
//! Configuration sources (highest priority first):
//! 1. CLI flags (applied by the caller after loading)
//! 2. Environment variables (CHANSCRIBE_API_KEY or YOUTUBE_API_KEY, CHANSCRIBE_OUTPUT)
//! 3. Config file (chanscribe.yaml)
//! 4. Defaults
//!
//! Config file discovery:
//! - An explicit `--config` path wins
//! - Otherwise searches the current directory and parents for chanscribe.yaml
//! - Otherwise falls back to <config_dir>/chanscribe/config.yaml
//! - A relative `output_dir` in a config file is relative to that file's directory
//!
//! The resolved [`Config`] is built once at startup and passed by reference.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::adapters::ChannelRef;
use crate::core::{seconds, ClassificationTables, ProgressStore, RetryPolicy};

/// File name searched for in the working directory and its parents
pub const CONFIG_FILE_NAME: &str = "chanscribe.yaml";

pub const ENV_API_KEY: &str = "CHANSCRIBE_API_KEY";

/// Read when CHANSCRIBE_API_KEY is unset
pub const ENV_API_KEY_FALLBACK: &str = "YOUTUBE_API_KEY";
pub const ENV_OUTPUT: &str = "CHANSCRIBE_OUTPUT";

/// Which channel to extract
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Handle such as "@SomeChannel"
    pub handle: Option<String>,

    /// Channel id such as "UC..."; preferred over the handle when both are set
    pub id: Option<String>,
}

impl ChannelConfig {
    pub fn channel_ref(&self) -> Option<ChannelRef> {
        let present = |v: &Option<String>| v.as_ref().filter(|s| !s.trim().is_empty()).cloned();

        present(&self.id)
            .map(ChannelRef::Id)
            .or_else(|| present(&self.handle).map(ChannelRef::Handle))
    }
}

/// Batch extraction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    /// Items per batch; progress is committed at batch boundaries
    pub batch_size: usize,

    /// Fixed delay after every processed item
    pub rate_limit_seconds: f64,

    /// Transcript attempts per item (including the first)
    pub max_retries: u32,

    /// Backoff base: wait `base^attempt` seconds between attempts
    pub backoff_base: f64,

    /// Pause between batches (not after the last one)
    pub batch_pause_seconds: f64,

    /// Continue from the stored progress file
    pub resume: bool,

    /// Preferred transcript languages, in order
    pub language_priority: Vec<String>,

    /// Take the first offered track when no preferred language exists
    pub fallback_to_any_language: bool,

    /// Cap on enumerated items
    pub max_items: Option<usize>,

    /// Deadline for each remote call; a call that runs past it counts as failed
    pub request_timeout_seconds: f64,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            batch_size: 50,
            rate_limit_seconds: 2.0,
            max_retries: 3,
            backoff_base: 2.0,
            batch_pause_seconds: 5.0,
            resume: true,
            language_priority: ["en", "en-US", "en-GB", "he", "iw"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            fallback_to_any_language: true,
            max_items: None,
            request_timeout_seconds: 30.0,
        }
    }
}

impl ExtractionSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.backoff_base)
    }

    pub fn request_timeout(&self) -> Duration {
        seconds(self.request_timeout_seconds)
    }
}

/// Resolved configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub channel: ChannelConfig,

    /// Data API key; enumeration needs it
    pub api_key: Option<String>,

    /// Root of the transcript tree, reports and progress file
    pub output_dir: PathBuf,

    pub extraction: ExtractionSettings,

    /// Lay transcripts out as <category>/<subcategory>/
    pub organize_by_category: bool,

    pub classification: ClassificationTables,

    /// File the configuration was loaded from
    #[serde(skip)]
    pub config_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channel: ChannelConfig::default(),
            api_key: None,
            output_dir: PathBuf::from("transcripts"),
            extraction: ExtractionSettings::default(),
            organize_by_category: true,
            classification: ClassificationTables::default(),
            config_file: None,
        }
    }
}

/// Find the config file by searching `start` and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let candidate = current.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Per-user fallback location
fn user_config_file() -> Option<PathBuf> {
    dirs::config_dir()
        .map(|d| d.join("chanscribe").join("config.yaml"))
        .filter(|p| p.is_file())
}

impl Config {
    /// Parse a YAML document
    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty document means "all defaults"
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).context("Failed to parse configuration YAML")
    }

    /// Load a config file; a relative output_dir is resolved against its directory
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config = Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        if config.output_dir.is_relative() {
            if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                config.output_dir = base.join(&config.output_dir);
            }
        }
        config.config_file = Some(path.to_path_buf());
        Ok(config)
    }

    /// Discover the config file for the current working directory
    pub fn discover() -> Option<PathBuf> {
        std::env::current_dir()
            .ok()
            .and_then(|cwd| find_config_file(&cwd))
            .or_else(user_config_file)
    }

    /// Load configuration from all sources except CLI flags
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => {
                if !p.is_file() {
                    anyhow::bail!("Config file not found: {}", p.display());
                }
                Some(p.to_path_buf())
            }
            None => Self::discover(),
        };

        let mut config = match path {
            Some(ref p) => Self::from_file(p)?,
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = present(ENV_API_KEY).or_else(|| present(ENV_API_KEY_FALLBACK)) {
            self.api_key = Some(key);
        }
        if let Some(dir) = present(ENV_OUTPUT) {
            self.output_dir = PathBuf::from(dir);
        }
    }

    /// Check the settings a run depends on
    pub fn validate(&self) -> Result<()> {
        let ex = &self.extraction;

        if ex.batch_size == 0 {
            anyhow::bail!("extraction.batch_size must be at least 1");
        }
        if ex.max_retries == 0 {
            anyhow::bail!("extraction.max_retries must be at least 1");
        }
        if ex.max_items == Some(0) {
            anyhow::bail!("extraction.max_items must be at least 1 (omit it to extract every item)");
        }
        if !ex.request_timeout_seconds.is_finite() || ex.request_timeout_seconds <= 0.0 {
            anyhow::bail!("extraction.request_timeout_seconds must be a positive number");
        }
        for (name, value) in [
            ("rate_limit_seconds", ex.rate_limit_seconds),
            ("batch_pause_seconds", ex.batch_pause_seconds),
            ("backoff_base", ex.backoff_base),
        ] {
            if !value.is_finite() || value < 0.0 {
                anyhow::bail!("extraction.{} must be a non-negative number", name);
            }
        }
        if self.channel.channel_ref().is_none() {
            anyhow::bail!("No channel configured (set channel.handle or channel.id)");
        }

        Ok(())
    }

    /// The configured channel, or an error naming the missing setting
    pub fn channel_ref(&self) -> Result<ChannelRef> {
        self.channel
            .channel_ref()
            .context("No channel configured (set channel.handle or channel.id)")
    }

    /// Progress store for this output directory
    pub fn progress_store(&self) -> ProgressStore {
        ProgressStore::in_dir(&self.output_dir)
    }

    /// Copy suitable for display, with the API key masked
    pub fn redacted(&self) -> Self {
        let mut shown = self.clone();
        if shown.api_key.is_some() {
            shown.api_key = Some("********".to_string());
        }
        shown
    }
}
