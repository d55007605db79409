use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::eyre::{Result, eyre};
use serde::Deserialize;

use crate::monitor::{MonitorConfig, TrackingMode};
use crate::view::{SortKey, SortOrder, ViewOptions};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub refresh_rate_ms: u64,
    pub sample_interval_ms: u64,
    pub mode: String,
    pub default_sort: String,
    pub default_order: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            refresh_rate_ms: 2000,
            sample_interval_ms: 4000,
            mode: "all".to_string(),
            default_sort: "none".to_string(),
            default_order: "none".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub enumerator_workers: usize,
    pub snapshot_queue: usize,
    pub display_queue: usize,
    pub action_queue: usize,
    pub termination_queue: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            enumerator_workers: 16,
            snapshot_queue: 4,
            display_queue: 4,
            action_queue: 16,
            termination_queue: 16,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    pub fn file_path(&self) -> PathBuf {
        self.file.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("hyprtask")
                .join("hyprtask.log")
        })
    }
}

impl Config {
    /// Checks values that would leave the pipeline unusable.
    pub fn validate(&self) -> Result<()> {
        if self.general.refresh_rate_ms == 0 {
            return Err(eyre!("refresh_rate_ms must be greater than 0"));
        }
        if self.general.sample_interval_ms == 0 {
            return Err(eyre!("sample_interval_ms must be greater than 0"));
        }
        self.tracking_mode()?;
        let p = &self.pipeline;
        for (name, value) in [
            ("enumerator_workers", p.enumerator_workers),
            ("snapshot_queue", p.snapshot_queue),
            ("display_queue", p.display_queue),
            ("action_queue", p.action_queue),
            ("termination_queue", p.termination_queue),
        ] {
            if value == 0 {
                return Err(eyre!("{name} must be greater than 0"));
            }
        }
        Ok(())
    }

    pub fn tracking_mode(&self) -> Result<TrackingMode> {
        self.general.mode.parse().map_err(|e: String| eyre!(e))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.general.refresh_rate_ms)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.general.sample_interval_ms)
    }

    pub fn monitor_config(&self) -> Result<MonitorConfig> {
        Ok(MonitorConfig {
            poll_interval: self.poll_interval(),
            mode: self.tracking_mode()?,
            quick_workers: self.pipeline.enumerator_workers,
        })
    }

    /// Unknown defaults fall back to the unsorted view.
    pub fn view_options(&self) -> ViewOptions {
        let key = self.general.default_sort.parse().unwrap_or(SortKey::None);
        let order = self.general.default_order.parse().unwrap_or(SortOrder::None);
        ViewOptions::new(key, order)
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("hyprtask").join("config.toml"))
}

pub fn load_config() -> Config {
    match config_path() {
        Some(path) if path.exists() => load_config_from_path(&path),
        _ => Config::default(),
    }
}

pub fn load_config_from_path(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents).unwrap_or_default(),
        Err(_) => Config::default(),
    }
}
