use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use pipeline_logging::{pipeline_info, pipeline_warn};
use serde::{Deserialize, Serialize};

use crate::cleanup::CleanupRules;
use crate::fetch::FetchSettings;
use crate::queue::TaskQueue;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] ron::Error),
}

/// Where asset bytes are read from while publishing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetSource {
    /// The storage connector of the source website.
    #[default]
    Storage,
    /// Plain HTTP GET of the resolved asset URL.
    Http,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    pub job_grace_period_secs: u64,
    pub sweep_interval_secs: u64,
    pub download_concurrency: usize,
    pub stat_concurrency: usize,
    pub asset_source: AssetSource,
    pub fetch: FetchSettings,
    pub cleanup: CleanupRules,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            job_grace_period_secs: 60,
            sweep_interval_secs: 10,
            download_concurrency: 1,
            stat_concurrency: 1,
            asset_source: AssetSource::default(),
            fetch: FetchSettings::default(),
            cleanup: CleanupRules::default(),
        }
    }
}

impl PublisherConfig {
    /// Reads `path`, falling back to defaults when the file is missing or
    /// invalid.
    pub fn load(path: &Path) -> Self {
        match Self::load_strict(path) {
            Ok(config) => config,
            Err(ConfigError::Io(err)) if err.kind() == io::ErrorKind::NotFound => Self::default(),
            Err(err) => {
                pipeline_warn!("Using default configuration, {:?} is unusable: {}", path, err);
                Self::default()
            }
        }
    }

    pub fn load_strict(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config = ron::from_str(&content)?;
        pipeline_info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::new())?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.job_grace_period_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn download_queue(&self) -> TaskQueue {
        TaskQueue::new(self.download_concurrency)
    }

    pub fn stat_queue(&self) -> TaskQueue {
        TaskQueue::new(self.stat_concurrency)
    }
}
