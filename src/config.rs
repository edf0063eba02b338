use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use logtail::{Importance, ManagerConfig, NotifierConfig, PollerConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, PartialEq, Deserialize, Serialize)]
pub struct PollingConfig {
    pub interval_secs: u64,
    pub buffer_size: usize,
    pub aggregate_buffer_size: usize,
    pub use_file_events: bool,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 2,
            buffer_size: 100,
            aggregate_buffer_size: 1000,
            use_file_events: true,
        }
    }
}

#[derive(Debug, PartialEq, Deserialize, Serialize)]
pub struct NotifierSettings {
    pub enabled: bool,
    pub rate_limit_secs: u64,
    pub min_importance: Importance,
    pub history_limit: usize,
}

impl Default for NotifierSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            rate_limit_secs: 5,
            min_importance: Importance::Medium,
            history_limit: 100,
        }
    }
}

#[derive(Debug, PartialEq, Deserialize, Serialize, Default)]
pub struct SinkSettings {
    /// When set, every dispatched entity is appended to this JSONL file.
    pub jsonl_path: Option<PathBuf>,
}

#[derive(Debug, PartialEq, Deserialize, Serialize)]
pub struct ImportSettings {
    pub batch_size: usize,
    /// How long the importer waits for further entries before concluding a
    /// closed file has been fully read.
    pub idle_timeout_secs: u64,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            batch_size: 500,
            idle_timeout_secs: 30,
        }
    }
}

#[derive(Debug, PartialEq, Deserialize, Serialize, Default)]
pub struct ArenalogConfig {
    /// Log files to tail. Empty means platform discovery.
    pub log_paths: Vec<PathBuf>,
    pub polling: PollingConfig,
    pub notifier: NotifierSettings,
    pub sink: SinkSettings,
    pub import: ImportSettings,
}

impl ArenalogConfig {
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file("Arenalog.toml"))
            .merge(Env::prefixed("ARENALOG_").split("__"))
    }

    pub fn config() -> figment::Result<Self> {
        Self::figment().extract()
    }

    pub fn poller_config(&self, path: &Path) -> PollerConfig {
        let mut config = PollerConfig::new(path);
        config.interval = Duration::from_secs(self.polling.interval_secs.max(1));
        config.buffer_size = self.polling.buffer_size.max(1);
        config.use_file_events = self.polling.use_file_events;
        config
    }

    pub fn manager_config(&self) -> ManagerConfig {
        let mut config = ManagerConfig::default();
        config.entry_buffer_size = self.polling.aggregate_buffer_size.max(1);
        config.notifier = self.notifier.enabled.then(|| NotifierConfig {
            rate_limit: Duration::from_secs(self.notifier.rate_limit_secs),
            min_importance: self.notifier.min_importance,
            history_limit: self.notifier.history_limit.max(1),
        });
        config
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.import.idle_timeout_secs.max(1))
    }
}
