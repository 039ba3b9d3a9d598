use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use fibermesh_core::{SpliceError, SpliceResult};

const DEFAULT_CONFIG_NAME: &str = "store.json";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub max_merge_group_size: Option<usize>,
    pub max_merged_fibers: Option<usize>,
}

impl LimitsConfig {
    pub fn with_defaults() -> Self {
        Self {
            max_merge_group_size: Some(144),
            max_merged_fibers: Some(144),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Simulated round-trip time added to every remote call.
    pub latency_ms: Option<u64>,
    pub limits: Option<LimitsConfig>,
    /// Operation keys that reject, e.g. `upsert_fiber_splice` or
    /// `upsert_fiber_splice:port=3`.
    pub failpoints: Option<Vec<String>>,
}

impl StoreConfig {
    pub fn in_memory() -> Self {
        Self {
            latency_ms: None,
            limits: Some(LimitsConfig::with_defaults()),
            failpoints: None,
        }
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    pub fn with_failpoint(mut self, key: impl Into<String>) -> Self {
        self.failpoints.get_or_insert_with(Vec::new).push(key.into());
        self
    }

    pub fn load_or_init(base_dir: &Path) -> SpliceResult<Self> {
        fs::create_dir_all(base_dir)
            .map_err(|err| SpliceError::storage(format!("create config dir: {err}")))?;
        let config_path = base_dir.join(DEFAULT_CONFIG_NAME);
        if config_path.exists() {
            let raw = fs::read_to_string(&config_path)
                .map_err(|err| SpliceError::storage(format!("read config: {err}")))?;
            let config: StoreConfig = serde_json::from_str(&raw)
                .map_err(|err| SpliceError::validation(err.to_string()))?;
            return Ok(config);
        }
        let default = StoreConfig::in_memory();
        let payload = serde_json::to_string_pretty(&default)
            .map_err(|err| SpliceError::storage(format!("serialize config: {err}")))?;
        fs::write(&config_path, payload)
            .map_err(|err| SpliceError::storage(format!("write config: {err}")))?;
        Ok(default)
    }

    pub fn latency(&self) -> Option<Duration> {
        self.latency_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}
