use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use fibermesh_core::{SpliceError, SpliceResult};

const DEFAULT_CONFIG_NAME: &str = "engine.json";
const DEFAULT_MAX_NOTICES: usize = 50;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FillConfig {
    /// Continue a cable fill into later structures in slot order.
    pub spill_into_next_structures: Option<bool>,
    pub max_structures: Option<usize>,
}

impl FillConfig {
    pub fn with_defaults() -> Self {
        Self {
            spill_into_next_structures: Some(true),
            max_structures: None,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MergeConfig {
    pub max_group_size: Option<usize>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NoticeConfig {
    pub max_retained: Option<usize>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub fill: Option<FillConfig>,
    pub merge: Option<MergeConfig>,
    pub notices: Option<NoticeConfig>,
}

impl EngineConfig {
    pub fn with_defaults() -> Self {
        Self {
            fill: Some(FillConfig::with_defaults()),
            merge: Some(MergeConfig::default()),
            notices: Some(NoticeConfig {
                max_retained: Some(DEFAULT_MAX_NOTICES),
            }),
        }
    }

    pub fn load_or_init(base_dir: &Path) -> SpliceResult<Self> {
        fs::create_dir_all(base_dir)
            .map_err(|err| SpliceError::storage(format!("create config dir: {err}")))?;
        let config_path = base_dir.join(DEFAULT_CONFIG_NAME);
        if config_path.exists() {
            let raw = fs::read_to_string(&config_path)
                .map_err(|err| SpliceError::storage(format!("read config: {err}")))?;
            let config: EngineConfig = serde_json::from_str(&raw)
                .map_err(|err| SpliceError::validation(err.to_string()))?;
            return Ok(config);
        }
        let default = EngineConfig::with_defaults();
        let payload = serde_json::to_string_pretty(&default)
            .map_err(|err| SpliceError::storage(format!("serialize config: {err}")))?;
        fs::write(&config_path, payload)
            .map_err(|err| SpliceError::storage(format!("write config: {err}")))?;
        Ok(default)
    }

    pub fn spill_into_next_structures(&self) -> bool {
        self.fill
            .as_ref()
            .and_then(|fill| fill.spill_into_next_structures)
            .unwrap_or(true)
    }

    pub fn max_structures(&self) -> Option<usize> {
        self.fill.as_ref().and_then(|fill| fill.max_structures)
    }

    pub fn max_merge_group_size(&self) -> Option<usize> {
        self.merge.as_ref().and_then(|merge| merge.max_group_size)
    }

    pub fn max_notices(&self) -> usize {
        self.notices
            .as_ref()
            .and_then(|notices| notices.max_retained)
            .unwrap_or(DEFAULT_MAX_NOTICES)
    }
}
