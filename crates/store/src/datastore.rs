use std::path::{Path, PathBuf};

use crate::{MemoryStore, NodeFixture, StoreConfig};
use fibermesh_core::SpliceResult;

const DEFAULT_FIXTURE_NAME: &str = "node.json";

pub fn load_or_init_config(base: &Path) -> SpliceResult<StoreConfig> {
    StoreConfig::load_or_init(base)
}

/// Open an authority seeded from `node.json` under `base`, or the embedded
/// sample node when that file is absent.
pub fn open_store(base: &Path) -> SpliceResult<MemoryStore> {
    let config = load_or_init_config(base)?;
    let fixture_path = default_fixture_path(base);
    let fixture = if fixture_path.exists() {
        NodeFixture::from_path(&fixture_path)?
    } else {
        NodeFixture::embedded()?
    };
    log::info!(
        "store: opening node={} latency_ms={:?}",
        fixture.name,
        config.latency_ms
    );
    MemoryStore::from_fixture(&config, &fixture)
}

pub fn default_fixture_path(base: &Path) -> PathBuf {
    base.join(DEFAULT_FIXTURE_NAME)
}
