pub mod config;
pub mod datastore;
pub mod fixture;
pub mod store;

pub use config::{LimitsConfig, StoreConfig};
pub use datastore::{default_fixture_path, load_or_init_config, open_store};
pub use fixture::{BundleFixture, CableFixture, ComponentTypeFixture, NodeFixture};
pub use store::{ApiCall, MemoryStore};
