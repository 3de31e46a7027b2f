use std::fs;

use serde::Deserialize;
use tracing::warn;

use shared::domain::{Address, Wei};

/// Development manager identity, used when no configuration provides one.
const DEV_MANAGER: Address = Address([
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xed,
]);

const DEV_GENESIS_BALANCE: Wei = Wei(1_000_000_000_000_000_000);

#[derive(Debug, Clone, Deserialize)]
pub struct GenesisAccount {
    pub address: Address,
    pub balance: Wei,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: String,
    pub database_url: String,
    pub manager: Address,
    pub submission_fee: Wei,
    pub genesis: Vec<GenesisAccount>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8545".into(),
            database_url: "sqlite://./data/registry.db".into(),
            manager: DEV_MANAGER,
            submission_fee: Wei(1_000_000),
            genesis: vec![GenesisAccount {
                address: DEV_MANAGER,
                balance: DEV_GENESIS_BALANCE,
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct FileSettings {
    bind_addr: Option<String>,
    database_url: Option<String>,
    manager: Option<Address>,
    submission_fee: Option<Wei>,
    #[serde(default)]
    genesis: Option<Vec<GenesisAccount>>,
}

/// Settings come from `node.toml` when present, overlaid by environment
/// variables (`NODE_BIND`, `DATABASE_URL`, `NODE_MANAGER`,
/// `NODE_SUBMISSION_FEE`). Genesis accounts are file-only.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("node.toml") {
        match toml::from_str::<FileSettings>(&raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.bind_addr {
                    settings.bind_addr = v;
                }
                if let Some(v) = file_cfg.database_url {
                    settings.database_url = v;
                }
                if let Some(v) = file_cfg.manager {
                    settings.manager = v;
                }
                if let Some(v) = file_cfg.submission_fee {
                    settings.submission_fee = v;
                }
                if let Some(v) = file_cfg.genesis {
                    settings.genesis = v;
                }
            }
            Err(error) => warn!(%error, "ignoring malformed node.toml"),
        }
    }

    if let Ok(v) = std::env::var("NODE_BIND") {
        settings.bind_addr = v;
    }
    if let Ok(v) = std::env::var("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Ok(v) = std::env::var("NODE_MANAGER") {
        match v.parse() {
            Ok(manager) => settings.manager = manager,
            Err(error) => warn!(%error, "ignoring malformed NODE_MANAGER"),
        }
    }
    if let Ok(v) = std::env::var("NODE_SUBMISSION_FEE") {
        match v.parse() {
            Ok(fee) => settings.submission_fee = fee,
            Err(error) => warn!(%error, "ignoring malformed NODE_SUBMISSION_FEE"),
        }
    }

    settings
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
