use crate::core::{LedgerParams, ProofTarget, BLOCK_INCENTIVE};
use crate::error::{LedgerError, Result};
use log::info;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

pub static GLOBAL_CONFIG: Lazy<Config> = Lazy::new(Config::new);

static DEFAULT_NODE_ADDR: &str = "127.0.0.1:2001";
static DEFAULT_CONFIG_FILE: &str = "ledger.toml";
const DEFAULT_PEER_TIMEOUT_MS: u64 = 5000;
const DEFAULT_MINING_THRESHOLD: usize = 2;

const CONFIG_PATH_KEY: &str = "LEDGER_CONFIG";
const NODE_ADDRESS_KEY: &str = "NODE_ADDRESS";
const MINING_ADDRESS_KEY: &str = "MINING_ADDRESS";
const DATA_DIR_KEY: &str = "LEDGER_DATA_DIR";

/// Node settings as they appear in `ledger.toml`. Every field is optional in
/// the file; missing ones keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub node_address: String,
    pub mining_address: Option<String>,
    pub data_dir: PathBuf,
    pub peer_timeout_ms: u64,
    pub block_incentive: u64,
    pub proof_target: ProofTarget,
    /// Pending transactions a mining node waits for before sealing a block.
    pub mining_threshold: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            node_address: DEFAULT_NODE_ADDR.to_string(),
            mining_address: None,
            data_dir: PathBuf::from("data"),
            peer_timeout_ms: DEFAULT_PEER_TIMEOUT_MS,
            block_incentive: BLOCK_INCENTIVE,
            proof_target: ProofTarget::default(),
            mining_threshold: DEFAULT_MINING_THRESHOLD,
        }
    }
}

impl Settings {
    pub fn from_toml_str(text: &str) -> Result<Settings> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Settings> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            LedgerError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Defaults, then the TOML file named by `LEDGER_CONFIG` (or `./ledger.toml`
    /// when present), then environment overrides.
    pub fn load() -> Result<Settings> {
        let mut settings = match env::var(CONFIG_PATH_KEY) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            Err(_) => Settings::default(),
        };
        settings.apply_env();
        Ok(settings)
    }

    fn apply_env(&mut self) {
        if let Ok(addr) = env::var(NODE_ADDRESS_KEY) {
            self.node_address = addr;
        }
        if let Ok(addr) = env::var(MINING_ADDRESS_KEY) {
            self.mining_address = Some(addr);
        }
        if let Ok(dir) = env::var(DATA_DIR_KEY) {
            self.data_dir = PathBuf::from(dir);
        }
    }

    pub fn ledger_params(&self) -> LedgerParams {
        LedgerParams {
            block_incentive: self.block_incentive,
            target: self.proof_target.clone(),
        }
    }
}

pub struct Config {
    inner: RwLock<Settings>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Config {
        let settings = Settings::load().unwrap_or_else(|e| {
            log::warn!("Falling back to default settings: {e}");
            Settings::default()
        });
        info!("Loaded settings for node {}", settings.node_address);
        Config::with_settings(settings)
    }

    pub fn with_settings(settings: Settings) -> Config {
        Config {
            inner: RwLock::new(settings),
        }
    }

    pub fn settings(&self) -> Settings {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get_node_addr(&self) -> String {
        self.settings().node_address
    }

    pub fn set_node_addr(&self, addr: String) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .node_address = addr;
    }

    pub fn get_mining_addr(&self) -> Option<String> {
        self.settings().mining_address
    }

    pub fn set_mining_addr(&self, addr: String) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .mining_address = Some(addr);
    }

    pub fn is_miner(&self) -> bool {
        self.get_mining_addr().is_some()
    }

    pub fn data_dir(&self) -> PathBuf {
        self.settings().data_dir
    }

    pub fn ledger_params(&self) -> LedgerParams {
        self.settings().ledger_params()
    }
}
