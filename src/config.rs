//! Configuration management for Davcoin

use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use crate::error::ChainError;
use crate::miner::{ProofOfWork, DEFAULT_DIFFICULTY, MAX_DIFFICULTY};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub miner: MinerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MinerConfig {
    #[serde(default = "default_difficulty")]
    pub difficulty: usize,
    #[serde(default)]
    pub max_attempts: Option<u64>,
    #[serde(default = "default_reward_receiver")]
    pub reward_receiver: String,
    #[serde(default = "default_reward_amount")]
    pub reward_amount: i64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            api_port: default_api_port(),
            bootstrap_peers: Vec::new(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
            max_attempts: None,
            reward_receiver: default_reward_receiver(),
            reward_amount: default_reward_amount(),
        }
    }
}

impl NetworkConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl MinerConfig {
    pub fn proof_of_work(&self) -> ProofOfWork {
        ProofOfWork {
            difficulty: self.difficulty,
            max_attempts: self.max_attempts,
        }
    }
}

impl Config {
    /// Check values that would leave the node unable to work.
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.network.host.is_empty() {
            return Err(ChainError::Config("network.host must not be empty".into()));
        }
        if self.network.request_timeout_secs == 0 {
            return Err(ChainError::Config(
                "network.request_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.miner.difficulty > MAX_DIFFICULTY {
            return Err(ChainError::Config(format!(
                "miner.difficulty must be at most {}",
                MAX_DIFFICULTY
            )));
        }
        if self.miner.reward_receiver.is_empty() {
            return Err(ChainError::Config(
                "miner.reward_receiver must be set".into(),
            ));
        }
        Ok(())
    }
}

/// Load `path`, falling back to defaults when the file does not exist.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<Config, ChainError> {
    let config = match fs::read_to_string(path.as_ref()) {
        Ok(contents) => toml::from_str(&contents)?,
        Err(e) if e.kind() == ErrorKind::NotFound => Config::default(),
        Err(e) => return Err(e.into()),
    };
    config.validate()?;
    Ok(config)
}

pub fn load_config() -> Result<Config, ChainError> {
    load_config_from(DEFAULT_CONFIG_PATH)
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    5000
}

fn default_request_timeout() -> u64 {
    10
}

fn default_difficulty() -> usize {
    DEFAULT_DIFFICULTY
}

fn default_reward_receiver() -> String {
    "miner".to_string()
}

fn default_reward_amount() -> i64 {
    1
}
