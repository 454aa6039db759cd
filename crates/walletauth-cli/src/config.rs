/*
[INPUT]:  YAML configuration file
[OUTPUT]: Parsed CLI configuration with defaults applied
[POS]:    Configuration layer - domain, key storage and chain endpoints
[UPDATE]: When adding new configuration options
*/

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use walletauth_core::RpcConfig;
use walletauth_core::auth::login::DEFAULT_LOGIN_TTL_SECS;
use walletauth_core::auth::token::DEFAULT_TOKEN_TTL_SECS;

/// Top-level configuration for the walletauth CLI
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CliConfig {
    /// Domain that login payloads and tokens are bound to
    #[serde(default = "default_domain")]
    pub domain: String,
    /// Directory holding the saved wallet; per-user data dir when unset
    #[serde(default)]
    pub key_dir: Option<PathBuf>,
    /// Chain id to RPC URL, used for contract wallets and transactions
    #[serde(default)]
    pub rpc_urls: BTreeMap<u64, String>,
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: i64,
    #[serde(default = "default_login_ttl_secs")]
    pub login_ttl_secs: i64,
    /// Statement override for login payloads
    #[serde(default)]
    pub statement: Option<String>,
    /// Chain id placed in login payloads and used by the signer
    #[serde(default)]
    pub chain_id: Option<u64>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            key_dir: None,
            rpc_urls: BTreeMap::new(),
            token_ttl_secs: default_token_ttl_secs(),
            login_ttl_secs: default_login_ttl_secs(),
            statement: None,
            chain_id: None,
        }
    }
}

fn default_domain() -> String {
    "localhost".to_string()
}

fn default_token_ttl_secs() -> i64 {
    DEFAULT_TOKEN_TTL_SECS
}

fn default_login_ttl_secs() -> i64 {
    DEFAULT_LOGIN_TTL_SECS
}

impl CliConfig {
    /// Load configuration from YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, defaults otherwise
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.domain.is_empty() {
            return Err(anyhow!("domain cannot be empty"));
        }
        if self.token_ttl_secs <= 0 || self.login_ttl_secs <= 0 {
            return Err(anyhow!("ttl values must be positive"));
        }
        Ok(())
    }

    /// Configured key directory or `<data dir>/walletauth`
    pub fn resolved_key_dir(&self) -> Result<PathBuf> {
        match &self.key_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(dirs::data_dir()
                .ok_or_else(|| anyhow!("Could not determine data directory"))?
                .join("walletauth")),
        }
    }

    pub fn rpc_config(&self) -> RpcConfig {
        RpcConfig {
            endpoints: self.rpc_urls.clone(),
            ..RpcConfig::default()
        }
    }
}
