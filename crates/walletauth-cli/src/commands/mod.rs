/*
[INPUT]:  Parsed CLI arguments and configuration
[OUTPUT]: Command context shared by key, login and token subcommands
[POS]:    Command layer - wiring between the CLI surface and walletauth-core
[UPDATE]: When adding subcommands or changing how the signer is loaded
*/

pub mod key;
pub mod login;
pub mod token;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use clap::ValueEnum;
use dialoguer::Password;
use dialoguer::theme::ColorfulTheme;
use tracing::debug;
use walletauth_core::{
    ChainRpc, FileStorage, KeyManager, LocalSigner, Protection, WalletStrategy,
};

use crate::config::CliConfig;

/// Storage strategy accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    PrivateKey,
    Mnemonic,
    EncryptedJson,
}

impl From<StrategyArg> for WalletStrategy {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::PrivateKey => WalletStrategy::PrivateKey,
            StrategyArg::Mnemonic => WalletStrategy::Mnemonic,
            StrategyArg::EncryptedJson => WalletStrategy::EncryptedJson,
        }
    }
}

/// Everything a subcommand needs
pub struct CommandContext {
    pub config: CliConfig,
    pub key_dir: PathBuf,
    password: Option<String>,
}

impl CommandContext {
    pub fn new(config: CliConfig, key_dir: Option<PathBuf>, password: Option<String>) -> Result<Self> {
        let key_dir = match key_dir {
            Some(dir) => dir,
            None => config.resolved_key_dir()?,
        };
        Ok(Self {
            config,
            key_dir,
            password: password.filter(|p| !p.is_empty()),
        })
    }

    /// Key manager backed by the configured key directory
    pub fn key_manager(&self) -> KeyManager {
        KeyManager::new(Arc::new(FileStorage::new(&self.key_dir)))
    }

    /// Protection from `--password` / `WALLETAUTH_PASSWORD`, if any
    pub fn protection(&self) -> Protection {
        match &self.password {
            Some(password) => Protection::password(password),
            None => Protection::None,
        }
    }

    /// Password from the command line, prompting when attended
    ///
    /// `confirm` asks twice, for new secrets.
    pub fn password(&self, confirm: bool) -> Result<String> {
        if let Some(password) = &self.password {
            return Ok(password.clone());
        }
        if !console::user_attended() {
            bail!("a password is required; pass --password or set WALLETAUTH_PASSWORD");
        }
        let theme = ColorfulTheme::default();
        let mut prompt = Password::with_theme(&theme).with_prompt("Wallet password");
        if confirm {
            prompt = prompt.with_confirmation("Repeat password", "Passwords do not match");
        }
        Ok(prompt.interact()?)
    }

    pub fn required_protection(&self, confirm: bool) -> Result<Protection> {
        Ok(Protection::password(&self.password(confirm)?))
    }

    /// Key manager with the saved wallet loaded, using its recorded strategy
    pub async fn load_manager(&self) -> Result<(KeyManager, WalletStrategy)> {
        let mut manager = self.key_manager();
        let record = manager
            .saved_data()
            .await?
            .ok_or_else(|| anyhow!("no saved wallet in {}", self.key_dir.display()))?;

        let protection = if record.is_encrypted {
            self.required_protection(false)?
        } else {
            Protection::None
        };
        manager
            .load(record.strategy, &protection)
            .await
            .context("load saved wallet")?;
        debug!(strategy = %record.strategy, "wallet loaded");
        Ok((manager, record.strategy))
    }

    /// Signer for the saved wallet, wired to the configured chain and RPC
    pub async fn load_signer(&self) -> Result<LocalSigner> {
        let (manager, _) = self.load_manager().await?;
        let mut signer = manager.signer()?.clone();
        if let Some(chain_id) = self.config.chain_id {
            signer = signer.with_chain_id(chain_id);
        }
        if !self.config.rpc_urls.is_empty() {
            let rpc = ChainRpc::from_config(&self.config.rpc_config())?;
            signer = signer.with_rpc(Arc::new(rpc));
        }
        Ok(signer)
    }
}

/// Read a file argument, with `-` meaning stdin
pub fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        return std::io::read_to_string(std::io::stdin()).context("read stdin");
    }
    std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}
