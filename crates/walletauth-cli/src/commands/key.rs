/*
[INPUT]:  Key subcommand arguments and the saved wallet
[OUTPUT]: Generated, imported, exported or deleted wallets
[POS]:    Command layer - key material management
[UPDATE]: When key manager strategies or storage change
*/

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand};
use console::style;
use dialoguer::Confirm;
use dialoguer::theme::ColorfulTheme;
use tracing::info;
use walletauth_core::{KeyManager, KeySource, Protection, WalletStrategy};

use super::{CommandContext, StrategyArg, read_input};

#[derive(Subcommand, Debug)]
pub enum KeyCommand {
    /// Generate a new mnemonic-backed wallet and save it
    Generate {
        #[arg(long, value_enum, default_value = "mnemonic")]
        strategy: StrategyArg,
        /// Encrypt the saved data with the wallet password
        #[arg(long)]
        encrypt: bool,
        /// Replace an existing saved wallet
        #[arg(long)]
        force: bool,
        /// Print the mnemonic after generating
        #[arg(long)]
        show_secret: bool,
    },
    /// Import key material and save it
    Import(ImportArgs),
    /// Print the saved key material in the requested format
    Export {
        #[arg(long, value_enum)]
        strategy: StrategyArg,
        /// Encrypt the exported data with the wallet password
        #[arg(long)]
        encrypt: bool,
    },
    /// Show the saved wallet
    Show,
    /// Delete the saved wallet
    Delete {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false, id = "source")]
pub struct ImportArgs {
    #[arg(long, value_name = "HEX")]
    private_key: Option<String>,
    #[arg(long, value_name = "PHRASE")]
    mnemonic: Option<String>,
    /// Keystore JSON file (`-` for stdin), decrypted with the wallet password
    #[arg(long, value_name = "PATH")]
    keystore: Option<PathBuf>,
    /// How to save the key; defaults to the import format
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,
    #[arg(long)]
    encrypt: bool,
    #[arg(long)]
    force: bool,
}

pub async fn run(ctx: &CommandContext, command: KeyCommand) -> Result<()> {
    match command {
        KeyCommand::Generate {
            strategy,
            encrypt,
            force,
            show_secret,
        } => {
            let mut manager = ctx.key_manager();
            ensure_replaceable(&manager, force).await?;

            let strategy = WalletStrategy::from(strategy);
            let protection = storage_protection(ctx, strategy, encrypt)?;
            let address = manager.generate()?;
            manager
                .save(strategy, &protection)
                .await
                .context("save wallet")?;

            info!(%address, %strategy, "wallet generated");
            println!("{} {}", style("Address:").bold(), address.to_checksum(None));
            if show_secret {
                let phrase = manager.export(WalletStrategy::Mnemonic, &Protection::None)?;
                println!("{} {}", style("Mnemonic:").bold(), phrase);
            }
        }
        KeyCommand::Import(args) => import(ctx, args).await?,
        KeyCommand::Export { strategy, encrypt } => {
            let (manager, _) = ctx.load_manager().await?;
            let strategy = WalletStrategy::from(strategy);
            let protection = if strategy == WalletStrategy::EncryptedJson || encrypt {
                ctx.required_protection(true)?
            } else {
                Protection::None
            };
            println!("{}", manager.export(strategy, &protection)?);
        }
        KeyCommand::Show => {
            let manager = ctx.key_manager();
            match manager.saved_data().await? {
                Some(record) => {
                    println!("{} {}", style("Address:").bold(), record.address);
                    println!("{} {}", style("Strategy:").bold(), record.strategy);
                    println!("{} {}", style("Encrypted:").bold(), record.is_encrypted);
                    println!("{} {}", style("Directory:").bold(), ctx.key_dir.display());
                }
                None => println!("{}", style("No saved wallet.").yellow()),
            }
        }
        KeyCommand::Delete { yes } => {
            let manager = ctx.key_manager();
            if manager.saved_data().await?.is_none() {
                println!("{}", style("No saved wallet.").yellow());
                return Ok(());
            }
            if !yes {
                if !console::user_attended() {
                    bail!("refusing to delete without --yes");
                }
                let confirmed = Confirm::with_theme(&ColorfulTheme::default())
                    .with_prompt("Delete the saved wallet?")
                    .default(false)
                    .interact()?;
                if !confirmed {
                    return Ok(());
                }
            }
            manager.delete_saved().await?;
            println!("{}", style("Saved wallet deleted.").green());
        }
    }
    Ok(())
}

async fn import(ctx: &CommandContext, args: ImportArgs) -> Result<()> {
    let mut manager = ctx.key_manager();
    ensure_replaceable(&manager, args.force).await?;

    let source = match (args.private_key, args.mnemonic, args.keystore) {
        (Some(key), _, _) => KeySource::PrivateKey(key),
        (_, Some(phrase), _) => KeySource::Mnemonic(phrase),
        (_, _, Some(path)) => KeySource::EncryptedJson {
            json: read_input(&path)?,
            password: ctx.password(false)?,
        },
        _ => bail!("one of --private-key, --mnemonic or --keystore is required"),
    };
    let strategy = args
        .strategy
        .map(WalletStrategy::from)
        .unwrap_or_else(|| source.strategy());

    let address = manager
        .import(source, &Protection::None)
        .context("import key material")?;
    let protection = storage_protection(ctx, strategy, args.encrypt)?;
    manager
        .save(strategy, &protection)
        .await
        .context("save wallet")?;

    info!(%address, %strategy, "wallet imported");
    println!("{} {}", style("Address:").bold(), address.to_checksum(None));
    Ok(())
}

async fn ensure_replaceable(manager: &KeyManager, force: bool) -> Result<()> {
    if !force && manager.saved_data().await?.is_some() {
        bail!("a wallet is already saved; pass --force to replace it");
    }
    Ok(())
}

/// Password protection for saved data; keystores always need one
fn storage_protection(
    ctx: &CommandContext,
    strategy: WalletStrategy,
    encrypt: bool,
) -> Result<Protection> {
    if strategy == WalletStrategy::EncryptedJson || encrypt {
        ctx.required_protection(true)
    } else {
        Ok(ctx.protection())
    }
}
