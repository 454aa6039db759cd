/*
[INPUT]:  CLI arguments, YAML configuration file, environment password
[OUTPUT]: Key, login and token operations against walletauth-core
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, subcommands, or startup flow
*/

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use walletauth_cli::commands::key::KeyCommand;
use walletauth_cli::commands::login::LoginCommand;
use walletauth_cli::commands::token::TokenCommand;
use walletauth_cli::commands::{self, CommandContext};
use walletauth_cli::CliConfig;

#[derive(Parser, Debug)]
#[command(name = "walletauth", version, about = "Wallet login and session token toolkit")]
struct Cli {
    #[arg(long = "config", value_name = "PATH", global = true)]
    config_path: Option<PathBuf>,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info", global = true)]
    log_level: String,
    /// Directory holding the saved wallet (overrides config)
    #[arg(long = "key-dir", value_name = "DIR", global = true)]
    key_dir: Option<PathBuf>,
    /// Wallet password for encrypted storage
    #[arg(long, env = "WALLETAUTH_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage the saved wallet
    #[command(subcommand)]
    Key(KeyCommand),
    /// Sign and verify login payloads
    #[command(subcommand)]
    Login(LoginCommand),
    /// Issue, authenticate, refresh and inspect session tokens
    #[command(subcommand)]
    Token(TokenCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args.log_level)?;

    let config = CliConfig::load(args.config_path.as_deref()).context("load config")?;
    debug!(domain = %config.domain, "configuration loaded");
    let ctx = CommandContext::new(config, args.key_dir, args.password)?;

    match args.command {
        Command::Key(command) => commands::key::run(&ctx, command).await,
        Command::Login(command) => commands::login::run(&ctx, command).await,
        Command::Token(command) => commands::token::run(&ctx, command).await,
    }
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}
