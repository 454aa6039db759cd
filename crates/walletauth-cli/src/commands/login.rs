/*
[INPUT]:  Login subcommand arguments, saved wallet, payload files
[OUTPUT]: Signed login payload JSON or the verified address
[POS]:    Command layer - login payload protocol
[UPDATE]: When login options or payload format change
*/

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::Subcommand;
use console::style;
use walletauth_core::auth::{self, login};
use walletauth_core::{LoginOptions, LoginPayload, VerifyOptions};

use super::{CommandContext, read_input};

#[derive(Subcommand, Debug)]
pub enum LoginCommand {
    /// Build and sign a login payload with the saved wallet
    Sign {
        /// Domain override
        #[arg(long)]
        domain: Option<String>,
        #[arg(long)]
        uri: Option<String>,
        #[arg(long)]
        nonce: Option<String>,
        /// Resource URI, repeatable
        #[arg(long = "resource", value_name = "URI")]
        resources: Vec<String>,
        /// Also print the canonical message that was signed
        #[arg(long)]
        show_message: bool,
    },
    /// Verify a signed login payload (`-` reads stdin)
    Verify {
        #[arg(value_name = "PATH")]
        payload: PathBuf,
        #[arg(long)]
        domain: Option<String>,
        #[arg(long)]
        uri: Option<String>,
        #[arg(long)]
        chain_id: Option<String>,
    },
}

pub async fn run(ctx: &CommandContext, command: LoginCommand) -> Result<()> {
    match command {
        LoginCommand::Sign {
            domain,
            uri,
            nonce,
            resources,
            show_message,
        } => {
            let signer = ctx.load_signer().await?;
            let mut options = LoginOptions::new(domain.as_deref().unwrap_or(&ctx.config.domain));
            options.uri = uri;
            options.nonce = nonce;
            options.statement = ctx.config.statement.clone();
            options.chain_id = ctx.config.chain_id.map(|id| id.to_string());
            options.expiration_time =
                Some(Utc::now() + Duration::seconds(ctx.config.login_ttl_secs));
            if !resources.is_empty() {
                options.resources = Some(resources);
            }

            let payload = login::login(&signer, &options)
                .await
                .context("sign login payload")?;
            if show_message {
                eprintln!("{}", auth::create_login_message(&payload.payload));
            }
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        LoginCommand::Verify {
            payload,
            domain,
            uri,
            chain_id,
        } => {
            let payload = read_payload(&payload)?;
            let signer = ctx.load_signer().await?;
            let mut options = VerifyOptions::new(domain.as_deref().unwrap_or(&ctx.config.domain));
            options.uri = uri;
            options.chain_id = chain_id;
            options.statement = ctx.config.statement.clone();

            let address = auth::verify(&signer, &payload, &options)
                .await
                .context("verify login payload")?;
            println!("{} {}", style("Verified:").bold().green(), address);
        }
    }
    Ok(())
}

pub fn read_payload(path: &Path) -> Result<LoginPayload> {
    let raw = read_input(path)?;
    serde_json::from_str(&raw).context("parse login payload")
}
