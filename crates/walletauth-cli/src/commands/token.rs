/*
[INPUT]:  Token subcommand arguments, saved wallet, login payloads
[OUTPUT]: Issued, authenticated, refreshed or decoded session tokens
[POS]:    Command layer - session token protocol
[UPDATE]: When token options or claims change
*/

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::Subcommand;
use walletauth_core::auth;
use walletauth_core::{AuthenticateOptions, GenerateOptions};

use super::CommandContext;
use super::login::read_payload;

#[derive(Subcommand, Debug)]
pub enum TokenCommand {
    /// Verify a login payload and issue a token for its address
    Issue {
        /// Signed login payload JSON (`-` reads stdin)
        #[arg(value_name = "PATH")]
        payload: PathBuf,
        #[arg(long)]
        domain: Option<String>,
        #[arg(long)]
        token_id: Option<String>,
        /// Lifetime in seconds, config `token_ttl_secs` by default
        #[arg(long)]
        ttl: Option<i64>,
    },
    /// Validate a token and print its claims
    Authenticate {
        token: String,
        #[arg(long)]
        domain: Option<String>,
        /// Expected issuer when it is not the saved wallet
        #[arg(long)]
        issuer: Option<String>,
    },
    /// Validate a token and print a re-issued one
    Refresh {
        token: String,
        #[arg(long)]
        domain: Option<String>,
        #[arg(long)]
        ttl: Option<i64>,
    },
    /// Decode a token without validating it
    Inspect { token: String },
}

pub async fn run(ctx: &CommandContext, command: TokenCommand) -> Result<()> {
    match command {
        TokenCommand::Issue {
            payload,
            domain,
            token_id,
            ttl,
        } => {
            let payload = read_payload(&payload)?;
            let signer = ctx.load_signer().await?;
            let mut options = GenerateOptions::new(domain.as_deref().unwrap_or(&ctx.config.domain));
            options.verify.statement = ctx.config.statement.clone();
            options.token_id = token_id;
            options.expiration_time = Some(expiry(ctx, ttl));

            let token = auth::generate_token(&signer, &payload, &options)
                .await
                .context("issue token")?;
            println!("{token}");
        }
        TokenCommand::Authenticate {
            token,
            domain,
            issuer,
        } => {
            let signer = ctx.load_signer().await?;
            let mut options = authenticate_options(ctx, domain);
            options.issuer_address = issuer;

            let authenticated = auth::authenticate(&signer, token.trim(), &options)
                .await
                .context("authenticate token")?;
            println!("{}", serde_json::to_string_pretty(authenticated.claims())?);
        }
        TokenCommand::Refresh { token, domain, ttl } => {
            let signer = ctx.load_signer().await?;
            let options = authenticate_options(ctx, domain);
            let refreshed =
                auth::authenticate_and_refresh(&signer, token.trim(), &options, Some(expiry(ctx, ttl)))
                    .await
                    .context("refresh token")?;
            println!("{refreshed}");
        }
        TokenCommand::Inspect { token } => {
            let parsed = auth::parse(token.trim()).context("decode token")?;
            println!("{}", serde_json::to_string_pretty(&parsed.claims)?);
        }
    }
    Ok(())
}

fn authenticate_options(ctx: &CommandContext, domain: Option<String>) -> AuthenticateOptions {
    let mut options = AuthenticateOptions::new(domain.as_deref().unwrap_or(&ctx.config.domain));
    options.chain_id = ctx.config.chain_id;
    options
}

fn expiry(ctx: &CommandContext, ttl: Option<i64>) -> chrono::DateTime<Utc> {
    Utc::now() + Duration::seconds(ttl.unwrap_or(ctx.config.token_ttl_secs))
}
