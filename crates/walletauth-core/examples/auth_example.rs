/*
[INPUT]:  A freshly generated wallet and a relying-party domain
[OUTPUT]: Verified login and an authenticated, refreshed session token
[POS]:    Examples - login and session token flow demonstration
[UPDATE]: When auth flow changes
*/

use std::sync::Arc;

use walletauth_core::*;

/// Example: Authentication flow
///
/// This example demonstrates the complete authentication flow:
/// 1. Generate a wallet with the key manager
/// 2. Sign a login payload for a domain
/// 3. Verify it on the server side and issue a session token
/// 4. Authenticate and refresh the token
#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Wallet Authentication Example ===\n");

    // Step 1: Generate a wallet (mnemonic-backed, kept in memory)
    let mut keys = KeyManager::in_memory();
    let address = keys.generate()?;
    let wallet = keys.signer()?.clone().with_chain_id(1);
    println!("✓ Wallet generated: {}", address.to_checksum(None));

    // Step 2: Client signs a login payload
    let payload = auth::login::login(&wallet, &LoginOptions::new("app.example")).await?;
    println!("✓ Login payload signed\n");
    println!("{}\n", auth::create_login_message(&payload.payload));

    // Step 3: Server verifies and issues a token with its own signer
    let server = AuthRegistry::new(Arc::new(LocalSigner::random()));
    let app = server.get("app.example");
    let token = app
        .generate_token(&payload, GenerateOptions::default())
        .await?;
    println!("✓ Token issued: {}...", &token[..32.min(token.len())]);

    // Step 4: Authenticate and refresh
    let authenticated = app
        .authenticate(&token, AuthenticateOptions::default())
        .await?;
    println!("✓ Authenticated subject: {}", authenticated.address());

    let refreshed = app.refresh(&authenticated, None).await?;
    println!("✓ Token refreshed, new id: {}", auth::parse(&refreshed)?.claims.jti);

    println!("\n✓ Authentication example complete");
    Ok(())
}
