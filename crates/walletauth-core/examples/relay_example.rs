/*
[INPUT]:  In-memory relay transport and a scripted dApp peer
[OUTPUT]: Approved session and a signed personal_sign request
[POS]:    Examples - relay session handler demonstration
[UPDATE]: When relay states or supported methods change
*/

use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;
use walletauth_core::relay::{InboundEvent, MemoryRelayTransport, SessionProposal, SessionRequest};
use walletauth_core::*;

/// Example: Relay session
///
/// A real transport forwards relay-server traffic; here the dApp side is scripted.
#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Relay Session Example ===\n");

    let transport = Arc::new(MemoryRelayTransport::new());
    let (inbound, inbound_rx) = mpsc::channel(16);
    let wallet = Arc::new(LocalSigner::random().with_chain_id(1));
    let mut handler = RelayHandler::new(transport, wallet, inbound_rx);

    handler.connect_app("wc:example@2?relay-protocol=irn&symKey=00").await?;
    println!("✓ Paired ({})", handler.state().name());

    let proposal: SessionProposal = serde_json::from_value(json!({
        "id": 1,
        "proposer": {"name": "Example dApp"},
        "requiredNamespaces": {
            "eip155": {"chains": ["eip155:1"], "methods": ["personal_sign"], "events": []}
        },
        "relays": [{"protocol": "irn"}]
    }))?;
    inbound
        .send(InboundEvent::Proposal(proposal))
        .await
        .map_err(|e| WalletAuthError::Relay(e.to_string()))?;
    if let Some(event) = handler.next_event().await? {
        println!("✓ Received {}", event.name());
    }

    let session = handler.approve_session(1).await?;
    println!("✓ Session approved: {:?}", session.namespaces["eip155"].accounts);

    let request: SessionRequest = serde_json::from_value(json!({
        "id": 2,
        "topic": session.topic,
        "request": {"method": "personal_sign", "params": ["0x68656c6c6f"]}
    }))?;
    inbound
        .send(InboundEvent::Request(request))
        .await
        .map_err(|e| WalletAuthError::Relay(e.to_string()))?;
    if let Some(RelayEvent::SessionRequest { message, .. }) = handler.next_event().await? {
        println!("✓ Sign request for message {message:?}");
    }

    let outcome = handler.approve_request(2).await?;
    println!("✓ Request resolved: {outcome:?}");

    handler.disconnect().await?;
    println!("✓ Disconnected ({})", handler.state().name());
    Ok(())
}
