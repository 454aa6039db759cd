/*
[INPUT]:  Relay transport, wallet signer, inbound relay events, user decisions
[OUTPUT]: Relay state transitions, peer responses and observable RelayEvents
[POS]:    Relay layer - explicit session state machine for remote signing
[UPDATE]: When adding supported methods or changing state transitions
*/

use std::collections::BTreeMap;
use std::sync::Arc;

use alloy_primitives::Address;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use crate::error::{Result, WalletAuthError};
use crate::relay::message::{
    ErrorReason, InboundEvent, JsonRpcResponse, RelayEvent, RelaySession, RequestOutcome,
    SessionNamespace, SessionProposal, SessionRequest,
};
use crate::relay::transport::RelayTransport;
use crate::signer::WalletSigner;
use crate::types::TransactionRequest;

const EVENT_CHANNEL_SIZE: usize = 100;
const DEFAULT_RELAY_PROTOCOL: &str = "irn";

/// Handler states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Idle,
    Paired,
    ProposalPending,
    Active,
    RequestPending,
}

impl RelayState {
    pub fn name(self) -> &'static str {
        match self {
            RelayState::Idle => "Idle",
            RelayState::Paired => "Paired",
            RelayState::ProposalPending => "ProposalPending",
            RelayState::Active => "Active",
            RelayState::RequestPending => "RequestPending",
        }
    }
}

/// Wallet side of a relay pairing
///
/// Holds at most one pending proposal and one pending request; a newer one
/// replaces the older. A pending item stays pending until the transport
/// accepts the answer for it.
pub struct RelayHandler {
    transport: Arc<dyn RelayTransport>,
    signer: Arc<dyn WalletSigner>,
    inbound: mpsc::Receiver<InboundEvent>,
    event_tx: mpsc::Sender<RelayEvent>,
    event_rx: Option<mpsc::Receiver<RelayEvent>>,
    state: RelayState,
    session: Option<RelaySession>,
    pending_proposal: Option<SessionProposal>,
    pending_request: Option<SessionRequest>,
    /// Answer computed for the pending request that the transport refused
    undelivered: Option<JsonRpcResponse>,
}

impl RelayHandler {
    pub fn new(
        transport: Arc<dyn RelayTransport>,
        signer: Arc<dyn WalletSigner>,
        inbound: mpsc::Receiver<InboundEvent>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
        Self {
            transport,
            signer,
            inbound,
            event_tx,
            event_rx: Some(event_rx),
            state: RelayState::Idle,
            session: None,
            pending_proposal: None,
            pending_request: None,
            undelivered: None,
        }
    }

    /// Take the event receiver (can only be called once)
    pub fn take_event_receiver(&mut self) -> Option<mpsc::Receiver<RelayEvent>> {
        self.event_rx.take()
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    pub fn session(&self) -> Option<&RelaySession> {
        self.session.as_ref()
    }

    pub fn pending_proposal(&self) -> Option<&SessionProposal> {
        self.pending_proposal.as_ref()
    }

    pub fn pending_request(&self) -> Option<&SessionRequest> {
        self.pending_request.as_ref()
    }

    /// Restore the first session the transport still holds
    pub async fn init(&mut self) -> Result<Option<RelaySession>> {
        let restored = self.transport.active_sessions().await?.into_iter().next();
        if let Some(session) = &restored {
            info!(topic = %session.topic, peer = %session.peer.name, "relay session restored");
            self.session = Some(session.clone());
            self.transition(RelayState::Active);
        }
        Ok(restored)
    }

    /// Pair with an app from its `wc:` URI
    pub async fn connect_app(&mut self, uri: &str) -> Result<()> {
        self.expect_state(&[RelayState::Idle], "Idle")?;
        if !uri.starts_with("wc:") {
            return Err(WalletAuthError::InvalidPayload(format!(
                "not a pairing uri: {uri}"
            )));
        }
        self.transport.pair(uri).await?;
        self.transition(RelayState::Paired);
        Ok(())
    }

    /// Wait for the next inbound event and apply it
    ///
    /// Returns `None` once the transport closes its channel.
    pub async fn next_event(&mut self) -> Result<Option<RelayEvent>> {
        match self.inbound.recv().await {
            Some(event) => self.handle_inbound(event).await.map(Some),
            None => Ok(None),
        }
    }

    /// Apply one inbound event
    pub async fn handle_inbound(&mut self, event: InboundEvent) -> Result<RelayEvent> {
        let event = match event {
            InboundEvent::Proposal(proposal) => {
                self.expect_state(
                    &[RelayState::Paired, RelayState::ProposalPending],
                    "Paired",
                )?;
                if let Some(previous) = &self.pending_proposal {
                    warn!(dropped = previous.id, id = proposal.id, "pending proposal replaced");
                }
                self.pending_proposal = Some(proposal.clone());
                self.transition(RelayState::ProposalPending);
                RelayEvent::SessionProposal(proposal)
            }
            InboundEvent::Request(request) => {
                self.expect_state(&[RelayState::Active, RelayState::RequestPending], "Active")?;
                let session = self.active_session()?;
                if session.topic != request.topic {
                    return Err(WalletAuthError::Relay(format!(
                        "request {} for unknown topic {}",
                        request.id, request.topic
                    )));
                }
                let peer = session.peer.clone();
                if let Some(previous) = &self.pending_request {
                    warn!(dropped = previous.id, id = request.id, "pending request replaced");
                }

                let message = match request.request.method.as_str() {
                    "personal_sign" | "eth_sign" => {
                        sign_payload(&request.request.params).map(|(_, display)| display)
                    }
                    _ => None,
                };
                self.undelivered = None;
                let event = RelayEvent::SessionRequest {
                    topic: request.topic.clone(),
                    id: request.id,
                    method: request.request.method.clone(),
                    peer,
                    message,
                    params: request.request.params.clone(),
                };
                self.pending_request = Some(request);
                self.transition(RelayState::RequestPending);
                event
            }
            InboundEvent::Delete { topic } => {
                if self.session.as_ref().is_some_and(|s| s.topic == topic) {
                    self.reset();
                }
                RelayEvent::SessionDelete { topic }
            }
        };

        self.emit(event.clone()).await;
        Ok(event)
    }

    /// Approve the pending proposal with the signer's address on every required chain
    pub async fn approve_session(&mut self, proposal_id: u64) -> Result<RelaySession> {
        self.expect_state(&[RelayState::ProposalPending], "ProposalPending")?;
        let proposal = self.take_proposal(proposal_id)?;

        let namespaces = session_namespaces(&proposal, self.signer.address());
        let relay_protocol = proposal
            .relays
            .first()
            .map(|relay| relay.protocol.as_str())
            .unwrap_or(DEFAULT_RELAY_PROTOCOL);

        let session = match self
            .transport
            .approve_session(&proposal, relay_protocol, &namespaces)
            .await
        {
            Ok(session) => session,
            Err(e) => {
                self.pending_proposal = Some(proposal);
                return Err(e);
            }
        };

        info!(topic = %session.topic, peer = %session.peer.name, "relay session approved");
        self.session = Some(session.clone());
        self.transition(RelayState::Active);
        self.emit(RelayEvent::SessionApproved(session.clone())).await;
        Ok(session)
    }

    pub async fn reject_session(&mut self, proposal_id: u64) -> Result<()> {
        self.expect_state(&[RelayState::ProposalPending], "ProposalPending")?;
        let proposal = self.take_proposal(proposal_id)?;
        if let Err(e) = self
            .transport
            .reject_session(proposal.id, &ErrorReason::user_rejected_session())
            .await
        {
            self.pending_proposal = Some(proposal);
            return Err(e);
        }
        info!(id = proposal.id, "relay session rejected");
        self.transition(RelayState::Idle);
        Ok(())
    }

    /// Satisfy the pending request with the signer
    ///
    /// Unsupported methods answer the peer with an invalid-event error. When the
    /// transport refuses the answer the request stays pending, and a retry
    /// resends that answer instead of signing again.
    pub async fn approve_request(&mut self, request_id: u64) -> Result<RequestOutcome> {
        self.expect_state(&[RelayState::RequestPending], "RequestPending")?;
        let request = self.take_request(request_id)?;

        if let Some(response) = self.undelivered.take().filter(|r| r.id == request.id) {
            debug!(id = request.id, "resending relay response");
            return self.redeliver(request, response).await;
        }

        let method = request.request.method.clone();
        debug!(id = request.id, method = %method, "approving relay request");

        let result = match method.as_str() {
            "personal_sign" | "eth_sign" => match sign_payload(&request.request.params) {
                Some((bytes, _)) => self.signer.sign_message(&bytes).await.map(Value::String),
                None => Err(WalletAuthError::InvalidPayload(format!(
                    "{method} has no message parameter"
                ))),
            },
            "eth_signTransaction" => match transaction_param(&request.request.params) {
                Ok(tx) => self.signer.sign_transaction(&tx).await.map(Value::String),
                Err(e) => Err(e),
            },
            "eth_sendTransaction" => match transaction_param(&request.request.params) {
                Ok(tx) => self.signer.send_transaction(&tx).await.map(Value::String),
                Err(e) => Err(e),
            },
            _ => {
                warn!(id = request.id, method = %method, "unsupported relay method");
                let id = request.id;
                let response = JsonRpcResponse::error(id, ErrorReason::invalid_event(&method));
                self.deliver(request, response).await?;
                return Ok(RequestOutcome::Unsupported { id, method });
            }
        };

        let id = request.id;
        match result {
            Ok(value) => {
                let response = JsonRpcResponse::result(id, value.clone());
                self.deliver(request, response).await?;
                info!(id, method = %method, "relay request approved");
                Ok(RequestOutcome::Responded { id, result: value })
            }
            Err(e) => {
                let response = JsonRpcResponse::error(id, ErrorReason::internal(&e.to_string()));
                self.deliver(request, response).await?;
                warn!(id, method = %method, error = %e, "relay request failed");
                Err(e)
            }
        }
    }

    pub async fn reject_request(&mut self, request_id: u64) -> Result<()> {
        self.expect_state(&[RelayState::RequestPending], "RequestPending")?;
        let request = self.take_request(request_id)?;
        let id = request.id;
        let response = JsonRpcResponse::error(id, ErrorReason::user_rejected_request());
        self.deliver(request, response).await?;
        info!(id, "relay request rejected");
        Ok(())
    }

    /// Drop the pairing or session and return to `Idle`
    pub async fn disconnect(&mut self) -> Result<()> {
        if self.state == RelayState::Idle {
            return Err(WalletAuthError::InvalidRelayState {
                expected: "not Idle",
                actual: self.state.name(),
            });
        }

        if let Some(proposal) = self.pending_proposal.take() {
            if let Err(e) = self
                .transport
                .reject_session(proposal.id, &ErrorReason::user_rejected_session())
                .await
            {
                self.pending_proposal = Some(proposal);
                return Err(e);
            }
            info!(id = proposal.id, "pending proposal rejected on disconnect");
        }

        if let Some(session) = self.session.clone() {
            if let Some(request) = self.pending_request.clone() {
                let response =
                    JsonRpcResponse::error(request.id, ErrorReason::user_rejected_request());
                if let Err(e) = self.transport.respond(&request.topic, &response).await {
                    warn!(id = request.id, error = %e, "pending request left unanswered");
                }
            }
            self.transport
                .disconnect(&session.topic, &ErrorReason::user_disconnected())
                .await?;
            self.reset();
            self.emit(RelayEvent::SessionDelete {
                topic: session.topic,
            })
            .await;
        } else {
            self.reset();
        }
        info!("relay disconnected");
        Ok(())
    }

    /// Send the answer for `request`, keeping it pending if the transport fails
    async fn deliver(&mut self, request: SessionRequest, response: JsonRpcResponse) -> Result<()> {
        match self.transport.respond(&request.topic, &response).await {
            Ok(()) => {
                self.undelivered = None;
                self.transition(RelayState::Active);
                Ok(())
            }
            Err(e) => {
                warn!(id = request.id, error = %e, "relay response not delivered");
                self.pending_request = Some(request);
                self.undelivered = Some(response);
                Err(e)
            }
        }
    }

    async fn redeliver(
        &mut self,
        request: SessionRequest,
        response: JsonRpcResponse,
    ) -> Result<RequestOutcome> {
        let id = request.id;
        let method = request.request.method.clone();
        let outcome = match (&response.result, &response.error) {
            (Some(result), _) => Ok(RequestOutcome::Responded {
                id,
                result: result.clone(),
            }),
            (None, Some(reason)) if reason.code == ErrorReason::invalid_event(&method).code => {
                Ok(RequestOutcome::Unsupported { id, method })
            }
            (None, Some(reason)) => Err(WalletAuthError::Relay(reason.message.clone())),
            (None, None) => Err(WalletAuthError::Relay(format!("empty response for {id}"))),
        };
        self.deliver(request, response).await?;
        outcome
    }

    fn active_session(&self) -> Result<&RelaySession> {
        self.session.as_ref().ok_or(WalletAuthError::InvalidRelayState {
            expected: "Active",
            actual: self.state.name(),
        })
    }

    fn take_proposal(&mut self, id: u64) -> Result<SessionProposal> {
        match self.pending_proposal.take() {
            Some(proposal) if proposal.id == id => Ok(proposal),
            other => {
                self.pending_proposal = other;
                Err(WalletAuthError::StaleRelayItem { kind: "proposal", id })
            }
        }
    }

    fn take_request(&mut self, id: u64) -> Result<SessionRequest> {
        match self.pending_request.take() {
            Some(request) if request.id == id => Ok(request),
            other => {
                self.pending_request = other;
                Err(WalletAuthError::StaleRelayItem { kind: "request", id })
            }
        }
    }

    fn expect_state(&self, allowed: &[RelayState], expected: &'static str) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(WalletAuthError::InvalidRelayState {
                expected,
                actual: self.state.name(),
            })
        }
    }

    fn transition(&mut self, next: RelayState) {
        debug!(from = self.state.name(), to = next.name(), "relay state change");
        self.state = next;
    }

    fn reset(&mut self) {
        self.session = None;
        self.pending_proposal = None;
        self.pending_request = None;
        self.undelivered = None;
        self.transition(RelayState::Idle);
    }

    /// Publish without waiting; a full or untaken receiver drops the event
    async fn emit(&self, event: RelayEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(event = event.name(), "relay event channel full, event dropped");
            }
            Err(TrySendError::Closed(_)) => debug!("relay event receiver dropped"),
        }
    }
}

/// `chain:address` accounts for every required namespace
fn session_namespaces(
    proposal: &SessionProposal,
    address: Address,
) -> BTreeMap<String, SessionNamespace> {
    let address = address.to_checksum(None);
    proposal
        .required_namespaces
        .iter()
        .map(|(key, required)| {
            let namespace = SessionNamespace {
                accounts: required
                    .chains
                    .iter()
                    .map(|chain| format!("{chain}:{address}"))
                    .collect(),
                methods: required.methods.clone(),
                events: required.events.clone(),
            };
            (key.clone(), namespace)
        })
        .collect()
}

/// Bytes to sign and a display form, skipping address-shaped params
fn sign_payload(params: &Value) -> Option<(Vec<u8>, String)> {
    let message = params
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .find(|param| !is_address(param))?;

    if let Some(hex_body) = message.strip_prefix("0x") {
        if let Ok(bytes) = hex::decode(hex_body) {
            let display = match std::str::from_utf8(&bytes) {
                Ok(text) => text.to_string(),
                Err(_) => message.to_string(),
            };
            return Some((bytes, display));
        }
    }
    Some((message.as_bytes().to_vec(), message.to_string()))
}

fn transaction_param(params: &Value) -> Result<TransactionRequest> {
    let tx = params
        .as_array()
        .and_then(|params| params.first())
        .ok_or_else(|| WalletAuthError::InvalidPayload("missing transaction parameter".into()))?;
    serde_json::from_value(tx.clone())
        .map_err(|e| WalletAuthError::InvalidPayload(format!("invalid transaction: {e}")))
}

fn is_address(value: &str) -> bool {
    value.len() == 42 && value.starts_with("0x") && value.parse::<Address>().is_ok()
}
