/*
[INPUT]:  Relay wire payloads (proposals, requests, deletes)
[OUTPUT]: Typed relay events, session records and JSON-RPC responses
[POS]:    Relay layer - message types shared by transport and handler
[UPDATE]: When adding relay events or changing reason codes
*/

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Remote party description shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PeerMetadata {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub icons: Vec<String>,
}

/// Chains, methods and events a peer asks for under one namespace
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequiredNamespace {
    #[serde(default)]
    pub chains: Vec<String>,
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub events: Vec<String>,
}

/// Accounts granted under one namespace
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionNamespace {
    /// `chain:address` account ids
    pub accounts: Vec<String>,
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub events: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayProtocol {
    pub protocol: String,
}

/// Established session with a peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelaySession {
    pub topic: String,
    pub peer: PeerMetadata,
    #[serde(default)]
    pub namespaces: BTreeMap<String, SessionNamespace>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProposal {
    pub id: u64,
    pub proposer: PeerMetadata,
    #[serde(default)]
    pub required_namespaces: BTreeMap<String, RequiredNamespace>,
    #[serde(default)]
    pub relays: Vec<RelayProtocol>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestPayload {
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub id: u64,
    pub topic: String,
    #[serde(default)]
    pub chain_id: Option<String>,
    pub request: RequestPayload,
}

/// Events delivered by the relay transport
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Proposal(SessionProposal),
    Request(SessionRequest),
    Delete { topic: String },
}

/// Error reason sent to the peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReason {
    pub code: i64,
    pub message: String,
}

impl ErrorReason {
    pub fn user_rejected_session() -> Self {
        Self {
            code: 5002,
            message: "User rejected methods.".to_string(),
        }
    }

    pub fn user_rejected_request() -> Self {
        Self {
            code: 5000,
            message: "User rejected methods.".to_string(),
        }
    }

    pub fn user_disconnected() -> Self {
        Self {
            code: 6000,
            message: "USER_DISCONNECTED".to_string(),
        }
    }

    /// Method the wallet does not handle
    pub fn invalid_event(method: &str) -> Self {
        Self {
            code: 1002,
            message: format!("Invalid event: {method}"),
        }
    }

    /// Signing backend failed while handling a request
    pub fn internal(message: &str) -> Self {
        Self {
            code: -32603,
            message: message.to_string(),
        }
    }
}

/// JSON-RPC 2.0 response to a session request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub id: u64,
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReason>,
}

impl JsonRpcResponse {
    pub fn result(id: u64, result: Value) -> Self {
        Self {
            id,
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: u64, error: ErrorReason) -> Self {
        Self {
            id,
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
        }
    }
}

/// Observable handler events, one per session or request mutation
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    SessionProposal(SessionProposal),
    SessionApproved(RelaySession),
    SessionRequest {
        topic: String,
        id: u64,
        method: String,
        peer: PeerMetadata,
        /// Human-readable message for signing methods
        message: Option<String>,
        params: Value,
    },
    SessionDelete {
        topic: String,
    },
}

impl RelayEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            RelayEvent::SessionProposal(_) => "session_proposal",
            RelayEvent::SessionApproved(_) => "session_approved",
            RelayEvent::SessionRequest { .. } => "session_request",
            RelayEvent::SessionDelete { .. } => "session_delete",
        }
    }
}

/// How an approved request was resolved
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    /// Result sent to the peer (signature, raw transaction or hash)
    Responded { id: u64, result: Value },
    /// Method not handled; the peer received an invalid-event error
    Unsupported { id: u64, method: String },
}
