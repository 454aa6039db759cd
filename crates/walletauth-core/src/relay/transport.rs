/*
[INPUT]:  Pairing URIs, approvals, rejections and responses from the handler
[OUTPUT]: Calls on the external relay client (or a recording in-memory double)
[POS]:    Relay layer - transport contract at the relay client boundary
[UPDATE]: When the relay client interface changes
*/

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{Result, WalletAuthError};
use crate::relay::message::{
    ErrorReason, JsonRpcResponse, RelaySession, SessionNamespace, SessionProposal,
};

/// Outbound side of the relay client
///
/// Inbound events reach the handler through an `mpsc` channel instead.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    async fn pair(&self, uri: &str) -> Result<()>;

    async fn approve_session(
        &self,
        proposal: &SessionProposal,
        relay_protocol: &str,
        namespaces: &BTreeMap<String, SessionNamespace>,
    ) -> Result<RelaySession>;

    async fn reject_session(&self, proposal_id: u64, reason: &ErrorReason) -> Result<()>;

    async fn respond(&self, topic: &str, response: &JsonRpcResponse) -> Result<()>;

    async fn disconnect(&self, topic: &str, reason: &ErrorReason) -> Result<()>;

    /// Sessions persisted by the relay client from earlier runs
    async fn active_sessions(&self) -> Result<Vec<RelaySession>>;
}

/// Call recorded by `MemoryRelayTransport`
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    Pair {
        uri: String,
    },
    ApproveSession {
        proposal_id: u64,
        relay_protocol: String,
        namespaces: BTreeMap<String, SessionNamespace>,
    },
    RejectSession {
        proposal_id: u64,
        reason: ErrorReason,
    },
    Respond {
        topic: String,
        response: JsonRpcResponse,
    },
    Disconnect {
        topic: String,
        reason: ErrorReason,
    },
}

/// In-process transport that records every call
#[derive(Debug, Default)]
pub struct MemoryRelayTransport {
    calls: Mutex<Vec<TransportCall>>,
    sessions: Mutex<Vec<RelaySession>>,
    fail_pairing: bool,
    offline: AtomicBool,
}

impl MemoryRelayTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport that reports previously established sessions
    pub fn with_sessions(sessions: Vec<RelaySession>) -> Self {
        Self {
            sessions: Mutex::new(sessions),
            ..Default::default()
        }
    }

    /// Transport whose pairing attempts fail
    pub fn failing_pairing() -> Self {
        Self {
            fail_pairing: true,
            ..Default::default()
        }
    }

    /// While offline, approvals, rejections, responses and disconnects fail after being recorded
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn last_call(&self) -> Option<TransportCall> {
        self.calls().pop()
    }

    fn record(&self, call: TransportCall) {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(call);
    }

    fn ensure_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(WalletAuthError::Relay("relay unreachable".into()));
        }
        Ok(())
    }

    fn sessions(&self) -> std::sync::MutexGuard<'_, Vec<RelaySession>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl RelayTransport for MemoryRelayTransport {
    async fn pair(&self, uri: &str) -> Result<()> {
        self.record(TransportCall::Pair {
            uri: uri.to_string(),
        });
        if self.fail_pairing {
            return Err(WalletAuthError::Relay("pairing failed".into()));
        }
        Ok(())
    }

    async fn approve_session(
        &self,
        proposal: &SessionProposal,
        relay_protocol: &str,
        namespaces: &BTreeMap<String, SessionNamespace>,
    ) -> Result<RelaySession> {
        self.record(TransportCall::ApproveSession {
            proposal_id: proposal.id,
            relay_protocol: relay_protocol.to_string(),
            namespaces: namespaces.clone(),
        });
        self.ensure_online()?;
        let session = RelaySession {
            topic: Uuid::new_v4().simple().to_string(),
            peer: proposal.proposer.clone(),
            namespaces: namespaces.clone(),
        };
        self.sessions().push(session.clone());
        Ok(session)
    }

    async fn reject_session(&self, proposal_id: u64, reason: &ErrorReason) -> Result<()> {
        self.record(TransportCall::RejectSession {
            proposal_id,
            reason: reason.clone(),
        });
        self.ensure_online()
    }

    async fn respond(&self, topic: &str, response: &JsonRpcResponse) -> Result<()> {
        self.record(TransportCall::Respond {
            topic: topic.to_string(),
            response: response.clone(),
        });
        self.ensure_online()
    }

    async fn disconnect(&self, topic: &str, reason: &ErrorReason) -> Result<()> {
        self.record(TransportCall::Disconnect {
            topic: topic.to_string(),
            reason: reason.clone(),
        });
        self.ensure_online()?;
        self.sessions().retain(|session| session.topic != topic);
        Ok(())
    }

    async fn active_sessions(&self) -> Result<Vec<RelaySession>> {
        Ok(self.sessions().clone())
    }
}
