/*
[INPUT]:  Custodial service URL, access token, backend wallet address
[OUTPUT]: Remotely produced signatures and mined transaction hashes
[POS]:    Signer layer - remote-custodial signer variant
[UPDATE]: When the custodial service API or polling policy changes
*/

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::error::{Result, WalletAuthError};
use crate::rpc::{ChainRpc, ContractReader};
use crate::signer::WalletSigner;
use crate::types::TransactionRequest;

/// Backoff policy for transaction status polling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    pub initial_interval: Duration,
    pub multiplier: u32,
    pub max_interval: Duration,
    /// Overall deadline, after which polling fails with `Timeout`
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            multiplier: 2,
            max_interval: Duration::from_secs(10),
            timeout: Duration::from_secs(120),
        }
    }
}

impl PollPolicy {
    /// Interval to wait after `current`
    pub fn next_interval(&self, current: Duration) -> Duration {
        current
            .saturating_mul(self.multiplier.max(1))
            .min(self.max_interval)
    }
}

/// Custodial signer configuration
#[derive(Debug, Clone)]
pub struct CustodialConfig {
    pub base_url: String,
    pub access_token: String,
    /// Address of the wallet held by the service
    pub wallet_address: Address,
    pub chain_id: Option<u64>,
    pub poll: PollPolicy,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl CustodialConfig {
    pub fn new(base_url: &str, access_token: &str, wallet_address: Address) -> Self {
        Self {
            base_url: base_url.to_string(),
            access_token: access_token.to_string(),
            wallet_address,
            chain_id: None,
            poll: PollPolicy::default(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Deserialize)]
struct ResultEnvelope<T> {
    result: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueuedTransaction {
    queue_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionStatus {
    status: String,
    #[serde(default)]
    transaction_hash: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
}

/// Signer whose key lives in a remote custodial service
#[derive(Clone)]
pub struct CustodialSigner {
    http_client: Client,
    base_url: Url,
    access_token: String,
    address: Address,
    chain_id: Option<u64>,
    poll: PollPolicy,
    rpc: Option<Arc<ChainRpc>>,
}

impl CustodialSigner {
    pub fn new(config: CustodialConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        // Url::join drops the last path segment unless it ends with '/'
        let mut base_url = Url::parse(&config.base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            http_client,
            base_url,
            access_token: config.access_token,
            address: config.wallet_address,
            chain_id: config.chain_id,
            poll: config.poll,
            rpc: None,
        })
    }

    /// Attach chain RPC for contract-wallet verification
    pub fn with_rpc(mut self, rpc: Arc<ChainRpc>) -> Self {
        self.rpc = Some(rpc);
        self
    }

    fn request(&self, method: Method, endpoint: &str) -> Result<RequestBuilder> {
        let url = self.base_url.join(endpoint)?;
        Ok(self
            .http_client
            .request(method, url)
            .bearer_auth(&self.access_token)
            .header("x-backend-wallet-address", self.address.to_checksum(None)))
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WalletAuthError::InvalidResponse(format!(
                "custodial service returned {status}: {body}"
            )));
        }
        let envelope: ResultEnvelope<T> = response.json().await?;
        Ok(envelope.result)
    }

    async fn transaction_status(&self, queue_id: &str) -> Result<TransactionStatus> {
        let builder = self.request(Method::GET, &format!("transaction/status/{queue_id}"))?;
        self.send_json(builder).await
    }

    /// Poll a queued job until it is mined, errored or cancelled
    async fn wait_for_transaction(&self, queue_id: &str) -> Result<String> {
        let started = Instant::now();
        let mut interval = self.poll.initial_interval;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let status = self.transaction_status(queue_id).await?;
            debug!(queue_id, attempt, status = %status.status, "custodial transaction status");

            match status.status.as_str() {
                "mined" => {
                    return status.transaction_hash.ok_or_else(|| {
                        WalletAuthError::InvalidResponse(format!(
                            "transaction {queue_id} mined without a hash"
                        ))
                    });
                }
                "errored" | "cancelled" => {
                    warn!(queue_id, status = %status.status, "custodial transaction failed");
                    return Err(WalletAuthError::TransactionFailed {
                        queue_id: queue_id.to_string(),
                        message: status.error_message.unwrap_or_default(),
                        status: status.status,
                    });
                }
                _ => {}
            }

            if started.elapsed() + interval > self.poll.timeout {
                return Err(WalletAuthError::Timeout {
                    duration: self.poll.timeout.as_secs(),
                });
            }
            sleep(interval).await;
            interval = self.poll.next_interval(interval);
        }
    }

    fn transaction_chain(&self, tx: &TransactionRequest) -> Result<u64> {
        crate::signer::transaction::resolve_chain_id(tx, self.chain_id)
    }
}

impl fmt::Debug for CustodialSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustodialSigner")
            .field("base_url", &self.base_url.as_str())
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .finish()
    }
}

#[async_trait]
impl WalletSigner for CustodialSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    async fn sign_message(&self, message: &[u8]) -> Result<String> {
        let body = match std::str::from_utf8(message) {
            Ok(text) => json!({ "message": text, "isBytes": false }),
            Err(_) => json!({ "message": format!("0x{}", hex::encode(message)), "isBytes": true }),
        };
        let builder = self
            .request(Method::POST, "backend-wallet/sign-message")?
            .json(&body);
        self.send_json(builder).await
    }

    fn contract_reader(&self) -> Option<&dyn ContractReader> {
        self.rpc.as_deref().map(|rpc| rpc as &dyn ContractReader)
    }

    async fn sign_transaction(&self, tx: &TransactionRequest) -> Result<String> {
        let builder = self
            .request(Method::POST, "backend-wallet/sign-transaction")?
            .json(&json!({ "transaction": tx }));
        self.send_json(builder).await
    }

    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<String> {
        let chain_id = self.transaction_chain(tx)?;
        let builder = self
            .request(Method::POST, &format!("backend-wallet/{chain_id}/send-transaction"))?
            .json(tx);
        let queued: QueuedTransaction = self.send_json(builder).await?;
        info!(queue_id = %queued.queue_id, chain_id, "custodial transaction queued");

        let hash = self.wait_for_transaction(&queued.queue_id).await?;
        info!(queue_id = %queued.queue_id, tx_hash = %hash, "custodial transaction mined");
        Ok(hash)
    }
}
