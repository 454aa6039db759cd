/*
[INPUT]:  RPC configuration (endpoint URLs, timeouts)
[OUTPUT]: Alloy providers keyed by chain id, contract reads
[POS]:    RPC layer - provider construction and per-chain lookup
[UPDATE]: When adding chain access or changing provider construction
*/

use std::collections::BTreeMap;
use std::time::Duration;

use alloy::network::TransactionBuilder;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::client::RpcClient;
use alloy::rpc::types::TransactionRequest;
use alloy::transports::http::Http;
use alloy::transports::http::reqwest::{Client, Url};
use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use tracing::debug;

use crate::error::{Result, WalletAuthError};

/// RPC client configuration
#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Chain id to endpoint URL
    pub endpoints: BTreeMap<u64, String>,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            endpoints: BTreeMap::new(),
        }
    }
}

/// Read-only contract access used by the EIP-1271 fallback
#[async_trait]
pub trait ContractReader: Send + Sync {
    /// Execute `eth_call` against `to` on `chain_id` and return the raw output
    async fn call(&self, chain_id: u64, to: Address, data: Bytes) -> Result<Bytes>;
}

/// HTTP provider for one endpoint, honoring the configured timeouts
pub fn http_provider(url: &str, config: &RpcConfig) -> Result<DynProvider> {
    let url = Url::parse(url)?;
    let http_client = Client::builder()
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .build()
        .map_err(|e| WalletAuthError::Transport(format!("http client: {e}")))?;

    let client = RpcClient::new(Http::with_client(http_client, url), false);
    Ok(ProviderBuilder::new().connect_client(client).erased())
}

/// Providers keyed by chain id
#[derive(Default)]
pub struct ChainRpc {
    providers: BTreeMap<u64, DynProvider>,
}

impl ChainRpc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one provider per configured endpoint
    pub fn from_config(config: &RpcConfig) -> Result<Self> {
        let mut rpc = Self::new();
        for (chain_id, url) in &config.endpoints {
            rpc.insert(*chain_id, http_provider(url, config)?);
        }
        Ok(rpc)
    }

    /// Add an HTTP endpoint with default timeouts
    pub fn connect(&mut self, chain_id: u64, url: &str) -> Result<()> {
        self.insert(chain_id, http_provider(url, &RpcConfig::default())?);
        Ok(())
    }

    pub fn insert(&mut self, chain_id: u64, provider: DynProvider) {
        self.providers.insert(chain_id, provider);
    }

    pub fn provider(&self, chain_id: u64) -> Result<&DynProvider> {
        self.providers
            .get(&chain_id)
            .ok_or(WalletAuthError::MissingRpc(chain_id))
    }

    pub fn chains(&self) -> impl Iterator<Item = u64> + '_ {
        self.providers.keys().copied()
    }
}

impl std::fmt::Debug for ChainRpc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainRpc")
            .field("chains", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait]
impl ContractReader for ChainRpc {
    async fn call(&self, chain_id: u64, to: Address, data: Bytes) -> Result<Bytes> {
        let provider = self.provider(chain_id)?;
        debug!(chain_id, %to, "eth_call");
        let tx = TransactionRequest::default().with_to(to).with_input(data);
        Ok(provider.call(tx).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    /// Replies with a fixed body, echoing the request id
    struct Reply(Value);

    impl Respond for Reply {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let body: Value = serde_json::from_slice(&request.body).unwrap();
            let mut reply = self.0.clone();
            reply["jsonrpc"] = json!("2.0");
            reply["id"] = body["id"].clone();
            ResponseTemplate::new(200).set_body_json(reply)
        }
    }

    #[tokio::test]
    async fn test_call_returns_output() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "eth_call"})))
            .respond_with(Reply(json!({"result": "0x1626ba7e"})))
            .expect(1)
            .mount(&server)
            .await;

        let mut rpc = ChainRpc::new();
        rpc.connect(137, &server.uri()).unwrap();
        let output = rpc.call(137, Address::ZERO, Bytes::new()).await.unwrap();
        assert_eq!(output.as_ref(), [0x16, 0x26, 0xba, 0x7e]);
    }

    #[tokio::test]
    async fn test_rpc_error_object() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(Reply(json!({
                "error": {"code": -32000, "message": "execution reverted"},
            })))
            .mount(&server)
            .await;

        let mut rpc = ChainRpc::new();
        rpc.connect(1, &server.uri()).unwrap();
        let err = rpc.call(1, Address::ZERO, Bytes::new()).await.unwrap_err();
        match err {
            WalletAuthError::Rpc { code, message } => {
                assert_eq!(code, -32000);
                assert_eq!(message, "execution reverted");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_chain_rpc_missing_endpoint() {
        let rpc = ChainRpc::new();
        let err = rpc.call(1, Address::ZERO, Bytes::new()).await.unwrap_err();
        assert!(matches!(err, WalletAuthError::MissingRpc(1)));
    }

    #[test]
    fn test_from_config_builds_each_chain() {
        let config = RpcConfig {
            endpoints: BTreeMap::from([
                (1, "http://127.0.0.1:8545".to_string()),
                (137, "http://127.0.0.1:8546".to_string()),
            ]),
            ..RpcConfig::default()
        };
        let rpc = ChainRpc::from_config(&config).unwrap();
        assert_eq!(rpc.chains().collect::<Vec<_>>(), vec![1, 137]);

        let bad = RpcConfig {
            endpoints: BTreeMap::from([(1, "not a url".to_string())]),
            ..RpcConfig::default()
        };
        assert!(matches!(
            ChainRpc::from_config(&bad),
            Err(WalletAuthError::UrlParse(_))
        ));
    }
}
