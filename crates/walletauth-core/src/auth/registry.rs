/*
[INPUT]:  Domain names and a shared wallet signer
[OUTPUT]: One domain-bound WalletAuth instance per domain
[POS]:    Auth layer - explicit per-domain protocol registry owned by the host
[UPDATE]: When protocol entry points or registry keying change
*/

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::auth::login::{self, LoginOptions, VerifyOptions};
use crate::auth::token::{self, AuthenticateOptions, AuthenticatedToken, GenerateOptions};
use crate::error::Result;
use crate::signer::WalletSigner;
use crate::types::{LoginPayload, LoginPayloadData};

/// Login and token protocol bound to one domain and signer
///
/// Stateless apart from its domain and signer, so instances are shared freely.
#[derive(Clone)]
pub struct WalletAuth {
    domain: String,
    signer: Arc<dyn WalletSigner>,
}

impl WalletAuth {
    pub fn new(domain: &str, signer: Arc<dyn WalletSigner>) -> Self {
        Self {
            domain: domain.to_string(),
            signer,
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn signer(&self) -> &Arc<dyn WalletSigner> {
        &self.signer
    }

    pub async fn build(&self, mut options: LoginOptions) -> Result<LoginPayloadData> {
        options.domain = self.domain.clone();
        login::build(self.signer.as_ref(), &options).await
    }

    pub async fn login(&self, mut options: LoginOptions) -> Result<LoginPayload> {
        options.domain = self.domain.clone();
        login::login(self.signer.as_ref(), &options).await
    }

    pub async fn verify(&self, payload: &LoginPayload, mut options: VerifyOptions) -> Result<String> {
        options.domain = self.domain.clone();
        login::verify(self.signer.as_ref(), payload, &options).await
    }

    pub async fn generate_token(
        &self,
        payload: &LoginPayload,
        mut options: GenerateOptions,
    ) -> Result<String> {
        options.verify.domain = self.domain.clone();
        token::generate_token(self.signer.as_ref(), payload, &options).await
    }

    pub async fn authenticate(
        &self,
        token: &str,
        mut options: AuthenticateOptions,
    ) -> Result<AuthenticatedToken> {
        options.domain = self.domain.clone();
        token::authenticate(self.signer.as_ref(), token, &options).await
    }

    pub async fn refresh(
        &self,
        token: &AuthenticatedToken,
        expiration_time: Option<DateTime<Utc>>,
    ) -> Result<String> {
        token::refresh(self.signer.as_ref(), token, expiration_time).await
    }
}

/// Per-domain cache of `WalletAuth` instances
pub struct AuthRegistry {
    signer: Arc<dyn WalletSigner>,
    instances: RwLock<HashMap<String, Arc<WalletAuth>>>,
}

impl AuthRegistry {
    pub fn new(signer: Arc<dyn WalletSigner>) -> Self {
        Self {
            signer,
            instances: RwLock::new(HashMap::new()),
        }
    }

    /// Instance for `domain`, created on first use
    pub fn get(&self, domain: &str) -> Arc<WalletAuth> {
        if let Some(auth) = self
            .instances
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(domain)
        {
            return Arc::clone(auth);
        }

        let mut guard = self
            .instances
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let auth = guard.entry(domain.to_string()).or_insert_with(|| {
            debug!(domain, "auth instance created");
            Arc::new(WalletAuth::new(domain, Arc::clone(&self.signer)))
        });
        Arc::clone(auth)
    }

    /// Drop the instance for `domain`
    pub fn remove(&self, domain: &str) -> Option<Arc<WalletAuth>> {
        self.instances
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(domain)
    }

    pub fn domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self
            .instances
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect();
        domains.sort();
        domains
    }
}
