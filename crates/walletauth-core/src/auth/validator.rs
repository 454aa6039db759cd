/*
[INPUT]:  Nonces and token ids from incoming payloads
[OUTPUT]: Accept/reject verdicts from injected async predicates
[POS]:    Auth layer - replay-protection hooks for login and token checks
[UPDATE]: When the validator contract changes
*/

use std::collections::HashMap;
use std::future::Future;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::trace;

/// Boxed error returned by validators; its content is never inspected
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Async predicate over a nonce or token id
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, value: &str) -> Result<(), BoxError>;

    /// Release a value accepted by `validate` when a later check rejects the payload
    async fn forget(&self, _value: &str) {}
}

/// Validator from an async closure
pub struct FnValidator<F> {
    f: F,
}

impl<F> FnValidator<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Validator for FnValidator<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BoxError>> + Send,
{
    async fn validate(&self, value: &str) -> Result<(), BoxError> {
        (self.f)(value.to_string()).await
    }
}

/// How long a used value stays rejected
pub const DEFAULT_NONCE_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Upper bound on remembered values before the oldest are evicted
pub const DEFAULT_NONCE_CAPACITY: usize = 100_000;

/// Accepts each value once, rejecting replays
///
/// Entries older than the retention window are pruned on every check. The
/// window should cover the longest login or token lifetime in use, since a
/// pruned value is accepted again.
#[derive(Debug)]
pub struct UsedNonces {
    seen: Mutex<HashMap<String, Instant>>,
    retention: Duration,
    capacity: usize,
}

impl Default for UsedNonces {
    fn default() -> Self {
        Self {
            seen: Mutex::new(HashMap::new()),
            retention: DEFAULT_NONCE_RETENTION,
            capacity: DEFAULT_NONCE_CAPACITY,
        }
    }
}

impl UsedNonces {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub async fn len(&self) -> usize {
        self.seen.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.seen.lock().await.is_empty()
    }

    /// Drop entries past the retention window
    pub async fn prune(&self) -> usize {
        let mut seen = self.seen.lock().await;
        prune_expired(&mut seen, self.retention, Instant::now())
    }
}

fn prune_expired(seen: &mut HashMap<String, Instant>, retention: Duration, now: Instant) -> usize {
    let before = seen.len();
    seen.retain(|_, used_at| now.duration_since(*used_at) < retention);
    before - seen.len()
}

#[async_trait]
impl Validator for UsedNonces {
    async fn validate(&self, value: &str) -> Result<(), BoxError> {
        let now = Instant::now();
        let mut seen = self.seen.lock().await;
        let pruned = prune_expired(&mut seen, self.retention, now);
        if pruned > 0 {
            trace!(pruned, "expired nonces dropped");
        }

        if seen.contains_key(value) {
            return Err(format!("{value} was already used").into());
        }

        while seen.len() >= self.capacity {
            let oldest = seen
                .iter()
                .min_by_key(|(_, used_at)| **used_at)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    seen.remove(&key);
                }
                None => break,
            }
        }

        seen.insert(value.to_string(), now);
        Ok(())
    }

    async fn forget(&self, value: &str) {
        self.seen.lock().await.remove(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_used_nonces_rejects_replay() {
        let nonces = UsedNonces::new();
        assert!(nonces.validate("a").await.is_ok());
        assert!(nonces.validate("b").await.is_ok());
        assert!(nonces.validate("a").await.is_err());
        assert_eq!(nonces.len().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_used_nonces_expire_after_retention() {
        let nonces = UsedNonces::new().with_retention(Duration::from_secs(60));
        nonces.validate("a").await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        nonces.validate("b").await.unwrap();
        assert!(nonces.validate("a").await.is_err());

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(nonces.prune().await, 1);
        assert_eq!(nonces.len().await, 1);
        assert!(nonces.validate("a").await.is_ok());
        assert!(nonces.validate("b").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_used_nonces_capacity_evicts_oldest() {
        let nonces = UsedNonces::new().with_capacity(2);
        nonces.validate("a").await.unwrap();
        tokio::time::advance(Duration::from_millis(1)).await;
        nonces.validate("b").await.unwrap();
        tokio::time::advance(Duration::from_millis(1)).await;
        nonces.validate("c").await.unwrap();

        assert_eq!(nonces.len().await, 2);
        assert!(nonces.validate("b").await.is_err());
        assert!(nonces.validate("c").await.is_err());
    }

    #[tokio::test]
    async fn test_used_nonces_forget() {
        let nonces = UsedNonces::new();
        nonces.validate("a").await.unwrap();
        nonces.forget("a").await;
        assert!(nonces.is_empty().await);
        assert!(nonces.validate("a").await.is_ok());
    }

    #[tokio::test]
    async fn test_fn_validator() {
        let validator = FnValidator::new(|value: String| async move {
            if value.starts_with("ok") {
                Ok(())
            } else {
                Err(BoxError::from("rejected"))
            }
        });
        assert!(validator.validate("ok-1").await.is_ok());
        assert!(validator.validate("bad").await.is_err());
    }
}
