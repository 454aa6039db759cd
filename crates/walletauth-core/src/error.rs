/*
[INPUT]:  Error sources (schema checks, protocol checks, crypto, RPC, relay, storage)
[OUTPUT]: Structured error types with classification helpers
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or changing verification failure names
*/

use alloy::transports::TransportError;
use thiserror::Error;

/// Broad failure classes, used by callers that map errors to user-visible messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed payload, address, key material or token
    Schema,
    /// A field did not match what the verifier expected
    ProtocolMismatch,
    /// Not yet valid or already expired
    Temporal,
    /// Signature did not verify
    Cryptographic,
    /// Network, RPC or relay failure
    Transport,
    /// Operation not allowed in the current wallet or relay state
    State,
    /// Key storage or encryption failure
    Storage,
}

/// Main error type for the wallet auth core
#[derive(Error, Debug)]
pub enum WalletAuthError {
    /// Payload failed schema validation
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Address string is not a valid EVM address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Private key is not 32 bytes of hex (also returned for a wrong decryption password)
    #[error("Invalid private key")]
    InvalidPrivateKey,

    /// Mnemonic failed checksum validation (also returned for a wrong decryption password)
    #[error("Invalid mnemonic")]
    InvalidMnemonic,

    /// Keystore JSON could not be decrypted or parsed
    #[error("Invalid keystore: {0}")]
    InvalidKeystore(String),

    /// Session token is not three well-formed segments
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Expected account type '{expected}' does not match account type on payload '{found}'")]
    AccountTypeMismatch { expected: String, found: String },

    #[error("Expected domain '{expected}' does not match domain on payload '{found}'")]
    DomainMismatch { expected: String, found: String },

    #[error("Expected statement '{expected}' does not match statement on payload '{found}'")]
    StatementMismatch { expected: String, found: String },

    #[error("Expected URI '{expected}' does not match URI on payload '{found}'")]
    UriMismatch { expected: String, found: String },

    #[error("Expected version '{expected}' does not match version on payload '{found}'")]
    VersionMismatch { expected: String, found: String },

    #[error("Expected chain ID '{expected}' does not match chain ID on payload '{found}'")]
    ChainIdMismatch { expected: String, found: String },

    #[error("Login request is missing required resources: {}", .0.join(", "))]
    MissingResources(Vec<String>),

    #[error("Expected token to be for the domain '{expected}', but found token with domain '{found}'")]
    AudienceMismatch { expected: String, found: String },

    #[error("The expected issuer address '{expected}' did not match the token issuer address '{found}'")]
    IssuerMismatch { expected: String, found: String },

    /// Injected nonce validator rejected the nonce, for any reason
    #[error("Login request nonce is invalid")]
    InvalidNonce,

    /// Injected token-id validator rejected the token id, for any reason
    #[error("Token ID is invalid")]
    InvalidTokenId,

    #[error("Login request is not yet valid")]
    LoginNotYetValid,

    #[error("Login request has expired")]
    LoginExpired,

    #[error("This token is invalid before epoch time '{nbf}', current epoch time is '{now}'")]
    TokenNotYetValid { nbf: i64, now: i64 },

    #[error("This token expired at epoch time '{exp}', current epoch time is '{now}'")]
    TokenExpired { exp: i64, now: i64 },

    /// Login signature did not recover to the payload address, and contract fallback failed
    #[error("Signer address does not match payload address '{0}'")]
    SignatureMismatch(String),

    /// Token signature was not produced by the issuer
    #[error("The expected signer address '{0}' did not sign the token")]
    TokenSignatureInvalid(String),

    /// Signing backend failed
    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Wallet is already initialized")]
    AlreadyInitialized,

    #[error("Wallet is not initialized")]
    NotInitialized,

    #[error("No saved wallet found in storage")]
    NoSavedWallet,

    #[error("Saved wallet data is {found}, expected {expected}")]
    StrategyMismatch { expected: String, found: String },

    /// Stored encryption flag disagrees with the requested protection
    #[error("{}", encryption_mismatch_message(.stored_encrypted))]
    EncryptionMismatch { stored_encrypted: bool },

    #[error("Mnemonic is not available for a wallet imported from a private key")]
    MnemonicUnavailable,

    #[error("Password is required for the encrypted keystore strategy")]
    PasswordRequired,

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON-RPC endpoint returned an error object
    #[error("RPC error (code {code}): {message}")]
    Rpc { code: i64, message: String },

    /// Provider could not reach the node or decode its reply
    #[error("RPC transport error: {0}")]
    Transport(String),

    /// No RPC endpoint configured for the chain
    #[error("No RPC endpoint configured for chain {0}")]
    MissingRpc(u64),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Invalid response from a remote service
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Remote transaction job ended in a failure state
    #[error("Transaction {queue_id} ended with status {status}: {message}")]
    TransactionFailed {
        queue_id: String,
        status: String,
        message: String,
    },

    /// Polling gave up
    #[error("Timed out after {duration}s")]
    Timeout { duration: u64 },

    /// The signer variant does not support the operation
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Relay transport failure
    #[error("Relay error: {0}")]
    Relay(String),

    /// Relay handler is in the wrong state for the call
    #[error("Invalid relay state: expected {expected}, handler is {actual}")]
    InvalidRelayState { expected: &'static str, actual: &'static str },

    /// Proposal or request id does not match the pending item
    #[error("No pending {kind} with id {id}")]
    StaleRelayItem { kind: &'static str, id: u64 },
}

fn encryption_mismatch_message(stored_encrypted: &bool) -> &'static str {
    if *stored_encrypted {
        "Saved wallet data is encrypted, but no password is provided"
    } else {
        "Saved wallet data is not encrypted, but encryption config is provided"
    }
}

impl WalletAuthError {
    /// Classify the error into one of the broad failure classes
    pub fn kind(&self) -> ErrorKind {
        use WalletAuthError::*;
        match self {
            InvalidPayload(_) | InvalidAddress(_) | InvalidPrivateKey | InvalidMnemonic
            | InvalidKeystore(_) | InvalidToken(_) | Serialization(_) | UrlParse(_) => {
                ErrorKind::Schema
            }
            AccountTypeMismatch { .. }
            | DomainMismatch { .. }
            | StatementMismatch { .. }
            | UriMismatch { .. }
            | VersionMismatch { .. }
            | ChainIdMismatch { .. }
            | MissingResources(_)
            | AudienceMismatch { .. }
            | IssuerMismatch { .. }
            | InvalidNonce
            | InvalidTokenId => ErrorKind::ProtocolMismatch,
            LoginNotYetValid | LoginExpired | TokenNotYetValid { .. } | TokenExpired { .. } => {
                ErrorKind::Temporal
            }
            SignatureMismatch(_) | TokenSignatureInvalid(_) | Signing(_) => {
                ErrorKind::Cryptographic
            }
            Http(_)
            | Rpc { .. }
            | Transport(_)
            | MissingRpc(_)
            | InvalidResponse(_)
            | TransactionFailed { .. }
            | Timeout { .. }
            | Relay(_) => ErrorKind::Transport,
            AlreadyInitialized
            | NotInitialized
            | Unsupported(_)
            | InvalidRelayState { .. }
            | StaleRelayItem { .. } => ErrorKind::State,
            NoSavedWallet
            | StrategyMismatch { .. }
            | EncryptionMismatch { .. }
            | MnemonicUnavailable
            | PasswordRequired
            | Encryption(_)
            | Storage(_)
            | Io(_) => ErrorKind::Storage,
        }
    }

    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WalletAuthError::Http(_)
                | WalletAuthError::Transport(_)
                | WalletAuthError::Timeout { .. }
                | WalletAuthError::Relay(_)
                | WalletAuthError::InvalidResponse(_)
        )
    }

    /// Check if error means the caller should be denied access
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ProtocolMismatch | ErrorKind::Temporal | ErrorKind::Cryptographic
        )
    }
}

impl From<TransportError> for WalletAuthError {
    fn from(err: TransportError) -> Self {
        match err.as_error_resp() {
            Some(payload) => WalletAuthError::Rpc {
                code: payload.code,
                message: payload.message.to_string(),
            },
            None => WalletAuthError::Transport(err.to_string()),
        }
    }
}

/// Result type alias for wallet auth operations
pub type Result<T> = std::result::Result<T, WalletAuthError>;
