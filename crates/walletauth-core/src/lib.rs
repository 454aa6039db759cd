/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public wallet auth core surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod auth;
pub mod error;
pub mod keys;
pub mod relay;
pub mod rpc;
pub mod signer;
pub mod types;

// Re-export error types
pub use error::{ErrorKind, Result, WalletAuthError};

// Re-export commonly used types from signer
pub use signer::{
    AnySigner, CustodialConfig, CustodialSigner, KmsSigner, LocalSigner, MockWalletSigner,
    PollPolicy, WalletSigner,
};

// Re-export commonly used types from keys
pub use keys::{Encryption, FileStorage, KeyManager, KeySource, KeyStorage, MemoryStorage, Protection};

// Re-export commonly used types from auth
pub use auth::{
    AuthRegistry, AuthenticateOptions, AuthenticatedToken, GenerateOptions, LoginOptions,
    VerifyOptions, WalletAuth,
};

// Re-export commonly used types from relay
pub use relay::{RelayEvent, RelayHandler, RelayState, RelayTransport};

// Re-export commonly used types from rpc
pub use rpc::{ChainRpc, RpcConfig};

// Re-export all types
pub use types::*;
