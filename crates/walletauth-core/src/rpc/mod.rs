/*
[INPUT]:  Chain RPC endpoints
[OUTPUT]: Per-chain alloy providers for contract reads and transaction paths
[POS]:    RPC layer - chain access for verification and transaction paths
[UPDATE]: When adding chain access or changing provider construction
*/

pub mod client;

pub use client::{ChainRpc, ContractReader, RpcConfig, http_provider};
