/*
[INPUT]:  Relay transport events and user approval decisions
[OUTPUT]: Relay session handler, transport contract and message types
[POS]:    Relay layer - remote signing sessions over a WalletConnect-style relay
[UPDATE]: When adding relay methods or transport implementations
*/

pub mod handler;
pub mod message;
pub mod transport;

pub use handler::{RelayHandler, RelayState};
pub use message::{
    ErrorReason, InboundEvent, JsonRpcResponse, PeerMetadata, RelayEvent, RelayProtocol,
    RelaySession, RequestOutcome, RequestPayload, RequiredNamespace, SessionNamespace,
    SessionProposal, SessionRequest,
};
pub use transport::{MemoryRelayTransport, RelayTransport, TransportCall};
