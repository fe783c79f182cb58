//! # cue-client
//!
//! Outbound WebSocket side of the bridge. A single supervised connection to
//! the controller: readiness handshake on open, one dispatch task per inbound
//! frame, fixed-delay unlimited retry, and an operator-triggered reconnect
//! that skips the pending retry timer.

#![deny(unsafe_code)]

pub mod connection;
pub mod endpoint;
pub mod errors;

pub use connection::{
    BridgeHandle, ConnectionConfig, ConnectionId, ConnectionManager, ConnectionState,
    ConnectionStatus,
};
pub use endpoint::{build_url, Endpoint, EndpointSource, SettingsEndpoint, StaticEndpoint};
pub use errors::ConnectionError;
