//! # cue-dispatch
//!
//! Wire protocol, capability registry, and the message dispatcher that turns
//! one inbound text frame into at most one outbound response.
//!
//! Per frame: parse → validate → resolve → intercept → normalize-in → invoke
//! → normalize-out → respond or drop. Nothing here can fail the connection:
//! every error is logged and the frame is dropped.

#![deny(unsafe_code)]

pub mod dispatcher;
pub mod errors;
pub mod intercepts;
pub mod protocol;
pub mod registry;

pub use dispatcher::{Dispatcher, LegacyTarget};
pub use errors::DispatchError;
pub use protocol::{InboundMessage, InboundRequest, OutboundResponse};
pub use registry::{Capability, CapabilityRegistry, CapabilitySpec, Invocation, Reply};
