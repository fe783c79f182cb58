//! # cue-host
//!
//! A self-contained host for the bridge: a JSON document standing in for the
//! live object graph, a settings store under `game.settings`, an operator
//! notice log, and the capability set the controller may call.

#![deny(unsafe_code)]

pub mod capabilities;
pub mod errors;
pub mod state;

pub use capabilities::register_capabilities;
pub use errors::HostError;
pub use state::{Notice, NoticeLevel, StateHost};
