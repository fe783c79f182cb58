//! Core building blocks of the cue bridge: module-path resolution, value
//! normalization, and the boundary traits of the embedding host.

pub mod errors;
pub mod host;
pub mod normalize;
pub mod path;

pub use errors::{InvokeError, PathError};
pub use host::{locate, HostGraph, HostSettings, Notifier, EXTENSIONS_KEY, EXTENSION_API_KEY};
pub use normalize::{Direction, NormalizationRule, Normalizer};
pub use path::{resolve, ModulePath};
