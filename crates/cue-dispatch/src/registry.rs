//! Capability registry: the finite, enumerable surface the controller may call.
//!
//! Entries are keyed by exact method name plus a glob over the canonical module
//! path. Lookups scan in registration order and the first match wins, so
//! specific paths should be registered before broad ones.

use std::sync::Arc;

use async_trait::async_trait;
use cue_core::{InvokeError, ModulePath};
use glob::Pattern;
use serde_json::Value;

/// Whether a capability answers the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reply {
    /// Fire-and-forget.
    None,
    /// Send a `dataResponse` carrying the (normalized) result.
    Data,
}

/// Declared shape of a capability.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapabilitySpec {
    pub method: String,
    /// Glob over the canonical module path (`game.playlists.*`, `*`).
    pub path: String,
    /// Minimum number of positional arguments.
    pub min_args: usize,
    pub reply: Reply,
}

impl CapabilitySpec {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            min_args: 0,
            reply: Reply::None,
        }
    }

    #[must_use]
    pub fn min_args(mut self, n: usize) -> Self {
        self.min_args = n;
        self
    }

    #[must_use]
    pub fn replies(mut self) -> Self {
        self.reply = Reply::Data;
        self
    }
}

/// One resolved call handed to a capability.
#[derive(Clone, Debug)]
pub struct Invocation {
    pub module: ModulePath,
    pub method: String,
    /// Snapshot of the resolved target at dispatch time.
    pub target: Value,
    /// Arguments after inbound normalization.
    pub args: Vec<Value>,
}

impl Invocation {
    pub fn arg(&self, i: usize) -> Option<&Value> {
        self.args.get(i)
    }

    /// Required numeric argument.
    pub fn f64_arg(&self, i: usize) -> Result<f64, InvokeError> {
        self.arg(i).and_then(Value::as_f64).ok_or_else(|| {
            InvokeError::InvalidArguments(format!("argument {i} of {} must be a number", self.method))
        })
    }

    /// Required string argument.
    pub fn str_arg(&self, i: usize) -> Result<&str, InvokeError> {
        self.arg(i).and_then(Value::as_str).ok_or_else(|| {
            InvokeError::InvalidArguments(format!("argument {i} of {} must be a string", self.method))
        })
    }
}

/// A host operation reachable from the controller.
#[async_trait]
pub trait Capability: Send + Sync {
    async fn invoke(&self, call: Invocation) -> Result<Value, InvokeError>;
}

struct Entry {
    spec: CapabilitySpec,
    pattern: Option<Pattern>,
    handler: Arc<dyn Capability>,
}

impl Entry {
    fn matches(&self, method: &str, path: &str) -> bool {
        if self.spec.method != method {
            return false;
        }
        match &self.pattern {
            Some(pattern) => pattern.matches(path),
            None => self.spec.path == path,
        }
    }
}

/// A registry hit.
#[derive(Clone)]
pub struct Registered {
    pub spec: CapabilitySpec,
    pub handler: Arc<dyn Capability>,
}

/// Registry of invocable host operations.
#[derive(Default)]
pub struct CapabilityRegistry {
    entries: Vec<Entry>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability. Invalid globs fall back to exact path matching.
    pub fn register(&mut self, spec: CapabilitySpec, handler: impl Capability + 'static) {
        self.register_arc(spec, Arc::new(handler));
    }

    pub fn register_arc(&mut self, spec: CapabilitySpec, handler: Arc<dyn Capability>) {
        let pattern = match Pattern::new(&spec.path) {
            Ok(p) => Some(p),
            Err(e) => {
                tracing::warn!(path = %spec.path, error = %e, "invalid capability path glob, matching literally");
                None
            }
        };
        self.entries.push(Entry {
            spec,
            pattern,
            handler,
        });
    }

    /// First capability registered for `method` whose glob matches `path`.
    pub fn lookup(&self, method: &str, path: &str) -> Option<Registered> {
        self.entries
            .iter()
            .find(|e| e.matches(method, path))
            .map(|e| Registered {
                spec: e.spec.clone(),
                handler: Arc::clone(&e.handler),
            })
    }

    pub fn has_method(&self, method: &str) -> bool {
        self.entries.iter().any(|e| e.spec.method == method)
    }

    /// Sorted, de-duplicated method names.
    pub fn methods(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.iter().map(|e| e.spec.method.clone()).collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Constant(Value);

    #[async_trait]
    impl Capability for Constant {
        async fn invoke(&self, _call: Invocation) -> Result<Value, InvokeError> {
            Ok(self.0.clone())
        }
    }

    fn call(method: &str, args: Vec<Value>) -> Invocation {
        Invocation {
            module: ModulePath::parse("game.audio").unwrap(),
            method: method.into(),
            target: json!({}),
            args,
        }
    }

    #[tokio::test]
    async fn lookup_by_method_and_glob() {
        let mut reg = CapabilityRegistry::new();
        reg.register(
            CapabilitySpec::new("play", "game.playlists.*"),
            Constant(json!("playlist")),
        );
        reg.register(CapabilitySpec::new("play", "*"), Constant(json!("fallback")));

        let hit = reg.lookup("play", "game.playlists.0").unwrap();
        assert_eq!(hit.handler.invoke(call("play", vec![])).await.unwrap(), json!("playlist"));

        let hit = reg.lookup("play", "canvas.sounds.2").unwrap();
        assert_eq!(hit.handler.invoke(call("play", vec![])).await.unwrap(), json!("fallback"));

        assert!(reg.lookup("stop", "game.playlists.0").is_none());
    }

    #[test]
    fn spec_builder() {
        let spec = CapabilitySpec::new("get", "game.settings").min_args(2).replies();
        assert_eq!(spec.min_args, 2);
        assert_eq!(spec.reply, Reply::Data);
        assert_eq!(CapabilitySpec::new("x", "*").reply, Reply::None);
    }

    #[test]
    fn invalid_glob_matches_literally() {
        let mut reg = CapabilityRegistry::new();
        reg.register(CapabilitySpec::new("odd", "a[b"), Constant(json!(1)));
        assert!(reg.lookup("odd", "a[b").is_some());
        assert!(reg.lookup("odd", "ab").is_none());
    }

    #[test]
    fn methods_are_sorted_and_unique() {
        let mut reg = CapabilityRegistry::new();
        reg.register(CapabilitySpec::new("stop", "a"), Constant(json!(1)));
        reg.register(CapabilitySpec::new("play", "a"), Constant(json!(1)));
        reg.register(CapabilitySpec::new("play", "b"), Constant(json!(1)));
        assert_eq!(reg.methods(), vec!["play".to_string(), "stop".to_string()]);
        assert_eq!(reg.count(), 3);
        assert!(reg.has_method("stop"));
        assert!(!reg.has_method("pause"));
    }

    #[test]
    fn typed_argument_helpers() {
        let call = call("set", vec![json!("core"), json!(0.5)]);
        assert_eq!(call.str_arg(0).unwrap(), "core");
        assert!((call.f64_arg(1).unwrap() - 0.5).abs() < 1e-9);
        assert!(matches!(call.f64_arg(0), Err(InvokeError::InvalidArguments(_))));
        assert!(call.str_arg(5).is_err());
    }
}
