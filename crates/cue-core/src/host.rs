//! Boundary of the embedding host.
//!
//! The bridge never reaches into ambient globals: the host hands it these
//! traits at startup and the dispatcher reads through them per request.

use serde_json::Value;

use crate::path::ModulePath;

/// Top-level key holding installed extensions.
pub const EXTENSIONS_KEY: &str = "modules";
/// Key under an extension that exposes its public surface.
pub const EXTENSION_API_KEY: &str = "api";

/// Read-only view of the host's live object graph.
pub trait HostGraph: Send + Sync {
    /// A fresh view of the graph. Called once per request; never cached.
    fn snapshot(&self) -> Value;
}

/// Host settings store keyed by `(namespace, key)`.
pub trait HostSettings: Send + Sync {
    fn get(&self, namespace: &str, key: &str) -> Option<Value>;
}

/// Operator-facing notifications.
pub trait Notifier: Send + Sync {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
}

/// Locate `path` in `root`: first as a top-level namespace path, then as a path
/// into an active extension's `api` object (`<extension>.<rest>`).
pub fn locate<'a>(root: &'a Value, path: &ModulePath) -> Option<&'a Value> {
    if let Some(found) = path.resolve(root) {
        return Some(found);
    }
    let extension = root.get(EXTENSIONS_KEY)?.get(path.head()?)?;
    if extension.get("active").and_then(Value::as_bool) == Some(false) {
        return None;
    }
    let api = extension.get(EXTENSION_API_KEY)?;
    let rest = path.tail();
    if rest.is_empty() {
        return (!api.is_null()).then_some(api);
    }
    rest.resolve(api)
}
