//! Frame dispatcher.

use std::sync::Arc;

use cue_core::{locate, HostGraph, InvokeError, ModulePath, Normalizer, Notifier};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::errors::DispatchError;
use crate::intercepts::{self, Intercept, READ_VARIABLE};
use crate::protocol::{parse_frame, parse_index, InboundMessage, InboundRequest, OutboundResponse};
use crate::registry::{CapabilityRegistry, Invocation, Registered, Reply};

/// Operator warning for a legacy frame whose index does not parse.
pub const INVALID_SOUNDSCAPE_INDEX: &str = "Invalid soundscape index received.";

/// Capability invoked by legacy `{index}` frames with `[index, true]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LegacyTarget {
    pub module: String,
    pub method: String,
}

impl LegacyTarget {
    pub fn new(module: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            method: method.into(),
        }
    }
}

impl Default for LegacyTarget {
    fn default() -> Self {
        Self::new("game.soundscape", "setSoundscape")
    }
}

/// Turns inbound frames into host calls. Cheap to clone; every collaborator is shared.
#[derive(Clone)]
pub struct Dispatcher {
    graph: Arc<dyn HostGraph>,
    notifier: Arc<dyn Notifier>,
    registry: Arc<CapabilityRegistry>,
    normalizer: Arc<Normalizer>,
    legacy: Option<LegacyTarget>,
}

impl Dispatcher {
    pub fn new(
        graph: Arc<dyn HostGraph>,
        notifier: Arc<dyn Notifier>,
        registry: Arc<CapabilityRegistry>,
        normalizer: Arc<Normalizer>,
    ) -> Self {
        Self {
            graph,
            notifier,
            registry,
            normalizer,
            legacy: Some(LegacyTarget::default()),
        }
    }

    /// Replace (or with `None`, disable) the legacy index target.
    #[must_use]
    pub fn with_legacy(mut self, legacy: Option<LegacyTarget>) -> Self {
        self.legacy = legacy;
        self
    }

    /// Handle one text frame. Errors are logged here and never escape.
    pub async fn dispatch(&self, frame: &str) -> Option<OutboundResponse> {
        match self.try_dispatch(frame).await {
            Ok(response) => response,
            Err(e) => {
                log_dropped(&e);
                None
            }
        }
    }

    pub async fn try_dispatch(&self, frame: &str) -> Result<Option<OutboundResponse>, DispatchError> {
        match parse_frame(frame)? {
            InboundMessage::Request(request) => self.dispatch_request(request).await,
            InboundMessage::LegacyIndex(raw) => self.dispatch_legacy(&raw).await,
        }
    }

    /// Resolve, intercept, normalize, invoke.
    pub async fn dispatch_request(
        &self,
        request: InboundRequest,
    ) -> Result<Option<OutboundResponse>, DispatchError> {
        if request.module.trim().is_empty() {
            return Err(DispatchError::Invalid("missing module".into()));
        }
        if request.method.trim().is_empty() {
            return Err(DispatchError::Invalid("missing method".into()));
        }
        let path = ModulePath::parse(&request.module)
            .map_err(|e| DispatchError::Invalid(format!("{}: {e}", request.module)))?;
        if path.is_empty() {
            return Err(DispatchError::Invalid("empty module path".into()));
        }
        let module = path.to_string();
        let request_id = request.echo_id();
        debug!(module = %module, method = %request.method, request_id = %request_id, "dispatching");

        let root = self.graph.snapshot();

        if request.method == READ_VARIABLE {
            let value = self.read_variable(&path, &root).await?;
            let value = self.normalizer.normalize_result(READ_VARIABLE, &module, value);
            return Ok(Some(OutboundResponse::DataResponse { value, request_id }));
        }

        let target = locate(&root, &path)
            .ok_or_else(|| DispatchError::Unresolved {
                module: module.clone(),
            })?
            .clone();
        let args = request.args.unwrap_or_default();

        match Intercept::for_method(&request.method) {
            Some(Intercept::SoundscapeValue) => {
                let value = intercepts::soundscape_value(&target, &args);
                return Ok(Some(OutboundResponse::SoundscapeData { value, request_id }));
            }
            Some(Intercept::MasterVolume) => {
                let volume = intercepts::master_volume(&self.normalizer, &module, &target);
                return Ok(Some(OutboundResponse::MasterVolumeUpdate { volume, request_id }));
            }
            None => {}
        }

        let entry = self
            .registry
            .lookup(&request.method, &module)
            .ok_or_else(|| DispatchError::NotCallable {
                module: module.clone(),
                method: request.method.clone(),
            })?;

        let mut args = args;
        self.normalizer.normalize_args(&request.method, &module, &mut args);

        let reply = entry.spec.reply;
        let method = request.method;
        let result = invoke(&entry, path, method.clone(), target, args).await?;

        match reply {
            Reply::Data => {
                let value = self.normalizer.normalize_result(&method, &module, result);
                Ok(Some(OutboundResponse::DataResponse { value, request_id }))
            }
            Reply::None => Ok(None),
        }
    }

    /// Value behind `path`: a zero-argument getter registered as
    /// `(parent, leaf)` when present, else the resolved value itself.
    async fn read_variable(&self, path: &ModulePath, root: &Value) -> Result<Value, DispatchError> {
        if let (Some(parent), Some(leaf)) = (path.parent(), path.leaf()) {
            let parent_key = parent.to_string();
            let getter = self
                .registry
                .lookup(leaf, &parent_key)
                .filter(|entry| entry.spec.min_args == 0);
            if let Some(entry) = getter {
                let target = locate(root, &parent)
                    .ok_or(DispatchError::Unresolved { module: parent_key })?
                    .clone();
                return invoke(&entry, parent, leaf.to_string(), target, Vec::new()).await;
            }
        }
        locate(root, path)
            .cloned()
            .ok_or_else(|| DispatchError::Unresolved {
                module: path.to_string(),
            })
    }

    async fn dispatch_legacy(&self, raw: &Value) -> Result<Option<OutboundResponse>, DispatchError> {
        let Some(target) = &self.legacy else {
            debug!(index = %raw, "legacy index frames disabled");
            return Ok(None);
        };
        let Some(index) = parse_index(raw) else {
            self.notifier.warn(INVALID_SOUNDSCAPE_INDEX);
            return Err(DispatchError::Invalid(format!("legacy index {raw}")));
        };
        let request = InboundRequest::new(
            target.module.clone(),
            target.method.clone(),
            vec![Value::from(index), Value::Bool(true)],
        );
        self.dispatch_request(request).await?;
        Ok(None)
    }
}

async fn invoke(
    entry: &Registered,
    module: ModulePath,
    method: String,
    target: Value,
    args: Vec<Value>,
) -> Result<Value, DispatchError> {
    if args.len() < entry.spec.min_args {
        return Err(DispatchError::Invocation {
            module: module.to_string(),
            method,
            source: InvokeError::InvalidArguments(format!(
                "expected at least {} arguments, got {}",
                entry.spec.min_args,
                args.len()
            )),
        });
    }
    let call = Invocation {
        module: module.clone(),
        method: method.clone(),
        target,
        args,
    };
    entry
        .handler
        .invoke(call)
        .await
        .map_err(|source| DispatchError::Invocation {
            module: module.to_string(),
            method,
            source,
        })
}

fn log_dropped(e: &DispatchError) {
    match e {
        DispatchError::Invocation { module, method, source } => error!(
            module = %module,
            method = %method,
            error_kind = e.error_kind(),
            cause = source.error_kind(),
            error = %e,
            "invocation failed, frame dropped"
        ),
        _ => warn!(error_kind = e.error_kind(), error = %e, "frame dropped"),
    }
}
