//! Externalizing surrogates and rebuilding them in another process.
//!
//! A [`SurrogateRecord`] captures everything needed to recreate a surrogate:
//! proxying mode, type names, interceptor states, and (for target-backed
//! proxies) the target's codec-captured state. Reconstruction re-enters the
//! normal creation path, so rebuilt surrogates share cached blueprints with
//! everything else in the engine.
//!
//! Interceptors participate through
//! [`PersistentInterceptor`](interpose_sdk::PersistentInterceptor): each one
//! names a factory key and saves its state as JSON, and a matching factory
//! must be registered in an [`InterceptorFactoryRegistry`] on the rebuilding
//! side. Surrogates with mixins cannot be externalized; mixin instances are
//! caller-owned wiring with no state contract.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use interpose_sdk::{Interceptor, TargetRef};

use crate::engine::ProxyEngine;
use crate::error::GenerationError;
use crate::request::{GenerationOptions, ProxyKind, ProxyRequest};
use crate::surrogate::Surrogate;

/// Format version written into every record.
pub const RECORD_VERSION: u32 = 1;

// ============================================================================
// Records
// ============================================================================

/// Saved state of one interceptor in the chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterceptorRecord {
    /// Factory key the rebuilding side resolves.
    pub factory: String,
    /// Interceptor state, opaque to the engine.
    pub state: serde_json::Value,
}

/// A surrogate flattened to data.
///
/// Records are plain serde types; [`SurrogateRecord::to_json`] and
/// [`SurrogateRecord::from_json`] are conveniences over `serde_json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurrogateRecord {
    /// Record format version. Checked on reconstruction.
    pub format_version: u32,
    /// Proxying mode of the original surrogate.
    pub kind: ProxyKind,
    /// Name of the proxied class or interface.
    pub target_type: String,
    /// Names of the grafted interfaces.
    pub interfaces: Vec<String>,
    /// Whether target state was captured through the type's codec.
    pub delegate_to_base: bool,
    /// Interceptor chain, in order.
    pub interceptors: Vec<InterceptorRecord>,
    /// Codec-captured target state, present when `delegate_to_base`.
    pub target_state: Option<serde_json::Value>,
}

impl SurrogateRecord {
    /// Serializes the record to a JSON string.
    pub fn to_json(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a record from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, PersistError> {
        Ok(serde_json::from_str(json)?)
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Failures while externalizing or reconstructing a surrogate.
#[derive(Debug, Error)]
pub enum PersistError {
    /// The record was written by an incompatible format version.
    #[error("record format version {found} is not supported (expected {expected})")]
    Version {
        /// Version found in the record.
        found: u32,
        /// Version this build understands.
        expected: u32,
    },
    /// The surrogate's blueprint offers no reconstruction path.
    #[error("surrogate cannot be externalized: its type offers no reconstruction path")]
    NotReconstructible,
    /// Mixin-bearing surrogates cannot be externalized.
    #[error("surrogates with mixins cannot be externalized")]
    MixinsNotSupported,
    /// An interceptor in the chain does not implement persistence.
    #[error("interceptor at position {index} does not support persistence")]
    InterceptorNotPersistent {
        /// Zero-based chain position.
        index: usize,
    },
    /// No factory registered under the recorded key.
    #[error("no interceptor factory registered under '{name}'")]
    UnknownFactory {
        /// The unresolved factory key.
        name: String,
    },
    /// A factory rejected its saved state.
    #[error("interceptor factory '{name}' failed: {message}")]
    Factory {
        /// Factory key.
        name: String,
        /// Factory-reported reason.
        message: String,
    },
    /// A recorded type name is absent from the rebuilding model.
    #[error("type '{name}' is not registered in the engine's model")]
    UnknownType {
        /// The unresolved type name.
        name: String,
    },
    /// The record should carry target state but does not.
    #[error("target state is required but missing")]
    MissingTargetState,
    /// The type's codec rejected the state it was given.
    #[error("target state codec failed: {message}")]
    Codec {
        /// Codec-reported reason.
        message: String,
    },
    /// Reconstruction reached the engine and the request was rejected there.
    #[error(transparent)]
    Generation(#[from] GenerationError),
    /// Record serialization failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Factory registry
// ============================================================================

/// Rebuilds one interceptor from its saved state.
pub type InterceptorFactory =
    Arc<dyn Fn(&serde_json::Value) -> Result<Arc<dyn Interceptor>, String> + Send + Sync>;

/// Registry of interceptor factories, keyed by
/// [`PersistentInterceptor::factory_key`](interpose_sdk::PersistentInterceptor::factory_key).
#[derive(Default)]
pub struct InterceptorFactoryRegistry {
    factories: DashMap<String, InterceptorFactory>,
}

impl InterceptorFactoryRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory. Re-registering a key replaces the old factory.
    pub fn register<F>(&self, key: impl Into<String>, factory: F)
    where
        F: Fn(&serde_json::Value) -> Result<Arc<dyn Interceptor>, String> + Send + Sync + 'static,
    {
        let key = key.into();
        if self.factories.insert(key.clone(), Arc::new(factory)).is_some() {
            warn!(key = %key, "interceptor factory replaced");
        }
    }

    /// Looks up a factory by key.
    pub fn get(&self, key: &str) -> Option<InterceptorFactory> {
        self.factories.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Whether a factory is registered under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    /// Number of registered factories.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// True when no factories are registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for InterceptorFactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorFactoryRegistry")
            .field("factories", &self.factories.len())
            .finish()
    }
}

// ============================================================================
// Externalize / reconstruct
// ============================================================================

/// Flattens a surrogate to a [`SurrogateRecord`].
///
/// Requires a reconstructible blueprint, no mixins, and a fully persistent
/// interceptor chain.
pub fn externalize(surrogate: &Surrogate) -> Result<SurrogateRecord, PersistError> {
    let blueprint = surrogate.blueprint();
    let model = surrogate.model();

    let reconstruction = blueprint
        .reconstruction
        .as_ref()
        .ok_or(PersistError::NotReconstructible)?;
    if !blueprint.mixin_slots.is_empty() {
        return Err(PersistError::MixinsNotSupported);
    }

    let mut interceptors = Vec::with_capacity(surrogate.chain().len());
    for (index, interceptor) in surrogate.chain().iter().enumerate() {
        let persistent = interceptor
            .as_persistent()
            .ok_or(PersistError::InterceptorNotPersistent { index })?;
        interceptors.push(InterceptorRecord {
            factory: persistent.factory_key().to_string(),
            state: persistent.save_state(),
        });
    }

    let target_state = if reconstruction.delegate_to_base {
        let target = surrogate.target().ok_or(PersistError::MissingTargetState)?;
        let shape = model
            .get(blueprint.target_type)
            .ok_or_else(|| PersistError::UnknownType {
                name: model.name_of(blueprint.target_type),
            })?;
        let codec = shape.codec().ok_or(PersistError::NotReconstructible)?;
        let state = (codec.save)(target.instance.as_ref())
            .map_err(|message| PersistError::Codec { message })?;
        Some(state)
    } else {
        None
    };

    Ok(SurrogateRecord {
        format_version: RECORD_VERSION,
        kind: surrogate.kind(),
        target_type: model.name_of(blueprint.target_type),
        interfaces: blueprint
            .additional_interfaces
            .iter()
            .map(|&token| model.name_of(token))
            .collect(),
        delegate_to_base: reconstruction.delegate_to_base,
        interceptors,
        target_state,
    })
}

/// Rebuilds a surrogate from a record with stock generation options.
pub fn reconstruct(
    record: &SurrogateRecord,
    engine: &ProxyEngine,
    registry: &InterceptorFactoryRegistry,
) -> Result<Surrogate, PersistError> {
    reconstruct_with_options(record, engine, registry, GenerationOptions::new())
}

/// Rebuilds a surrogate from a record.
///
/// Records do not carry selection hooks; a caller that built the original
/// surrogate with a custom hook must supply the same hook here to get the
/// same member surface back.
pub fn reconstruct_with_options(
    record: &SurrogateRecord,
    engine: &ProxyEngine,
    registry: &InterceptorFactoryRegistry,
    options: GenerationOptions,
) -> Result<Surrogate, PersistError> {
    if record.format_version != RECORD_VERSION {
        return Err(PersistError::Version {
            found: record.format_version,
            expected: RECORD_VERSION,
        });
    }

    let model = engine.model();
    let target_type = model
        .by_name(&record.target_type)
        .ok_or_else(|| PersistError::UnknownType {
            name: record.target_type.clone(),
        })?;

    let mut request = match record.kind {
        ProxyKind::ClassWithTarget => ProxyRequest::class_with_target(target_type),
        ProxyKind::InterfaceWithTarget => ProxyRequest::interface_with_target(target_type),
        ProxyKind::InterfaceWithoutTarget => ProxyRequest::interface_without_target(target_type),
    }
    .with_options(options);
    for name in &record.interfaces {
        let token = model.by_name(name).ok_or_else(|| PersistError::UnknownType {
            name: name.clone(),
        })?;
        request = request.with_interface(token);
    }

    let mut interceptors: Vec<Arc<dyn Interceptor>> =
        Vec::with_capacity(record.interceptors.len());
    for entry in &record.interceptors {
        let factory = registry
            .get(&entry.factory)
            .ok_or_else(|| PersistError::UnknownFactory {
                name: entry.factory.clone(),
            })?;
        let rebuilt = factory(&entry.state).map_err(|message| PersistError::Factory {
            name: entry.factory.clone(),
            message,
        })?;
        interceptors.push(rebuilt);
    }

    let target = if record.delegate_to_base {
        let state = record
            .target_state
            .as_ref()
            .ok_or(PersistError::MissingTargetState)?;
        let shape = model.get(target_type).ok_or_else(|| PersistError::UnknownType {
            name: record.target_type.clone(),
        })?;
        let codec = shape.codec().ok_or(PersistError::NotReconstructible)?;
        let instance =
            (codec.load)(state).map_err(|message| PersistError::Codec { message })?;
        Some(TargetRef::from_shared(instance, target_type))
    } else {
        None
    };

    Ok(engine.create_proxy(&request, target, interceptors)?)
}
