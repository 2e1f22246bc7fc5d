//! Interpose Proxy Engine
//!
//! This crate turns registered type descriptions into callable surrogates:
//! - **Catalog**: member collection and selection-hook filtering (`catalog` module)
//! - **Builder**: blueprint synthesis, accessor grouping, mixin slots (`builder` module)
//! - **Cache**: structural keys and shared blueprint reuse (`cache` module)
//! - **Dispatch**: interceptor chains and the proceed state machine (internal)
//! - **Engine**: request validation and surrogate assembly (`engine` module)
//! - **Persist**: externalizing surrogates and rebuilding them (`persist` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use interpose_engine::{GenerationOptions, ProxyEngine};
//! use interpose_sdk::{TypeShapeBuilder, CallValue};
//!
//! let engine = ProxyEngine::with_builtins();
//! let class = engine.model().register(
//!     TypeShapeBuilder::class("Service")
//!         .method(sig.clone(), MemberFlags::overridable())
//!         .bind(&sig, |target, call| { /* run the real member */ })
//!         .factory(|| Arc::new(Service::default())),
//! )?;
//!
//! let proxy = engine.create_class_proxy(class, GenerationOptions::new(), vec![logging])?;
//! let out = proxy.invoke("run", vec![CallValue::int(7)])?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// ============================================================================
// Modules
// ============================================================================

/// Blueprint synthesis: dispatch plans, accessor groups, mixin slots.
pub mod builder;

/// Structural cache keys and the shared blueprint cache.
pub mod cache;

/// Engine entry points: validation, cache reuse, surrogate assembly.
pub mod engine;

/// Generation-time error types.
pub mod error;

/// Surrogate externalization and reconstruction.
pub mod persist;

/// Proxy requests and generation options.
pub mod request;

/// Live surrogates: invoke, properties, events.
pub mod surrogate;

mod catalog;
mod dispatch;
mod invocation;
mod mixin;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::{
    Blueprint, DispatchOrigin, EventGroup, InterceptedMember, PropertyGroup, ReconstructionInfo,
};
pub use cache::{BlueprintCache, CacheKey};
pub use engine::{global_engine, ProxyEngine};
pub use error::{GenerationError, GenerationResult};
pub use persist::{
    externalize, reconstruct, reconstruct_with_options, InterceptorFactory,
    InterceptorFactoryRegistry, InterceptorRecord, PersistError, SurrogateRecord, RECORD_VERSION,
};
pub use request::{GenerationOptions, MixinEntry, ProxyKind, ProxyRequest};
pub use surrogate::Surrogate;

// ============================================================================
// Re-exports from the SDK
// ============================================================================

pub use interpose_sdk::{
    // Interception contract
    Interceptor, Invocation, PersistentInterceptor,
    // Selection
    AllMembers, SelectionHook,
    // Values and targets
    CallValue, TargetObject, TargetRef,
    // Errors
    CallError, CallResult,
    // Model
    TypeModel, TypeShape, TypeShapeBuilder, TypeToken,
};
