//! Engine entry points: request validation, blueprint reuse, surrogate assembly.
//!
//! [`ProxyEngine`] owns one [`TypeModel`] and one [`BlueprintCache`]. Every
//! proxy created through the same engine shares blueprints whenever the
//! structural cache key matches, so per-instance cost stays at wiring a
//! target and an interceptor chain.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use tracing::debug;

use interpose_sdk::{Interceptor, TargetRef, TypeKind, TypeModel, TypeToken};

use crate::builder;
use crate::cache::{BlueprintCache, CacheKey};
use crate::catalog;
use crate::error::{GenerationError, GenerationResult};
use crate::request::{GenerationOptions, ProxyKind, ProxyRequest};
use crate::surrogate::Surrogate;

// ============================================================================
// Engine
// ============================================================================

/// Creates surrogates over a shared type model and blueprint cache.
pub struct ProxyEngine {
    model: Arc<TypeModel>,
    cache: BlueprintCache,
}

impl ProxyEngine {
    /// Creates an engine over an existing model.
    pub fn new(model: Arc<TypeModel>) -> Self {
        Self {
            model,
            cache: BlueprintCache::new(),
        }
    }

    /// Creates an engine over a fresh model seeded with the builtin types.
    pub fn with_builtins() -> Self {
        Self::new(Arc::new(TypeModel::with_builtins()))
    }

    /// The type model this engine resolves against.
    pub fn model(&self) -> &Arc<TypeModel> {
        &self.model
    }

    /// The blueprint cache backing this engine.
    pub fn cache(&self) -> &BlueprintCache {
        &self.cache
    }

    // ------------------------------------------------------------------
    // Creation entry points
    // ------------------------------------------------------------------

    /// Proxies a class, constructing the target through its registered
    /// default factory.
    pub fn create_class_proxy(
        &self,
        class: TypeToken,
        options: GenerationOptions,
        interceptors: Vec<Arc<dyn Interceptor>>,
    ) -> GenerationResult<Surrogate> {
        let shape = catalog::expect_shape(&self.model, class)?;
        let factory = shape
            .default_factory()
            .ok_or_else(|| GenerationError::NoDefaultFactory {
                name: shape.name.clone(),
            })?;
        let target = TargetRef::from_shared(factory(), class);
        let request = ProxyRequest::class_with_target(class).with_options(options);
        self.create_proxy(&request, Some(target), interceptors)
    }

    /// Proxies a class around a caller-supplied instance.
    pub fn create_class_proxy_with_target(
        &self,
        class: TypeToken,
        target: TargetRef,
        options: GenerationOptions,
        interceptors: Vec<Arc<dyn Interceptor>>,
    ) -> GenerationResult<Surrogate> {
        let request = ProxyRequest::class_with_target(class).with_options(options);
        self.create_proxy(&request, Some(target), interceptors)
    }

    /// Proxies an interface, forwarding to a caller-supplied implementation.
    pub fn create_interface_proxy_with_target(
        &self,
        interface: TypeToken,
        target: TargetRef,
        options: GenerationOptions,
        interceptors: Vec<Arc<dyn Interceptor>>,
    ) -> GenerationResult<Surrogate> {
        let request = ProxyRequest::interface_with_target(interface).with_options(options);
        self.create_proxy(&request, Some(target), interceptors)
    }

    /// Proxies an interface with no backing implementation; interceptors
    /// supply every result.
    pub fn create_interface_proxy_without_target(
        &self,
        interface: TypeToken,
        options: GenerationOptions,
        interceptors: Vec<Arc<dyn Interceptor>>,
    ) -> GenerationResult<Surrogate> {
        let request = ProxyRequest::interface_without_target(interface).with_options(options);
        self.create_proxy(&request, None, interceptors)
    }

    /// Creates a surrogate for an arbitrary request. The convenience
    /// constructors above all land here.
    pub fn create_proxy(
        &self,
        request: &ProxyRequest,
        target: Option<TargetRef>,
        interceptors: Vec<Arc<dyn Interceptor>>,
    ) -> GenerationResult<Surrogate> {
        self.validate_request(request, target.as_ref())?;

        let key = CacheKey::for_request(&self.model, request)?;
        let blueprint = self.cache.get_or_create(key, || {
            let members = catalog::collect_members(&self.model, request)?;
            builder::build(&self.model, request, members)
        })?;

        debug!(
            kind = %request.kind,
            target_type = %self.model.name_of(request.target_type),
            members = blueprint.member_count(),
            interceptors = interceptors.len(),
            "surrogate assembled"
        );

        Surrogate::assemble(
            Arc::clone(&self.model),
            blueprint,
            target,
            interceptors,
            &request.options.mixins,
        )
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    /// Rejects malformed requests before any cache or synthesis work.
    fn validate_request(
        &self,
        request: &ProxyRequest,
        target: Option<&TargetRef>,
    ) -> GenerationResult<()> {
        let primary = catalog::expect_shape(&self.model, request.target_type)?;
        match request.kind {
            ProxyKind::ClassWithTarget => {
                if primary.kind != TypeKind::Class {
                    return Err(GenerationError::ClassRequired {
                        name: primary.name.clone(),
                    });
                }
            }
            ProxyKind::InterfaceWithTarget | ProxyKind::InterfaceWithoutTarget => {
                if primary.kind != TypeKind::Interface {
                    return Err(GenerationError::InterfaceRequired {
                        name: primary.name.clone(),
                    });
                }
            }
        }

        for &token in &request.additional_interfaces {
            let shape = catalog::expect_shape(&self.model, token)?;
            if shape.kind != TypeKind::Interface {
                return Err(GenerationError::InterfaceRequired {
                    name: shape.name.clone(),
                });
            }
        }
        for entry in &request.options.mixins {
            let shape = catalog::expect_shape(&self.model, entry.interface)?;
            if shape.kind != TypeKind::Interface {
                return Err(GenerationError::InterfaceRequired {
                    name: shape.name.clone(),
                });
            }
        }

        match (request.kind.has_target(), target) {
            (true, None) => {
                return Err(GenerationError::TargetRequired {
                    kind: request.kind.as_str(),
                })
            }
            (false, Some(_)) => {
                return Err(GenerationError::TargetNotExpected {
                    kind: request.kind.as_str(),
                })
            }
            _ => {}
        }

        // Assignability against the primary type only; grafted interfaces
        // fall back to call-time dispatch and may legitimately miss.
        if let Some(target) = target {
            if !self.model.is_subtype(target.type_token, request.target_type) {
                return Err(GenerationError::TargetNotAssignable {
                    target: self.model.name_of(target.type_token),
                    expected: primary.name.clone(),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ProxyEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyEngine")
            .field("types", &self.model.len())
            .field("cached_blueprints", &self.cache.len())
            .finish()
    }
}

// ============================================================================
// Process-wide engine
// ============================================================================

static GLOBAL_ENGINE: Lazy<ProxyEngine> = Lazy::new(ProxyEngine::with_builtins);

/// A process-wide engine over a builtin-seeded model, for callers that do
/// not manage their own.
pub fn global_engine() -> &'static ProxyEngine {
    &GLOBAL_ENGINE
}
