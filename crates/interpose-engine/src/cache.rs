//! The blueprint cache: one synthesis per structural request shape.
//!
//! Requests that differ only in wiring (target instance, mixin instances,
//! interceptor chain) share a blueprint. The cache key captures everything
//! structural: proxy kind, target type, the grafted interface set, the
//! selection hook's fingerprint, and the mixin interface set. Interface
//! order does not matter; the key canonicalizes both lists.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use interpose_sdk::{TypeModel, TypeToken};

use crate::builder::Blueprint;
use crate::catalog::expect_shape;
use crate::error::{GenerationError, GenerationResult};
use crate::request::{ProxyKind, ProxyRequest};

/// Canonical structural identity of a proxy request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    kind: ProxyKind,
    target: TypeToken,
    interfaces: Vec<TypeToken>,
    hook_fingerprint: u64,
    mixin_interfaces: Vec<TypeToken>,
}

impl CacheKey {
    /// Derives the canonical key for a request.
    ///
    /// This is the synthesis boundary, so open generic definitions anywhere
    /// in the request are rejected here, before any synthesis work starts.
    pub fn for_request(model: &TypeModel, request: &ProxyRequest) -> GenerationResult<Self> {
        let mut structural = vec![request.target_type];
        structural.extend(&request.additional_interfaces);
        structural.extend(request.options.mixins.iter().map(|mixin| mixin.interface));
        for token in structural {
            let shape = expect_shape(model, token)?;
            if shape.is_open_generic() {
                return Err(GenerationError::OpenGenericTarget {
                    name: shape.name.clone(),
                });
            }
        }

        Ok(Self {
            kind: request.kind,
            target: request.target_type,
            interfaces: canonical(&request.additional_interfaces),
            hook_fingerprint: request.options.hook.fingerprint(),
            mixin_interfaces: canonical(
                &request
                    .options
                    .mixins
                    .iter()
                    .map(|mixin| mixin.interface)
                    .collect::<Vec<_>>(),
            ),
        })
    }
}

fn canonical(tokens: &[TypeToken]) -> Vec<TypeToken> {
    let mut sorted = tokens.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted
}

/// Concurrent blueprint store with single-writer synthesis.
pub struct BlueprintCache {
    entries: RwLock<FxHashMap<CacheKey, Arc<Blueprint>>>,
    syntheses: AtomicUsize,
}

impl BlueprintCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(FxHashMap::default()),
            syntheses: AtomicUsize::new(0),
        }
    }

    /// Returns the blueprint for `key`, synthesizing it at most once.
    ///
    /// Readers proceed concurrently. On a miss the caller that wins the
    /// writer lock re-checks, synthesizes, and publishes; latecomers for
    /// the same key block until the entry is visible and then share it.
    /// A failed synthesis publishes nothing, so a later corrected request
    /// with the same key starts clean.
    pub fn get_or_create<F>(&self, key: CacheKey, synthesize: F) -> GenerationResult<Arc<Blueprint>>
    where
        F: FnOnce() -> GenerationResult<Blueprint>,
    {
        if let Some(blueprint) = self.entries.read().get(&key) {
            return Ok(Arc::clone(blueprint));
        }

        let mut entries = self.entries.write();
        if let Some(blueprint) = entries.get(&key) {
            return Ok(Arc::clone(blueprint));
        }

        let blueprint = Arc::new(synthesize()?);
        self.syntheses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            members = blueprint.member_count(),
            syntheses = self.synthesis_count(),
            "synthesized proxy blueprint"
        );
        entries.insert(key, Arc::clone(&blueprint));
        Ok(blueprint)
    }

    /// Number of successful syntheses since construction.
    pub fn synthesis_count(&self) -> usize {
        self.syntheses.load(Ordering::Relaxed)
    }

    /// Number of cached blueprints.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True when nothing has been synthesized yet.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for BlueprintCache {
    fn default() -> Self {
        Self::new()
    }
}
