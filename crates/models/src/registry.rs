//! Model resolution: dynamic store first, static catalog as fallback.
//!
//! The dynamic lookup is served from a snapshot cached for a short TTL to
//! bound staleness against administrative responsiveness. The snapshot
//! keeps disabled models, so a dynamically disabled id is rejected from
//! cache instead of silently falling back to the static table.

use std::time::{Duration, Instant};

use {async_trait::async_trait, tokio::sync::RwLock};

use crate::{ModelDescriptor, catalog};

/// How long a dynamic snapshot is served before being refetched.
pub const DYNAMIC_CACHE_TTL: Duration = Duration::from_secs(300);

// ── Store contract ───────────────────────────────────────────────────────────

/// Read access to administrator-managed model descriptors. Implemented by
/// the storage crate; a no-op implementation yields a static-only registry.
#[async_trait]
pub trait ModelConfigStore: Send + Sync {
    async fn list_models(&self) -> anyhow::Result<Vec<ModelDescriptor>>;
}

/// Store with no dynamic descriptors.
pub struct NoDynamicModels;

#[async_trait]
impl ModelConfigStore for NoDynamicModels {
    async fn list_models(&self) -> anyhow::Result<Vec<ModelDescriptor>> {
        Ok(Vec::new())
    }
}

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("unknown model: {0}")]
    NotFound(String),
    #[error("model '{0}' is disabled by the administrator")]
    Disabled(String),
}

// ── Registry ─────────────────────────────────────────────────────────────────

struct Snapshot {
    models: Vec<ModelDescriptor>,
    fetched_at: Instant,
}

/// Resolves logical model ids to descriptors.
pub struct ModelRegistry {
    store: Box<dyn ModelConfigStore>,
    cache: RwLock<Option<Snapshot>>,
    ttl: Duration,
}

impl ModelRegistry {
    pub fn new(store: Box<dyn ModelConfigStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(None),
            ttl: DYNAMIC_CACHE_TTL,
        }
    }

    /// Registry serving only the compiled catalog.
    pub fn static_only() -> Self {
        Self::new(Box::new(NoDynamicModels))
    }

    #[cfg(test)]
    fn with_ttl(store: Box<dyn ModelConfigStore>, ttl: Duration) -> Self {
        Self {
            store,
            cache: RwLock::new(None),
            ttl,
        }
    }

    /// Resolve a logical model id. Dynamic descriptors win; a dynamically
    /// disabled model is a hard [`ResolveError::Disabled`], never a
    /// fallback to the static table.
    pub async fn resolve(&self, model_id: &str) -> Result<ModelDescriptor, ResolveError> {
        self.resolve_at(model_id, Instant::now()).await
    }

    async fn resolve_at(
        &self,
        model_id: &str,
        now: Instant,
    ) -> Result<ModelDescriptor, ResolveError> {
        if let Some(dynamic) = self.dynamic_lookup(model_id, now).await {
            if !dynamic.is_enabled {
                return Err(ResolveError::Disabled(model_id.to_string()));
            }
            return Ok(dynamic);
        }
        catalog::static_model(model_id).ok_or_else(|| ResolveError::NotFound(model_id.to_string()))
    }

    /// Current enabled descriptors: the dynamic snapshot merged over the
    /// static catalog, disabled entries filtered out.
    pub async fn enabled_models(&self) -> Vec<ModelDescriptor> {
        let dynamic = self.snapshot(Instant::now()).await;
        let mut merged = dynamic.clone();
        for fallback in catalog::static_models() {
            if !dynamic.iter().any(|m| m.id == fallback.id) {
                merged.push(fallback);
            }
        }
        merged.retain(|m| m.is_enabled);
        merged
    }

    /// Drop the cached snapshot so the next resolve refetches. Called after
    /// administrative writes so changes apply without waiting out the TTL.
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    async fn dynamic_lookup(&self, model_id: &str, now: Instant) -> Option<ModelDescriptor> {
        self.snapshot(now)
            .await
            .into_iter()
            .find(|m| m.id == model_id)
    }

    async fn snapshot(&self, now: Instant) -> Vec<ModelDescriptor> {
        {
            let cache = self.cache.read().await;
            if let Some(snap) = cache.as_ref()
                && now.duration_since(snap.fetched_at) < self.ttl
            {
                return snap.models.clone();
            }
        }

        // Fetch outside the read lock; last writer wins under contention,
        // which is fine for idempotent snapshots.
        match self.store.list_models().await {
            Ok(models) => {
                let mut cache = self.cache.write().await;
                *cache = Some(Snapshot {
                    models: models.clone(),
                    fetched_at: now,
                });
                models
            },
            Err(e) => {
                tracing::warn!("dynamic model store unavailable: {e}, serving static catalog");
                // Keep serving a stale snapshot if one exists.
                let cache = self.cache.read().await;
                cache.as_ref().map(|s| s.models.clone()).unwrap_or_default()
            },
        }
    }
}
