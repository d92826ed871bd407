//! Catalog service: lazily built, process-wide cached catalog snapshot.
//!
//! The cache has no build lock. Concurrent first accesses may each introspect
//! the schema and a forced rebuild racing with readers may hand a stale
//! snapshot to in-flight callers. The identifier gate still protects every
//! compiled statement, so a stale catalog can only produce a rejected request.

use async_trait::async_trait;
use std::sync::{Arc, RwLock};

use crate::catalog::SchemaCatalog;
use crate::error::CatalogError;

/// Where catalog metadata comes from.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Introspect the live schema into a fresh catalog.
    async fn load(&self) -> Result<SchemaCatalog, CatalogError>;
}

/// A source that always returns the same catalog. Used by tests and by
/// deployments that pin the schema.
#[derive(Debug, Clone)]
pub struct StaticCatalogSource {
    catalog: SchemaCatalog,
}

impl StaticCatalogSource {
    pub fn new(catalog: SchemaCatalog) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl CatalogSource for StaticCatalogSource {
    async fn load(&self) -> Result<SchemaCatalog, CatalogError> {
        Ok(self.catalog.clone())
    }
}

/// Cached catalog with explicit `get` / `force_refresh`.
pub struct CatalogService {
    source: Arc<dyn CatalogSource>,
    cached: RwLock<Option<Arc<SchemaCatalog>>>,
}

impl CatalogService {
    pub fn new(source: Arc<dyn CatalogSource>) -> Self {
        Self {
            source,
            cached: RwLock::new(None),
        }
    }

    /// Service over a fixed catalog.
    pub fn fixed(catalog: SchemaCatalog) -> Self {
        Self::new(Arc::new(StaticCatalogSource::new(catalog)))
    }

    /// Current snapshot, building it on first access.
    pub async fn get(&self) -> Result<Arc<SchemaCatalog>, CatalogError> {
        if let Some(catalog) = self.cached() {
            return Ok(catalog);
        }
        self.force_refresh().await
    }

    /// Rebuild from the source and replace the cached snapshot.
    ///
    /// On failure the previous snapshot stays in place.
    pub async fn force_refresh(&self) -> Result<Arc<SchemaCatalog>, CatalogError> {
        let catalog = Arc::new(self.source.load().await?);
        let summary = catalog.summary();
        tracing::info!(
            tables = summary.table_count,
            columns = summary.column_count,
            tenant_scoped = summary.tenant_scoped_table_count,
            aliases = summary.alias_count,
            "Schema catalog rebuilt"
        );

        let mut guard = self.cached.write().unwrap_or_else(|err| err.into_inner());
        *guard = Some(Arc::clone(&catalog));
        Ok(catalog)
    }

    /// Cached snapshot without triggering a build.
    pub fn cached(&self) -> Option<Arc<SchemaCatalog>> {
        self.cached
            .read()
            .unwrap_or_else(|err| err.into_inner())
            .clone()
    }
}
