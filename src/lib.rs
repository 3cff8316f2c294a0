pub mod config;
pub mod db;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use config::{AppConfig, StoreBackend};
use db::{MemoryStore, PgStore, Store};
use errors::AppError;
use services::classifier::{Classifier, MerchantClassifier};
use services::regex_cache::RegexCache;
use services::registry::PatternRegistry;

/// Shared application state passed to all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub registry: Arc<PatternRegistry>,
    pub classifier: Arc<dyn Classifier>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Wire a state around an existing store and publish its active set.
    pub async fn with_store(
        store: Arc<dyn Store>,
        classifier: Arc<dyn Classifier>,
        config: AppConfig,
    ) -> Result<Self, AppError> {
        let cache = Arc::new(RegexCache::new(config.regex_size_limit));
        let registry = Arc::new(PatternRegistry::load(Arc::clone(&store), cache).await?);
        Ok(Self {
            store,
            registry,
            classifier,
            config: Arc::new(config),
        })
    }

    /// Memory store with the offline classifier; for tests and local tooling.
    pub async fn in_memory(config: AppConfig) -> Result<Self, AppError> {
        Self::with_store(
            Arc::new(MemoryStore::new()),
            Arc::new(MerchantClassifier::offline()),
            config,
        )
        .await
    }

    /// Build the state `config` asks for, running migrations on Postgres.
    pub async fn from_config(config: AppConfig) -> Result<Self, AppError> {
        let store: Arc<dyn Store> = match config.store_backend {
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory store; state is lost on restart");
                Arc::new(MemoryStore::new())
            }
            StoreBackend::Postgres => {
                let url = config.database_url.as_deref().ok_or_else(|| {
                    AppError::Internal("DATABASE_URL is required for the postgres backend".into())
                })?;
                let pool = db::create_pool(url, config.database_max_connections).await?;
                sqlx::migrate!("./migrations")
                    .run(&pool)
                    .await
                    .map_err(|e| AppError::Internal(format!("Migration failed: {e}")))?;
                Arc::new(PgStore::new(pool))
            }
        };

        let classifier = MerchantClassifier::from_config(&config)
            .map_err(|e| AppError::Internal(format!("Classifier setup failed: {e}")))?;
        Self::with_store(store, Arc::new(classifier), config).await
    }
}
