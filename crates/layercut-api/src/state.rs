//! Application state.

use std::sync::Arc;

use layercut_firestore::FirestoreClient;
use layercut_matting::MattingClient;
use layercut_storage::StorageClient;
use layercut_worker::DriverConfig;

use crate::auth::JwksCache;
use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub storage: Arc<StorageClient>,
    pub firestore: Arc<FirestoreClient>,
    pub matting: Arc<MattingClient>,
    pub jwks: Arc<JwksCache>,
    pub driver_config: DriverConfig,
}

impl AppState {
    /// Create new application state.
    pub async fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let storage = StorageClient::from_env().await?;
        let firestore = FirestoreClient::from_env().await?;
        let matting = MattingClient::from_env()?;
        let jwks = JwksCache::new().await?;

        Ok(Self {
            config,
            storage: Arc::new(storage),
            firestore: Arc::new(firestore),
            matting: Arc::new(matting),
            jwks: Arc::new(jwks),
            driver_config: DriverConfig::default(),
        })
    }
}
