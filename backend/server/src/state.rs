use std::sync::Arc;

use tracing::{info, warn};

use super::{
    config::{Config, StoreBackend},
    database::{DocumentStore, StoreError},
    error::AppError,
    firestore::FirestoreStore,
    memory::MemoryStore,
};

pub struct AppState {
    pub config: Config,
    pub store: Option<Arc<dyn DocumentStore>>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Arc<Self>, StoreError> {
        let store = init_store(&config)?;

        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: Config, store: Option<Arc<dyn DocumentStore>>) -> Arc<Self> {
        Arc::new(Self { config, store })
    }

    pub fn store(&self) -> Result<&dyn DocumentStore, AppError> {
        self.store.as_deref().ok_or(AppError::StoreUnavailable)
    }
}

fn init_store(config: &Config) -> Result<Option<Arc<dyn DocumentStore>>, StoreError> {
    let store: Arc<dyn DocumentStore> = match (config.store_backend, &config.project_id) {
        (StoreBackend::Disabled, _) => {
            info!("Store disabled, submissions will only be logged");
            return Ok(None);
        }
        (StoreBackend::Memory, _) => Arc::new(MemoryStore::new()),
        (StoreBackend::Firestore, Some(project_id)) => {
            Arc::new(FirestoreStore::new(config, project_id)?)
        }
        (StoreBackend::Firestore, None) => {
            warn!("PROJECT_ID not set, submissions will only be logged");
            return Ok(None);
        }
    };

    info!("Using {} store", store.name());

    Ok(Some(store))
}
