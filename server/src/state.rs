use std::sync::Arc;

use crate::config::{Config, StoreKind};
use crate::services::{BoxOffice, ReceptionEvaluator, SystemClock};
use crate::store::{MemoryStore, PgStore, TheaterStore};
use crate::utils::AppResult;

#[derive(Clone)]
pub struct AppState {
    pub box_office: BoxOffice,
}

impl AppState {
    pub fn new(box_office: BoxOffice) -> Self {
        Self { box_office }
    }

    /// Wires the configured store with the system clock.
    pub async fn from_config(config: &Config) -> AppResult<Self> {
        let store: Arc<dyn TheaterStore> = match config.store {
            StoreKind::Postgres => {
                let store = PgStore::connect(config).await?;
                store.migrate().await?;
                Arc::new(store)
            }
            StoreKind::Memory => {
                tracing::warn!("Using in-memory store; data is lost on restart");
                Arc::new(MemoryStore::new())
            }
        };

        Ok(Self::new(BoxOffice::new(
            store,
            Arc::new(SystemClock),
            ReceptionEvaluator::new(config.timezone),
        )))
    }
}
