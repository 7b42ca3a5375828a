use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::config::Config;
use crate::services::catalog_service::QuestionCatalog;
use crate::services::progress_store::ProgressStore;
use crate::services::progression::ParticipantEngine;

pub struct AppState {
    pub config: Config,
    pub catalog: Arc<QuestionCatalog>,
    pub store: Arc<dyn ProgressStore>,
    engines: RwLock<HashMap<String, Arc<Mutex<ParticipantEngine>>>>,
}

impl AppState {
    pub fn new(config: Config, catalog: QuestionCatalog, store: Arc<dyn ProgressStore>) -> Self {
        Self {
            config,
            catalog: Arc::new(catalog),
            store,
            engines: RwLock::new(HashMap::new()),
        }
    }

    pub async fn engine(&self, participant_id: &str) -> Option<Arc<Mutex<ParticipantEngine>>> {
        self.engines.read().await.get(participant_id).cloned()
    }

    /// Registers a freshly reconstructed engine unless a concurrent open got
    /// there first; the loser is dropped and the winner returned.
    pub async fn engine_or_insert(
        &self,
        participant_id: &str,
        engine: ParticipantEngine,
    ) -> (Arc<Mutex<ParticipantEngine>>, bool) {
        let mut engines = self.engines.write().await;
        if let Some(existing) = engines.get(participant_id) {
            return (existing.clone(), false);
        }
        let engine = Arc::new(Mutex::new(engine));
        engines.insert(participant_id.to_string(), engine.clone());
        (engine, true)
    }
}

pub mod catalog_service;
pub mod gate;
pub mod handshake;
pub mod progress_store;
pub mod progression;
pub mod timer_engine;
