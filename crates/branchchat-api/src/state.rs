use std::sync::Arc;

use branchchat_db::Database;
use branchchat_llm::Completer;
use branchchat_rag::Retriever;

use crate::orchestrator::Orchestrator;

pub type AppState = Arc<AppStateInner>;

/// Bearer token settings, injected once at startup.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
}

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub auth: AuthConfig,
    pub retriever: Arc<dyn Retriever>,
    pub orchestrator: Orchestrator,
}

impl AppStateInner {
    pub fn new(
        db: Arc<Database>,
        auth: AuthConfig,
        retriever: Arc<dyn Retriever>,
        completer: Arc<dyn Completer>,
    ) -> AppState {
        let orchestrator = Orchestrator::new(db.clone(), retriever.clone(), completer);
        Arc::new(Self {
            db,
            auth,
            retriever,
            orchestrator,
        })
    }
}
