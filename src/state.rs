use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::middleware::RateLimiter;
use crate::services::analysis::AnalysisService;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    /// Sole source of truth; handlers write through before reflecting state.
    pub store: Store,
    pub analysis: Arc<AnalysisService>,
    pub session_key: Vec<u8>,
    pub login_limiter: RateLimiter,
    /// Companies with an analysis call in flight.
    pub loading_analyses: Arc<RwLock<HashSet<String>>>,
}

pub type SharedState = Arc<AppState>;
