mod coverage;
mod service_info;

pub use coverage::{get_chromosomes, get_coverage};
pub use service_info::service_info;

use crate::index::CoverageIndex;
use axum::{Router, routing::get};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Coverage indexes keyed by dataset id.
    pub indexes: Arc<HashMap<String, Arc<dyn CoverageIndex>>>,
}

impl AppState {
    pub fn new(indexes: HashMap<String, Arc<dyn CoverageIndex>>) -> Self {
        Self {
            indexes: Arc::new(indexes),
        }
    }

    pub fn index(&self, id: &str) -> crate::Result<&Arc<dyn CoverageIndex>> {
        self.indexes
            .get(id)
            .ok_or_else(|| crate::Error::NotFound(id.to_string()))
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/coverage/:id", get(get_coverage))
        .route("/coverage/:id/chromosomes", get(get_chromosomes))
        .route("/", get(service_info))
        .route("/service-info", get(service_info))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
