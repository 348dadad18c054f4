//! HTTP API for the fracture follow-up assistant

mod assets;
mod handlers;
mod sse;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::runtime::ProductionManager;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<ProductionManager>,
}

impl AppState {
    pub fn new(sessions: ProductionManager) -> Self {
        Self {
            sessions: Arc::new(sessions),
        }
    }
}
