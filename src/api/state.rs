use std::sync::Arc;

use crate::relay::{CancellationRegistry, StreamRelay};

/// Application state shared across all API handlers
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<StreamRelay>,
    pub registry: Arc<CancellationRegistry>,
}

impl AppState {
    pub fn new(relay: Arc<StreamRelay>) -> Self {
        let registry = relay.registry().clone();
        Self { relay, registry }
    }
}
