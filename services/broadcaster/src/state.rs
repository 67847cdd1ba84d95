use crate::registry::ConnectionRegistry;
use crate::source::EventSource;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn EventSource>,
    pub registry: ConnectionRegistry,
    /// Size of the bootstrap / REST window.
    pub bootstrap_window: usize,
}

impl AppState {
    pub fn new(
        source: Arc<dyn EventSource>,
        registry: ConnectionRegistry,
        bootstrap_window: usize,
    ) -> Self {
        Self {
            source,
            registry,
            bootstrap_window,
        }
    }
}
