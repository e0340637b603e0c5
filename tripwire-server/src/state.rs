//! Application state shared across all request handlers.

use tripwire_core::dispatcher::Dispatcher;

/// Shared handler state; cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// The engine behind every route.
    pub engine: Dispatcher,
}

impl AppState {
    pub fn new(engine: Dispatcher) -> Self {
        Self { engine }
    }
}
