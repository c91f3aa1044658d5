//! Shared state handed to every handler.

use ridehail_core::dispatcher::Dispatcher;
use std::sync::Arc;

/// Application state.
///
/// Cloned per request; the dispatcher (and the store and bus it holds) is
/// shared.
#[derive(Clone)]
pub struct AppState {
    /// Matches riders to drivers.
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    /// Wrap a dispatcher.
    #[must_use]
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }
}
