//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use school_admin_core::ports::RecordStore;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub config: Arc<Config>,
}
