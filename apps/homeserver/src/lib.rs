pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod store;
pub mod sync;

use std::sync::Arc;

use config::Config;
use store::Store;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, store: Store) -> Self {
        Self {
            store: Arc::new(store),
            config: Arc::new(config),
        }
    }
}
