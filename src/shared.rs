use std::sync::Arc;
use thiserror::Error;

use crate::config::{ConfigError, ConnectionConfig};
use crate::hub::Hub;
use crate::state::{AppStateBackend, DashboardBackend};
use crate::websockets::Filter;

/// Shared application state handed to every route
#[derive(Clone)]
pub struct AppState {
    pub dashboard: Arc<Filter<DashboardBackend>>,
    pub apps: Arc<Filter<AppStateBackend>>,
    pub connection: ConnectionConfig,
}

impl AppState {
    pub fn new(app_backend: AppStateBackend, connection: ConnectionConfig) -> Self {
        let dashboard_hub = Arc::new(Hub::new("dashboard", DashboardBackend));
        let app_hub = Arc::new(Hub::new("app", app_backend));
        Self {
            dashboard: Arc::new(Filter::new(dashboard_hub)),
            apps: Arc::new(Filter::new(app_hub)),
            connection,
        }
    }
}

/// Startup failures, reported by `main`
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
pub mod test_utils {
    use super::*;

    /// Builder for creating AppState with overrides for testing
    pub struct AppStateBuilder {
        backend: Option<AppStateBackend>,
        connection: ConnectionConfig,
    }

    impl AppStateBuilder {
        pub fn new() -> Self {
            Self {
                backend: None,
                connection: ConnectionConfig::default(),
            }
        }

        pub fn with_backend(mut self, backend: AppStateBackend) -> Self {
            self.backend = Some(backend);
            self
        }

        pub fn with_connection(mut self, connection: ConnectionConfig) -> Self {
            self.connection = connection;
            self
        }

        pub fn build(self) -> AppState {
            AppState::new(
                self.backend.unwrap_or_else(AppStateBackend::in_memory),
                self.connection,
            )
        }
    }

    impl Default for AppStateBuilder {
        fn default() -> Self {
            Self::new()
        }
    }
}
