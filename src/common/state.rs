// Application state shared across all modules

use std::sync::Arc;

use super::config::AppConfig;
use crate::auth::service::AuthService;

/// Built once at startup and read-only afterwards
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth: Arc<AuthService>,
}

impl AppState {
    pub fn new(config: AppConfig, auth: AuthService) -> Self {
        Self {
            config: Arc::new(config),
            auth: Arc::new(auth),
        }
    }
}
