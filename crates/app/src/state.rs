use std::sync::Arc;

use murmur_infra::SocialBackend;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub backend: Arc<dyn SocialBackend>,
}
