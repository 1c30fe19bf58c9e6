use std::sync::Arc;

use murmur_infra::{ApiError, InMemoryBackend, RestBackend, SocialBackend};
use reqwest::Client;
use thiserror::Error;
use tracing::info;

use crate::config::AppConfig;
use crate::state::AppState;

#[derive(Debug, Error)]
pub enum WiringError {
    #[error("http client error: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("api client error: {0}")]
    Api(#[from] ApiError),
}

/// Picks the backend: the seeded in-memory one for `mock`, otherwise the
/// REST client for the configured base URL.
pub fn build_state(config: AppConfig, mock: bool) -> Result<AppState, WiringError> {
    let backend: Arc<dyn SocialBackend> = if mock {
        info!("using in-memory backend");
        Arc::new(InMemoryBackend::seeded())
    } else {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        info!(base_url = %config.api_base_url, "using rest backend");
        Arc::new(RestBackend::new(
            client,
            &config.api_base_url,
            config.api_token.clone(),
        )?)
    };
    Ok(AppState {
        config: Arc::new(config),
        backend,
    })
}
