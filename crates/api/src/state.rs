//! Application state

use axum::http::HeaderName;
use common::Config;
use processor::{Puller, RepositorySyncController};
use std::sync::Arc;

/// Shared application state, built once before the listener starts
pub struct AppState {
    pub config: Config,
    pub signature_header: HeaderName,
    pub controller: RepositorySyncController,
}

impl AppState {
    pub fn new(config: Config, puller: Arc<dyn Puller>) -> anyhow::Result<Self> {
        let signature_header = HeaderName::try_from(config.signature_header.as_str())?;
        let controller = RepositorySyncController::from_config(&config, puller);
        Ok(Self {
            config,
            signature_header,
            controller,
        })
    }
}
