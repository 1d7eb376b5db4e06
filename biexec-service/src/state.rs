use std::sync::Arc;

use biexec_core::{CardRunner, TransformRunner};

use crate::config::ServiceConfig;

/// Shared application state: one runner per contract, each carrying its own
/// timeout and memory cap resolved from [`ServiceConfig`].
#[derive(Clone)]
pub struct AppState(Arc<Inner>);

struct Inner {
    card_runner: CardRunner,
    transform_runner: TransformRunner,
}

impl AppState {
    pub fn new(config: &ServiceConfig) -> AppState {
        AppState(Arc::new(Inner {
            card_runner: CardRunner::new(config.timeout_seconds_card, config.card_memory_bytes()),
            transform_runner: TransformRunner::new(
                config.timeout_seconds_transform,
                config.transform_memory_bytes(),
            ),
        }))
    }

    pub fn card_runner(&self) -> &CardRunner {
        &self.0.card_runner
    }

    pub fn transform_runner(&self) -> &TransformRunner {
        &self.0.transform_runner
    }
}
