//! Application state

use std::sync::Arc;

use pixgate_billing::BillingService;
use sqlx::PgPool;

use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub billing: Arc<BillingService>,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> anyhow::Result<Self> {
        let billing = BillingService::from_env(pool)?;
        tracing::info!("Asaas billing service initialized");

        Ok(Self {
            config,
            billing: Arc::new(billing),
        })
    }
}
