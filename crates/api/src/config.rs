//! Server configuration

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Process configuration loaded once at startup.
///
/// Asaas settings live on the billing client (`AsaasConfig`); this covers
/// the server's own knobs.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.to_string());

        Ok(Self {
            database_url,
            bind_address,
        })
    }
}
