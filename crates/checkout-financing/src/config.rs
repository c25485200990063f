//! Financing partner configuration

use std::time::Duration;

use checkout_core::{CheckoutError, Result};

pub const DEFAULT_API_URL: &str = "https://apisg.mylendpro.com";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Partner credentials and store identity
#[derive(Clone)]
pub struct FinancingConfig {
    /// Base URL; the launch path is appended
    pub api_url: String,
    pub username: String,
    pub password: String,
    pub store_id: String,
    pub sales_id: String,
    pub sales_name: String,
    pub timeout: Duration,
}

impl FinancingConfig {
    pub fn new(api_url: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            username: username.into(),
            password: password.into(),
            store_id: String::new(),
            sales_id: String::new(),
            sales_name: String::new(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    /// Create from environment variables
    ///
    /// Fails when `FINANCING_USERNAME` or `FINANCING_PASSWORD` is missing or blank.
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        let username = var("FINANCING_USERNAME")
            .ok_or_else(|| CheckoutError::Config("FINANCING_USERNAME not set".into()))?;
        let password = var("FINANCING_PASSWORD")
            .ok_or_else(|| CheckoutError::Config("FINANCING_PASSWORD not set".into()))?;

        let timeout_ms = var("FINANCING_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_MS);

        Ok(Self {
            api_url: var("FINANCING_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into()),
            username,
            password,
            store_id: var("FINANCING_STORE_ID").unwrap_or_default(),
            sales_id: var("FINANCING_SALES_ID").unwrap_or_default(),
            sales_name: var("FINANCING_SALES_NAME").unwrap_or_default(),
            timeout: Duration::from_millis(timeout_ms),
        })
    }

    pub fn with_store(mut self, store_id: impl Into<String>, sales_id: impl Into<String>, sales_name: impl Into<String>) -> Self {
        self.store_id = store_id.into();
        self.sales_id = sales_id.into();
        self.sales_name = sales_name.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn launch_url(&self) -> String {
        format!("{}/page/api-launch", self.api_url.trim_end_matches('/'))
    }
}

impl std::fmt::Debug for FinancingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinancingConfig")
            .field("api_url", &self.api_url)
            .field("username", &"<redacted>")
            .field("password", &"<redacted>")
            .field("store_id", &self.store_id)
            .field("sales_id", &self.sales_id)
            .field("sales_name", &self.sales_name)
            .field("timeout", &self.timeout)
            .finish()
    }
}
