//! Launch Endpoint Client
//!
//! [`FinancingGateway`] over this system's own `POST /api/financing/launch`,
//! for callers that must not hold partner credentials.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use checkout_core::{CheckoutError, FinancingGateway, FinancingLaunch, FinancingRequest, GatewayError, Result};

use crate::client::extract_launch;

pub const LAUNCH_PATH: &str = "/api/financing/launch";

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Client for the storefront's launch endpoint
pub struct LaunchEndpointClient {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl LaunchEndpointClient {
    /// `base_url` is the storefront origin, e.g. `http://localhost:3000`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| CheckoutError::Config(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: format!("{}{LAUNCH_PATH}", base_url.trim_end_matches('/')),
            timeout,
        })
    }
}

#[async_trait]
impl FinancingGateway for LaunchEndpointClient {
    async fn launch(&self, request: &FinancingRequest) -> Result<FinancingLaunch> {
        request.validate_shape()?;

        let response = self
            .http
            .post(&self.url)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout(self.timeout)
                } else {
                    GatewayError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error)
                .unwrap_or_else(|| {
                    format!(
                        "Failed to launch financing: {}",
                        status.canonical_reason().unwrap_or("Unknown error")
                    )
                });
            return Err(GatewayError::Status { status: status.as_u16(), message }.into());
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| GatewayError::Protocol(e.to_string()))?;
        extract_launch(&value).map_err(Into::into)
    }

    fn name(&self) -> &str {
        "launch-endpoint"
    }
}
