//! Financing Partner Client
//!
//! Direct implementation of [`FinancingGateway`] against the partner's
//! `/page/api-launch` endpoint. One POST per launch, never retried: every
//! call creates an application record on the partner side.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use checkout_core::{
    CheckoutError, FinancingGateway, FinancingLaunch, FinancingRequest, GatewayError, Result,
    validation::phone_digits,
};

use crate::config::FinancingConfig;

/// Partner launch payload
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PartnerLaunchPayload<'a> {
    language: &'static str,
    store_id: &'a str,
    sales_id: &'a str,
    sales_name: &'a str,
    application_id: Option<String>,
    purchase_id: Option<String>,
    first_name: &'a str,
    middle_init: &'static str,
    last_name: &'a str,
    address1: &'a str,
    address2: &'static str,
    city: &'a str,
    state: &'a str,
    zipcode: &'a str,
    home_phone: &'static str,
    mobile_phone: String,
    email: &'a str,
    customer_key: &'a str,
    invoice_number: &'a str,
    #[serde(with = "rust_decimal::serde::float")]
    purchase_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    fees: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    sales_tax: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    shipping: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    down_payment: Decimal,
    promo_code: &'static str,
    ship_first_name: &'a str,
    ship_last_name: &'a str,
    ship_address1: &'a str,
    ship_address2: &'static str,
    ship_city: &'a str,
    ship_state: &'a str,
    ship_zipcode: &'a str,
    purchase_items: Vec<PartnerPurchaseItem<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PartnerPurchaseItem<'a> {
    sku: &'static str,
    upc: &'static str,
    description: &'a str,
    condition: &'static str,
    item_type: &'static str,
    #[serde(with = "rust_decimal::serde::float")]
    unit_price: Decimal,
    quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    sales_tax: Decimal,
    leasable: bool,
    delivery_date: Option<String>,
    delivered: bool,
}

impl<'a> PartnerLaunchPayload<'a> {
    fn build(config: &'a FinancingConfig, request: &'a FinancingRequest) -> Self {
        let customer = &request.customer;
        let order_id = request.order_id.as_str();

        Self {
            language: "en",
            store_id: &config.store_id,
            sales_id: &config.sales_id,
            sales_name: &config.sales_name,
            application_id: None,
            purchase_id: None,
            first_name: &customer.first_name,
            middle_init: "",
            last_name: &customer.last_name,
            address1: &customer.street_address,
            address2: "",
            city: &customer.city,
            state: &customer.state,
            zipcode: &customer.zip,
            home_phone: "",
            mobile_phone: phone_digits(&customer.phone_digits),
            email: &customer.email,
            customer_key: order_id,
            invoice_number: order_id,
            purchase_amount: request.total_amount,
            fees: request.fees,
            sales_tax: request.tax,
            shipping: request.shipping,
            down_payment: Decimal::ZERO,
            promo_code: "",
            ship_first_name: &customer.first_name,
            ship_last_name: &customer.last_name,
            ship_address1: &customer.street_address,
            ship_address2: "",
            ship_city: &customer.city,
            ship_state: &customer.state,
            ship_zipcode: &customer.zip,
            purchase_items: request
                .items
                .iter()
                .map(|item| PartnerPurchaseItem {
                    sku: "",
                    upc: "",
                    description: &item.name,
                    condition: "new",
                    item_type: "",
                    unit_price: item.price,
                    quantity: item.quantity,
                    sales_tax: Decimal::ZERO,
                    leasable: true,
                    delivery_date: None,
                    delivered: false,
                })
                .collect(),
        }
    }
}

/// Partner API client
pub struct FinancingClient {
    http: reqwest::Client,
    config: FinancingConfig,
}

impl FinancingClient {
    /// Fails when the username or password is blank; no request is ever
    /// sent without credentials
    pub fn new(config: FinancingConfig) -> Result<Self> {
        if config.username.trim().is_empty() || config.password.trim().is_empty() {
            return Err(CheckoutError::Config("Financing credentials not configured".into()));
        }

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| CheckoutError::Config(format!("HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(FinancingConfig::from_env()?)
    }

    pub fn config(&self) -> &FinancingConfig {
        &self.config
    }
}

#[async_trait]
impl FinancingGateway for FinancingClient {
    async fn launch(&self, request: &FinancingRequest) -> Result<FinancingLaunch> {
        request.validate_shape()?;

        let payload = PartnerLaunchPayload::build(&self.config, request);
        tracing::debug!(
            order_id = %request.order_id,
            amount = %request.total_amount,
            items = request.items.len(),
            "Sending financing launch"
        );

        let response = self
            .http
            .post(self.config.launch_url())
            .basic_auth(&self.config.username, Some(&self.config.password))
            .timeout(self.config.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(&e))?;

        if !status.is_success() {
            tracing::warn!(order_id = %request.order_id, status = status.as_u16(), "Financing API rejected launch");
            let message = if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("Unknown error").to_string()
            } else {
                body
            };
            return Err(GatewayError::Status { status: status.as_u16(), message }.into());
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| GatewayError::Protocol(format!("response is not JSON: {e}")))?;
        let launch = extract_launch(&value)?;

        tracing::info!(
            order_id = %request.order_id,
            application_id = launch.application_id.as_deref().unwrap_or("-"),
            "Financing launch accepted"
        );
        Ok(launch)
    }

    fn name(&self) -> &str {
        "financing-partner"
    }
}

impl FinancingClient {
    fn transport_error(&self, e: &reqwest::Error) -> CheckoutError {
        if e.is_timeout() {
            GatewayError::Timeout(self.config.timeout).into()
        } else {
            GatewayError::Network(e.to_string()).into()
        }
    }
}

/// Pull the launch result out of `{ data: {...} }` or a bare object
pub fn extract_launch(value: &Value) -> std::result::Result<FinancingLaunch, GatewayError> {
    let body = match value.get("data") {
        Some(data) if data.is_object() => data,
        _ => value,
    };

    let launch_url = body
        .get("launchURL")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| GatewayError::Protocol("No launchURL received".into()))?;

    let parsed = reqwest::Url::parse(launch_url)
        .map_err(|e| GatewayError::Protocol(format!("launchURL is not a valid URL: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(GatewayError::Protocol(format!(
            "launchURL has unsupported scheme '{}'",
            parsed.scheme()
        )));
    }

    Ok(FinancingLaunch {
        launch_url: launch_url.to_string(),
        application_id: nested_id(body, "application", "applicationId"),
        purchase_id: nested_id(body, "purchase", "purchaseId"),
    })
}

fn nested_id(body: &Value, object: &str, field: &str) -> Option<String> {
    match body.get(object)?.get(field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
