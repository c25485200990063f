//! Financing Gateway Strategy
//!
//! Defines the launch contract with the financing partner so the
//! orchestrator can work against the partner API directly, against this
//! system's own launch endpoint, or against a test double.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let request = FinancingRequest::new(OrderId::generate(OrderKind::Checkout), customer, &lines, totals);
//! let launch = gateway.launch(&request).await?;
//! // Render launch.launch_url in the embedded session host
//! ```

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CheckoutError, Result};
use crate::model::{CustomerInfo, OrderLine, OrderTotals};
use crate::validation::ValidationErrors;

/// Which flow produced an order id
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderKind {
    Checkout,
    BuyNow,
    PreApproval,
}

impl OrderKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            OrderKind::Checkout => "ORD",
            OrderKind::BuyNow => "BUY",
            OrderKind::PreApproval => "PREAPP",
        }
    }
}

/// Per-attempt order identifier, also the partner's customer key
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// `PREFIX-<unix millis>-<9 random upper-case alphanumerics>`
    pub fn generate(kind: OrderKind) -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string().to_uppercase();
        Self(format!(
            "{}-{}-{}",
            kind.prefix(),
            Utc::now().timestamp_millis(),
            &suffix[..9]
        ))
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One purchased item as sent for financing
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FinancingItem {
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub quantity: u32,
}

/// Normalized launch request, built once per attempt
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancingRequest {
    pub order_id: OrderId,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub tax: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub fees: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub shipping: Decimal,
    pub customer: CustomerInfo,
    pub items: Vec<FinancingItem>,
}

impl FinancingRequest {
    /// Build from priced lines; unpriced lines count as zero
    pub fn new(
        order_id: OrderId,
        customer: CustomerInfo,
        lines: &[OrderLine],
        totals: OrderTotals,
    ) -> Self {
        let items = lines
            .iter()
            .map(|line| FinancingItem {
                name: line.description.clone(),
                price: line.unit_price.unwrap_or_default(),
                quantity: line.quantity,
            })
            .collect();

        Self {
            order_id,
            total_amount: totals.total,
            subtotal: totals.subtotal,
            tax: totals.tax,
            fees: totals.fees,
            shipping: totals.shipping,
            customer,
            items,
        }
    }

    /// Shape checks that must pass before any network call
    pub fn validate_shape(&self) -> Result<()> {
        let mut errors = ValidationErrors::new();

        if self.items.is_empty() {
            errors.insert("items", "At least one item is required");
        }
        if self.total_amount <= Decimal::ZERO {
            errors.insert("totalAmount", "Total amount must be positive");
        }
        if self.order_id.as_str().trim().is_empty() {
            errors.insert("orderId", "Order id is required");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CheckoutError::Validation(errors))
        }
    }
}

/// Successful launch: the partner's hosted application URL
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancingLaunch {
    #[serde(rename = "launchURL")]
    pub launch_url: String,

    #[serde(rename = "applicationId", default, skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,

    #[serde(rename = "purchaseId", default, skip_serializing_if = "Option::is_none")]
    pub purchase_id: Option<String>,
}

/// Financing partner launch (Strategy pattern)
///
/// A launch creates partner-side application records, so implementations
/// must issue exactly one outbound call per invocation and never retry.
#[async_trait]
pub trait FinancingGateway: Send + Sync {
    async fn launch(&self, request: &FinancingRequest) -> Result<FinancingLaunch>;

    /// Gateway name for logging
    fn name(&self) -> &str;
}
