//! Mock Catalog
//!
//! Stand-in for the storefront's pricing service. Every tire and every wheel
//! has a flat price, and each lookup waits a fixed latency to exercise
//! loading states.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use checkout_core::{CheckoutError, PriceLookup, ProductType, Result};

pub const TIRE_PRICE: Decimal = dec!(299.99);
pub const WHEEL_PRICE: Decimal = dec!(549.99);
pub const DEFAULT_LATENCY: Duration = Duration::from_millis(300);

/// Mock catalog with flat per-type prices
pub struct MockCatalog {
    latency: Duration,
    /// Per-SKU prices that win over the flat price
    overrides: HashMap<String, Decimal>,
}

impl Default for MockCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCatalog {
    pub fn new() -> Self {
        Self {
            latency: DEFAULT_LATENCY,
            overrides: HashMap::new(),
        }
    }

    /// No artificial delay
    pub fn instant() -> Self {
        Self::new().with_latency(Duration::ZERO)
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_price(mut self, sku: impl Into<String>, price: Decimal) -> Self {
        self.overrides.insert(sku.into(), price);
        self
    }

    fn base_price(product_type: ProductType) -> Decimal {
        match product_type {
            ProductType::Tire => TIRE_PRICE,
            ProductType::Wheel => WHEEL_PRICE,
        }
    }
}

#[async_trait]
impl PriceLookup for MockCatalog {
    async fn price_of(&self, sku: &str, product_type: ProductType) -> Result<Decimal> {
        if sku.trim().is_empty() {
            return Err(CheckoutError::Pricing {
                sku: sku.to_string(),
                reason: "empty part number".into(),
            });
        }

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let price = self
            .overrides
            .get(sku)
            .copied()
            .unwrap_or_else(|| Self::base_price(product_type));
        tracing::debug!(sku, %product_type, %price, "Mock catalog price");
        Ok(price)
    }

    fn name(&self) -> &str {
        "MockCatalog"
    }
}
