//! Price Lookup Strategy
//!
//! Resolves a SKU to a unit price. Implementations may suspend for as long
//! as the backing catalog takes; callers own any timeout policy.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::Result;
use crate::model::ProductType;

/// Unit price resolution (Strategy pattern)
///
/// Must return the same price for the same `(sku, product_type)` within a session.
#[async_trait]
pub trait PriceLookup: Send + Sync {
    /// Unit price in USD
    async fn price_of(&self, sku: &str, product_type: ProductType) -> Result<Decimal>;

    /// Lookup backend name
    fn name(&self) -> &str;
}
