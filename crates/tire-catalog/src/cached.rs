//! Memoizing price lookup
//!
//! Pins the first price seen for each `(sku, type)` so a session never sees
//! a price change between the cart summary and the launch total.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use checkout_core::{PriceLookup, ProductType, Result};

/// Per-session price memo over any [`PriceLookup`]
pub struct CachedPriceLookup {
    inner: Arc<dyn PriceLookup>,
    memo: Mutex<HashMap<(String, ProductType), Decimal>>,
}

impl CachedPriceLookup {
    pub fn new(inner: Arc<dyn PriceLookup>) -> Self {
        Self {
            inner,
            memo: Mutex::new(HashMap::new()),
        }
    }

    /// Start a new session
    pub fn clear(&self) {
        self.memo.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.memo.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.memo.lock().is_empty()
    }
}

#[async_trait]
impl PriceLookup for CachedPriceLookup {
    async fn price_of(&self, sku: &str, product_type: ProductType) -> Result<Decimal> {
        let key = (sku.to_string(), product_type);
        if let Some(price) = self.memo.lock().get(&key).copied() {
            return Ok(price);
        }

        // Failures are not memoized; the next attempt asks again
        let price = self.inner.price_of(sku, product_type).await?;

        // A concurrent lookup may have landed first; keep whichever was stored
        Ok(*self.memo.lock().entry(key).or_insert(price))
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
