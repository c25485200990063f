//! Application State

use std::sync::Arc;

use checkout_core::{CartStore, FinancingGateway, TaxPolicy};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Partner gateway (optional - None if credentials are not configured)
    pub financing: Option<Arc<dyn FinancingGateway>>,

    /// Single-client cart
    pub cart: Arc<CartStore>,

    /// Applied to cart summaries
    pub tax_policy: TaxPolicy,
}
