//! Tire storefront HTTP server
//!
//! Axum-based server exposing the financing launch endpoint and the
//! single-client cart. Partner credentials stay on this side; browsers only
//! ever see the launch URL.

mod handlers;
mod state;

use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    routing::{get, patch, post},
};
use rust_decimal::Decimal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use checkout_core::{CartStore, FileKeyValueStore, FinancingGateway, TaxPolicy};
use checkout_financing::FinancingClient;

use crate::handlers::{
    add_cart_item, clear_cart, get_cart, health_check, launch_financing, remove_cart_item,
    set_cart_quantity,
};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    // Financing partner
    let financing: Option<Arc<dyn FinancingGateway>> = match FinancingClient::from_env() {
        Ok(client) => {
            tracing::info!(api_url = %client.config().api_url, "✓ Financing configured");
            Some(Arc::new(client))
        }
        Err(e) => {
            tracing::warn!("⚠ Financing not configured - launch endpoint disabled ({e})");
            tracing::warn!("  Set FINANCING_USERNAME and FINANCING_PASSWORD in .env");
            None
        }
    };

    // Cart persistence
    let cart_dir = std::env::var("CART_STORE_DIR").unwrap_or_else(|_| "./data".into());
    let cart = Arc::new(CartStore::new(Arc::new(FileKeyValueStore::new(&cart_dir))));
    tracing::info!(dir = %cart_dir, "Cart store ready");

    let tax_rate = match std::env::var("CHECKOUT_SALES_TAX_RATE") {
        Ok(raw) => Decimal::from_str(raw.trim())
            .with_context(|| format!("CHECKOUT_SALES_TAX_RATE is not a decimal: {raw}"))?,
        Err(_) => Decimal::ZERO,
    };

    let state = AppState {
        financing,
        cart,
        tax_policy: TaxPolicy::new(tax_rate),
    };

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("🚀 storefront server running on http://{}", addr);
    tracing::info!("  GET    /health");
    tracing::info!("  POST   /api/financing/launch");
    tracing::info!("  GET    /api/cart");
    tracing::info!("  POST   /api/cart/items");
    tracing::info!("  PATCH  /api/cart/items/{{id}}");
    tracing::info!("  DELETE /api/cart/items/{{id}}");
    tracing::info!("  DELETE /api/cart");

    axum::serve(listener, app(state)).await?;

    Ok(())
}

/// Build the router
pub fn app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(health_check))
        // Financing
        .route("/api/financing/launch", post(launch_financing))
        // Cart
        .route("/api/cart", get(get_cart).delete(clear_cart))
        .route("/api/cart/items", post(add_cart_item))
        .route(
            "/api/cart/items/{id}",
            patch(set_cart_quantity).delete(remove_cart_item),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
