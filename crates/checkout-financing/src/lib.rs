//! # checkout-financing
//!
//! HTTP implementations of [`checkout_core::FinancingGateway`].
//!
//! ```text
//! ┌──────────────┐   POST /api/financing/launch   ┌──────────────────┐   POST /page/api-launch   ┌──────────┐
//! │ CheckoutFlow │──────────────────────────────▶│ storefront-server │─────────────────────────▶│ Partner  │
//! └──────────────┘     (LaunchEndpointClient)     └──────────────────┘     (FinancingClient)     └──────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use checkout_financing::FinancingClient;
//!
//! let client = FinancingClient::from_env()?;
//! let launch = client.launch(&request).await?;
//! ```

pub mod client;
pub mod config;
pub mod endpoint;

pub use client::{FinancingClient, extract_launch};
pub use config::FinancingConfig;
pub use endpoint::LaunchEndpointClient;
