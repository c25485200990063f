//! # tire-catalog
//!
//! [`checkout_core::PriceLookup`] implementations for tires and wheels.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tire_catalog::{CachedPriceLookup, MockCatalog};
//!
//! let pricing = Arc::new(CachedPriceLookup::new(Arc::new(MockCatalog::new())));
//! let price = pricing.price_of("T1", ProductType::Tire).await?;
//! ```

pub mod cached;
pub mod mock;

pub use cached::CachedPriceLookup;
pub use mock::MockCatalog;
