//! # checkout-core
//!
//! Checkout and consumer-financing orchestration for the tire & wheel storefront.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  events   ┌──────────────────────────────────────────────┐
//! │  Visualizer  │──────────▶│                 CheckoutFlow                 │
//! │    Bridge    │           │  ┌──────────────┐  ┌──────────────────────┐  │
//! └──────────────┘           │  │ PriceLookup  │  │  FinancingGateway    │  │
//!                            │  │  (Strategy)  │  │     (Strategy)       │  │
//! ┌──────────────┐  items    │  └──────────────┘  └──────────────────────┘  │
//! │  CartStore   │──────────▶│  ┌──────────────────────────────────────┐    │
//! │ (KV-backed)  │           │  │      EmbeddedSessionHost (frame)     │    │
//! └──────────────┘           │  └──────────────────────────────────────┘    │
//!                            └──────────────────────────────────────────────┘
//! ```
//!
//! Pricing and the gateway are traits so the flow runs unchanged against the
//! partner API, this system's own launch endpoint, or test doubles.

pub mod bridge;
pub mod cart;
pub mod error;
pub mod gateway;
pub mod model;
pub mod orchestrator;
pub mod pricing;
pub mod session;
pub mod validation;

pub use bridge::{BridgeEvent, VisualizerBridge, VisualizerWidget};
pub use cart::{
    CartStore, CartSummary, CartUpdate, FileKeyValueStore, KeyValueStore, MAX_LINE_QUANTITY,
    MemoryKeyValueStore,
};
pub use error::{CheckoutError, GatewayError, Result};
pub use gateway::{FinancingGateway, FinancingItem, FinancingLaunch, FinancingRequest, OrderId, OrderKind};
pub use model::{
    CustomerInfo, LineItem, NewLineItem, OrderLine, OrderTotals, ProductType, Selection, TaxPolicy,
};
pub use orchestrator::{
    BridgeSubscription, CheckoutFlow, FlowConfig, FlowDeps, FlowKind, FlowSnapshot, FlowState,
    Notice, NoticeLevel, PaymentMethod,
};
pub use pricing::PriceLookup;
pub use session::{EmbeddedFrame, EmbeddedSessionHost, FinancingSession, FrameHost, SessionStatus};
pub use validation::{CustomerForm, ValidationErrors};
