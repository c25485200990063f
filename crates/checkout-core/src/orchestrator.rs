//! Financing Launch Orchestrator
//!
//! One [`CheckoutFlow`] per checkout surface (full checkout, buy-now,
//! pre-approval). It sequences selection → pricing → customer details →
//! payment choice → gateway launch → embedded session, and guarantees at
//! most one launch in flight per flow.
//!
//! ```text
//! Idle ──▶ CollectingSelection ──▶ CollectingShippingInfo ──▶ ChoosingPaymentMethod
//!                │ (buy-now)                                       │          │
//!                └────────────────────────────────────────────────▶│          │ card
//!                                                        financing ▼          ▼
//!                                   SessionActive ◀── ok ── Launching    CardPending
//!                                                              │ err
//!                                                              └──▶ ChoosingPaymentMethod
//!
//! close: any state ──▶ Idle
//! ```
//!
//! State is guarded by a mutex that is never held across an await, and a
//! generation counter invalidates results of calls that finish after the
//! flow was closed or moved back.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::bridge::{BridgeEvent, VisualizerBridge};
use crate::error::{CheckoutError, Result};
use crate::gateway::{FinancingGateway, FinancingRequest, OrderId, OrderKind};
use crate::model::{CustomerInfo, LineItem, OrderLine, OrderTotals, Selection, TaxPolicy};
use crate::pricing::PriceLookup;
use crate::session::{EmbeddedSessionHost, FinancingSession};
use crate::validation::{CustomerForm, ValidationErrors};

/// Amount used for pre-approval when the page does not supply one
pub const DEFAULT_PRE_APPROVAL_AMOUNT: Decimal = dec!(5000);

const NOTICE_CAPACITY: usize = 32;

/// Which checkout surface a flow drives
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FlowKind {
    /// Cart review, shipping form, payment choice
    FullCheckout,
    /// Visualizer BUY: straight to payment with a placeholder customer
    BuyNow,
    /// Financing inquiry for an estimated amount, no cart
    #[serde(rename_all = "camelCase")]
    PreApproval { estimated_amount: Decimal },
}

impl FlowKind {
    pub fn pre_approval() -> Self {
        FlowKind::PreApproval { estimated_amount: DEFAULT_PRE_APPROVAL_AMOUNT }
    }

    fn order_kind(self) -> OrderKind {
        match self {
            FlowKind::FullCheckout => OrderKind::Checkout,
            FlowKind::BuyNow => OrderKind::BuyNow,
            FlowKind::PreApproval { .. } => OrderKind::PreApproval,
        }
    }
}

/// Orchestrator states
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FlowState {
    #[default]
    Idle,
    CollectingSelection,
    CollectingShippingInfo,
    ChoosingPaymentMethod,
    Launching,
    SessionActive,
    /// Card payments are not integrated; terminal until closed
    CardPending,
}

impl FlowState {
    pub fn as_str(self) -> &'static str {
        match self {
            FlowState::Idle => "idle",
            FlowState::CollectingSelection => "collecting selection",
            FlowState::CollectingShippingInfo => "collecting shipping info",
            FlowState::ChoosingPaymentMethod => "choosing a payment method",
            FlowState::Launching => "launching",
            FlowState::SessionActive => "a session is active",
            FlowState::CardPending => "card payment is pending",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Financing,
    Card,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// User-facing toast
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Collaborators of a flow
#[derive(Clone)]
pub struct FlowDeps {
    pub gateway: Arc<dyn FinancingGateway>,
    pub pricing: Arc<dyn PriceLookup>,
    pub host: Arc<dyn EmbeddedSessionHost>,
}

/// Flow tuning
#[derive(Clone, Copy, Debug)]
pub struct FlowConfig {
    pub tax_policy: TaxPolicy,
    /// Bound on each price lookup
    pub pricing_timeout: Duration,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            tax_policy: TaxPolicy::default(),
            pricing_timeout: Duration::from_secs(10),
        }
    }
}

/// Read-only view of a flow for rendering
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowSnapshot {
    pub kind: FlowKind,
    pub state: FlowState,
    pub selection: Option<Selection>,
    pub lines: Vec<OrderLine>,
    pub totals: Option<OrderTotals>,
    pub customer: Option<CustomerInfo>,
    pub validation_errors: ValidationErrors,
    pub session: Option<FinancingSession>,
    /// Pricing or launch in flight: show a spinner, disable submit
    pub busy: bool,
    pub last_error: Option<String>,
}

#[derive(Default)]
struct FlowInner {
    state: FlowState,
    selection: Option<Selection>,
    lines: Vec<OrderLine>,
    totals: Option<OrderTotals>,
    customer: Option<CustomerInfo>,
    validation_errors: ValidationErrors,
    session: Option<FinancingSession>,
    busy: bool,
    last_error: Option<String>,
    generation: u64,
}

impl FlowInner {
    /// Discard everything tied to the current attempt; keeps the visualizer selection
    fn reset(&mut self) {
        *self = FlowInner {
            selection: self.selection.take(),
            generation: self.generation + 1,
            ..FlowInner::default()
        };
    }

    fn expect(&self, expected: FlowState, action: &'static str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(CheckoutError::InvalidTransition { action, state: self.state.as_str() })
        }
    }
}

/// Checkout state machine for one surface
pub struct CheckoutFlow {
    kind: FlowKind,
    deps: FlowDeps,
    config: FlowConfig,
    inner: Mutex<FlowInner>,
    notices: broadcast::Sender<Notice>,
}

impl CheckoutFlow {
    pub fn new(kind: FlowKind, deps: FlowDeps) -> Self {
        Self::with_config(kind, deps, FlowConfig::default())
    }

    pub fn with_config(kind: FlowKind, deps: FlowDeps, config: FlowConfig) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            kind,
            deps,
            config,
            inner: Mutex::new(FlowInner::default()),
            notices,
        }
    }

    pub fn kind(&self) -> FlowKind {
        self.kind
    }

    pub fn state(&self) -> FlowState {
        self.inner.lock().state
    }

    pub fn snapshot(&self) -> FlowSnapshot {
        let inner = self.inner.lock();
        FlowSnapshot {
            kind: self.kind,
            state: inner.state,
            selection: inner.selection.clone(),
            lines: inner.lines.clone(),
            totals: inner.totals,
            customer: inner.customer.clone(),
            validation_errors: inner.validation_errors.clone(),
            session: inner.session.clone(),
            busy: inner.busy,
            last_error: inner.last_error.clone(),
        }
    }

    /// Toast stream
    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    /// Replace the stored visualizer selection snapshot
    pub fn update_selection(&self, selection: Selection) {
        self.inner.lock().selection = Some(selection);
    }

    /// Buy intent from the visualizer or a checkout button
    ///
    /// Uses the given selection, else the last stored one. Ignored when the
    /// flow is already past `Idle`.
    pub fn buy_intent(&self, selection: Option<Selection>) -> Result<FlowState> {
        if let Some(selection) = selection {
            self.update_selection(selection);
        }
        self.start()
    }

    /// Leave `Idle`
    pub fn start(&self) -> Result<FlowState> {
        let mut inner = self.inner.lock();
        if inner.state != FlowState::Idle {
            tracing::debug!(state = ?inner.state, "Flow already started");
            return Ok(inner.state);
        }

        match self.kind {
            FlowKind::PreApproval { estimated_amount } => {
                inner.lines = vec![OrderLine::priced("Pre-Approval Application", estimated_amount, 1)];
                inner.totals = Some(OrderTotals::from_subtotal(estimated_amount, &self.config.tax_policy));
                inner.state = FlowState::CollectingShippingInfo;
            }
            FlowKind::FullCheckout | FlowKind::BuyNow => {
                let lines = inner
                    .selection
                    .as_ref()
                    .filter(|s| s.has_products())
                    .map(Selection::order_lines);
                let Some(lines) = lines else {
                    drop(inner);
                    self.notify(NoticeLevel::Info, CheckoutError::NoSelection.user_message());
                    return Err(CheckoutError::NoSelection);
                };
                inner.lines = lines;
                inner.state = FlowState::CollectingSelection;
            }
        }

        tracing::info!(kind = ?self.kind, state = ?inner.state, "Checkout flow started");
        Ok(inner.state)
    }

    /// Leave `Idle` with the cart's line items (prices already known)
    pub fn start_with_cart(&self, items: &[LineItem]) -> Result<FlowState> {
        let mut inner = self.inner.lock();
        if inner.state != FlowState::Idle {
            return Ok(inner.state);
        }
        if items.is_empty() || matches!(self.kind, FlowKind::PreApproval { .. }) {
            drop(inner);
            self.notify(NoticeLevel::Info, "Your cart is empty");
            return Err(CheckoutError::NoSelection);
        }

        inner.lines = items.iter().map(OrderLine::from).collect();
        inner.state = FlowState::CollectingSelection;
        tracing::info!(kind = ?self.kind, items = items.len(), "Checkout flow started from cart");
        Ok(inner.state)
    }

    /// Price the selection and move on to customer details (or payment on buy-now)
    pub async fn confirm_selection(&self) -> Result<FlowState> {
        let (lines, generation) = {
            let mut inner = self.inner.lock();
            if inner.busy {
                return Ok(inner.state);
            }
            inner.expect(FlowState::CollectingSelection, "confirm the selection")?;
            inner.busy = true;
            (inner.lines.clone(), inner.generation)
        };

        let priced = self.price_lines(lines).await;

        let mut inner = self.inner.lock();
        if inner.generation != generation {
            tracing::debug!("Discarding pricing result for a closed flow");
            return Ok(inner.state);
        }
        inner.busy = false;

        let lines = match priced {
            Ok(lines) => lines,
            Err(e) => {
                inner.last_error = Some(e.user_message());
                drop(inner);
                self.notify(NoticeLevel::Error, e.user_message());
                return Err(e);
            }
        };

        let subtotal: Decimal = lines
            .iter()
            .map(|l| l.unit_price.unwrap_or_default() * Decimal::from(l.quantity))
            .sum();
        let totals = OrderTotals::from_subtotal(subtotal, &self.config.tax_policy);
        tracing::info!(subtotal = %totals.subtotal, total = %totals.total, lines = lines.len(), "Selection priced");

        inner.lines = lines;
        inner.totals = Some(totals);
        inner.state = match self.kind {
            FlowKind::BuyNow => {
                inner.customer = Some(CustomerInfo::placeholder());
                FlowState::ChoosingPaymentMethod
            }
            _ => FlowState::CollectingShippingInfo,
        };
        Ok(inner.state)
    }

    /// Validate the customer form; stays put and records field errors on failure
    pub fn submit_customer(&self, form: &CustomerForm) -> Result<FlowState> {
        let mut inner = self.inner.lock();
        inner.expect(FlowState::CollectingShippingInfo, "submit customer details")?;

        match form.validate() {
            Ok(customer) => {
                inner.customer = Some(customer);
                inner.validation_errors = ValidationErrors::new();
                inner.state = FlowState::ChoosingPaymentMethod;
                Ok(inner.state)
            }
            Err(errors) => {
                tracing::debug!(fields = errors.len(), "Customer form rejected");
                inner.validation_errors = errors.clone();
                drop(inner);
                let err = CheckoutError::Validation(errors);
                self.notify(NoticeLevel::Error, err.user_message());
                Err(err)
            }
        }
    }

    pub async fn choose_payment(&self, method: PaymentMethod) -> Result<FlowState> {
        match method {
            PaymentMethod::Financing => self.apply_now().await,
            PaymentMethod::Card => {
                let mut inner = self.inner.lock();
                inner.expect(FlowState::ChoosingPaymentMethod, "choose card payment")?;
                inner.state = FlowState::CardPending;
                drop(inner);
                self.notify(NoticeLevel::Info, "Credit card payment coming soon!");
                Ok(FlowState::CardPending)
            }
        }
    }

    /// Launch financing; re-entrant calls while a launch is in flight or a
    /// session is open are no-ops
    pub async fn apply_now(&self) -> Result<FlowState> {
        let (request, generation) = {
            let mut inner = self.inner.lock();
            if inner.busy || matches!(inner.state, FlowState::Launching | FlowState::SessionActive) {
                tracing::debug!(state = ?inner.state, "Launch already in flight, ignoring");
                return Ok(inner.state);
            }
            inner.expect(FlowState::ChoosingPaymentMethod, "apply for financing")?;

            let (Some(customer), Some(totals)) = (inner.customer.clone(), inner.totals) else {
                return Err(CheckoutError::InvalidTransition {
                    action: "apply for financing",
                    state: "order details are incomplete",
                });
            };

            let order_id = OrderId::generate(self.kind.order_kind());
            let request = FinancingRequest::new(order_id.clone(), customer, &inner.lines, totals);
            if let Err(e) = request.validate_shape() {
                inner.last_error = Some(e.to_string());
                drop(inner);
                self.notify(NoticeLevel::Error, e.user_message());
                return Err(e);
            }

            inner.state = FlowState::Launching;
            inner.busy = true;
            inner.last_error = None;
            inner.session = Some(FinancingSession::launching(order_id));
            (request, inner.generation)
        };

        tracing::info!(
            order_id = %request.order_id,
            amount = %request.total_amount,
            gateway = self.deps.gateway.name(),
            "Launching financing"
        );
        let result = self.deps.gateway.launch(&request).await;

        let mut inner = self.inner.lock();
        if inner.generation != generation {
            tracing::info!(order_id = %request.order_id, "Flow moved on, ignoring launch result");
            return Ok(inner.state);
        }
        inner.busy = false;

        let outcome = result.and_then(|launch| {
            let session = inner
                .session
                .get_or_insert_with(|| FinancingSession::launching(request.order_id.clone()));
            session.activate(launch);
            self.deps.host.open(session)
        });

        match outcome {
            Ok(()) => {
                inner.state = FlowState::SessionActive;
                drop(inner);
                tracing::info!(order_id = %request.order_id, "Financing session active");
                self.notify(NoticeLevel::Success, "Connected to financing");
                Ok(FlowState::SessionActive)
            }
            Err(e) => {
                tracing::warn!(order_id = %request.order_id, error = %e, "Financing launch failed");
                if let Some(session) = inner.session.as_mut() {
                    session.fail();
                }
                inner.state = FlowState::ChoosingPaymentMethod;
                inner.last_error = Some(e.user_message());
                drop(inner);
                self.notify(NoticeLevel::Error, e.user_message());
                Err(e)
            }
        }
    }

    /// Step back one screen
    pub fn back(&self) -> FlowState {
        let mut inner = self.inner.lock();
        let previous = inner.state;

        let next = match (previous, self.kind) {
            (FlowState::Idle | FlowState::CollectingSelection, _)
            | (FlowState::CollectingShippingInfo, FlowKind::PreApproval { .. }) => None,
            (FlowState::CollectingShippingInfo, _) => Some(FlowState::CollectingSelection),
            (FlowState::ChoosingPaymentMethod, FlowKind::BuyNow) => {
                inner.customer = None;
                Some(FlowState::CollectingSelection)
            }
            (FlowState::ChoosingPaymentMethod, _) => Some(FlowState::CollectingShippingInfo),
            (FlowState::Launching | FlowState::SessionActive, _) => {
                self.deps.host.close();
                inner.session = None;
                inner.busy = false;
                inner.generation += 1;
                Some(FlowState::ChoosingPaymentMethod)
            }
            (FlowState::CardPending, _) => Some(FlowState::ChoosingPaymentMethod),
        };

        let Some(next) = next else {
            drop(inner);
            return self.close();
        };

        inner.state = next;
        tracing::debug!(from = ?previous, to = ?next, "Flow stepped back");
        next
    }

    /// Close the flow: tear down the frame and discard all transient state
    pub fn close(&self) -> FlowState {
        self.deps.host.close();
        let mut inner = self.inner.lock();
        if inner.state != FlowState::Idle {
            tracing::info!(from = ?inner.state, "Checkout flow closed");
        }
        inner.reset();
        inner.state
    }

    /// Subscribe to visualizer events; dropping the handle unsubscribes
    pub fn attach(self: &Arc<Self>, bridge: &VisualizerBridge) -> BridgeSubscription {
        let mut events = bridge.on_selection_event();
        let widget = bridge.widget();
        let flow = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Visualizer events dropped");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let Some(flow) = flow.upgrade() else { break };

                match event {
                    BridgeEvent::SelectionChanged(selection) => flow.update_selection(selection),
                    BridgeEvent::BuyIntent(selection) => {
                        let has_stored = flow.inner.lock().selection.as_ref().is_some_and(Selection::has_products);
                        let selection = selection.or_else(|| {
                            if has_stored { None } else { widget.current_selection() }
                        });
                        if let Err(e) = flow.buy_intent(selection) {
                            tracing::debug!(error = %e, "Buy intent rejected");
                        }
                    }
                }
            }
        });

        BridgeSubscription { handle }
    }

    async fn price_lines(&self, lines: Vec<OrderLine>) -> Result<Vec<OrderLine>> {
        let mut priced = Vec::with_capacity(lines.len());

        for mut line in lines {
            if line.unit_price.is_none() {
                let product_type = line.product_type.ok_or_else(|| CheckoutError::Pricing {
                    sku: line.sku.clone(),
                    reason: "unknown product type".into(),
                })?;

                let lookup = self.deps.pricing.price_of(&line.sku, product_type);
                let price = tokio::time::timeout(self.config.pricing_timeout, lookup)
                    .await
                    .map_err(|_| CheckoutError::Pricing {
                        sku: line.sku.clone(),
                        reason: "lookup timed out".into(),
                    })??;

                tracing::debug!(sku = %line.sku, %price, "Resolved unit price");
                line.unit_price = Some(price);
            }
            priced.push(line);
        }

        Ok(priced)
    }

    fn notify(&self, level: NoticeLevel, message: impl Into<String>) {
        let _ = self.notices.send(Notice { level, message: message.into() });
    }
}

/// Live visualizer subscription
pub struct BridgeSubscription {
    handle: JoinHandle<()>,
}

impl BridgeSubscription {
    pub fn unsubscribe(self) {}
}

impl Drop for BridgeSubscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    use crate::bridge::VisualizerWidget;
    use crate::error::GatewayError;
    use crate::gateway::FinancingLaunch;
    use crate::model::ProductType;
    use crate::session::{FrameHost, SessionStatus};

    #[derive(Default)]
    struct FakeGateway {
        calls: AtomicUsize,
        requests: Mutex<Vec<FinancingRequest>>,
        delay: Duration,
        fail: bool,
        blank_url: bool,
    }

    impl FakeGateway {
        fn delayed(delay: Duration) -> Self {
            Self { delay, ..Self::default() }
        }

        fn failing() -> Self {
            Self { fail: true, ..Self::default() }
        }

        fn last_request(&self) -> FinancingRequest {
            self.requests.lock().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl FinancingGateway for FakeGateway {
        async fn launch(&self, request: &FinancingRequest) -> Result<FinancingLaunch> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.requests.lock().push(request.clone());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(GatewayError::Status { status: 502, message: "upstream down".into() }.into());
            }
            Ok(FinancingLaunch {
                launch_url: if self.blank_url { String::new() } else { format!("https://apply.example.com/s/{n}") },
                application_id: Some(format!("app-{n}")),
                purchase_id: None,
            })
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    struct FixedPricing;

    #[async_trait]
    impl PriceLookup for FixedPricing {
        async fn price_of(&self, _sku: &str, product_type: ProductType) -> Result<Decimal> {
            Ok(match product_type {
                ProductType::Tire => dec!(299.99),
                ProductType::Wheel => dec!(549.99),
            })
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct Harness {
        flow: Arc<CheckoutFlow>,
        gateway: Arc<FakeGateway>,
        host: Arc<FrameHost>,
    }

    fn harness(kind: FlowKind, gateway: FakeGateway) -> Harness {
        let gateway = Arc::new(gateway);
        let host = Arc::new(FrameHost::new());
        let deps = FlowDeps {
            gateway: gateway.clone(),
            pricing: Arc::new(FixedPricing),
            host: host.clone(),
        };
        Harness { flow: Arc::new(CheckoutFlow::new(kind, deps)), gateway, host }
    }

    fn tire_selection() -> Selection {
        serde_json::from_value(serde_json::json!({
            "tires": [{ "partNumber": "T1", "brand": "Michelin", "model": "Defender", "width": 225, "ratio": 65, "diameter": 17 }]
        }))
        .unwrap()
    }

    fn cart_items() -> Vec<LineItem> {
        vec![LineItem {
            id: "t1".into(),
            product_type: ProductType::Tire,
            brand: "Michelin".into(),
            model: "Defender".into(),
            sku: "T1".into(),
            unit_price: dec!(299.99),
            quantity: 4,
            description: String::new(),
            image_ref: String::new(),
        }]
    }

    fn valid_form() -> CustomerForm {
        CustomerForm {
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            email: "jane@example.com".into(),
            phone: "555.123.4567".into(),
            address: "1 Main St".into(),
            city: "Erie".into(),
            state: "pa".into(),
            zip: "16501".into(),
        }
    }

    async fn to_payment(h: &Harness) {
        h.flow.start_with_cart(&cart_items()).unwrap();
        assert_eq!(h.flow.confirm_selection().await.unwrap(), FlowState::CollectingShippingInfo);
        assert_eq!(h.flow.submit_customer(&valid_form()).unwrap(), FlowState::ChoosingPaymentMethod);
    }

    #[tokio::test]
    async fn test_no_selection_stays_idle() {
        let h = harness(FlowKind::BuyNow, FakeGateway::default());
        let mut notices = h.flow.subscribe_notices();

        let err = h.flow.buy_intent(None).unwrap_err();
        assert!(matches!(err, CheckoutError::NoSelection));
        assert_eq!(h.flow.state(), FlowState::Idle);

        let notice = notices.recv().await.unwrap();
        assert_eq!(notice.level, NoticeLevel::Info);
        assert_eq!(notice.message, "Please select products in the visualizer first");
    }

    #[tokio::test]
    async fn test_full_checkout_end_to_end() {
        let h = harness(FlowKind::FullCheckout, FakeGateway::default());
        to_payment(&h).await;

        assert_eq!(h.flow.apply_now().await.unwrap(), FlowState::SessionActive);

        let request = h.gateway.last_request();
        assert_eq!(request.subtotal, dec!(1199.96));
        assert_eq!(request.total_amount, dec!(1199.96));
        assert_eq!(request.tax, Decimal::ZERO);
        assert_eq!(request.fees, Decimal::ZERO);
        assert_eq!(request.shipping, Decimal::ZERO);
        assert_eq!(request.customer.phone_digits, "5551234567");
        assert_eq!(request.customer.state, "PA");
        assert!(request.order_id.as_str().starts_with("ORD-"));

        let snapshot = h.flow.snapshot();
        let session = snapshot.session.unwrap();
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(session.launch_url.as_deref(), Some("https://apply.example.com/s/1"));
        assert!(h.host.is_open());
    }

    #[tokio::test]
    async fn test_invalid_form_stays_with_field_errors() {
        let h = harness(FlowKind::FullCheckout, FakeGateway::default());
        h.flow.start_with_cart(&cart_items()).unwrap();
        h.flow.confirm_selection().await.unwrap();

        let form = CustomerForm { email: "john@example".into(), zip: "1234".into(), ..valid_form() };
        assert!(matches!(h.flow.submit_customer(&form), Err(CheckoutError::Validation(_))));

        let snapshot = h.flow.snapshot();
        assert_eq!(snapshot.state, FlowState::CollectingShippingInfo);
        assert!(snapshot.validation_errors.contains("email"));
        assert!(snapshot.validation_errors.contains("zip"));
        assert_eq!(h.gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_double_click_launches_once() {
        let h = harness(FlowKind::FullCheckout, FakeGateway::delayed(Duration::from_millis(50)));
        to_payment(&h).await;

        let (first, second) = tokio::join!(h.flow.apply_now(), h.flow.apply_now());
        assert_eq!(first.unwrap(), FlowState::SessionActive);
        assert_eq!(second.unwrap(), FlowState::Launching);
        assert_eq!(h.gateway.calls.load(Ordering::SeqCst), 1);

        // An open session also swallows further clicks
        assert_eq!(h.flow.apply_now().await.unwrap(), FlowState::SessionActive);
        assert_eq!(h.gateway.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gateway_failure_returns_to_payment_choice() {
        let h = harness(FlowKind::FullCheckout, FakeGateway::failing());
        to_payment(&h).await;
        let mut notices = h.flow.subscribe_notices();

        let err = h.flow.apply_now().await.unwrap_err();
        assert!(matches!(err, CheckoutError::Gateway(GatewayError::Status { status: 502, .. })));

        let snapshot = h.flow.snapshot();
        assert_eq!(snapshot.state, FlowState::ChoosingPaymentMethod);
        assert_eq!(snapshot.session.unwrap().status, SessionStatus::Failed);
        assert!(!snapshot.busy);
        assert!(!h.host.is_open());
        assert_eq!(notices.recv().await.unwrap().level, NoticeLevel::Error);

        // Manual retry is a fresh attempt with a new order id
        let _ = h.flow.apply_now().await;
        let requests = h.gateway.requests.lock().clone();
        assert_eq!(requests.len(), 2);
        assert_ne!(requests[0].order_id, requests[1].order_id);
    }

    #[tokio::test]
    async fn test_blank_launch_url_never_opens_frame() {
        let h = harness(FlowKind::FullCheckout, FakeGateway { blank_url: true, ..FakeGateway::default() });
        to_payment(&h).await;

        assert!(h.flow.apply_now().await.is_err());
        let snapshot = h.flow.snapshot();
        assert_eq!(snapshot.state, FlowState::ChoosingPaymentMethod);
        assert_eq!(snapshot.session.unwrap().status, SessionStatus::Failed);
        assert!(!h.host.is_open());
    }

    #[tokio::test]
    async fn test_close_then_reopen_gets_fresh_order_id() {
        let h = harness(FlowKind::FullCheckout, FakeGateway::default());
        to_payment(&h).await;
        h.flow.apply_now().await.unwrap();
        let first = h.gateway.last_request().order_id;

        assert_eq!(h.flow.close(), FlowState::Idle);
        let snapshot = h.flow.snapshot();
        assert!(snapshot.session.is_none());
        assert!(snapshot.customer.is_none());
        assert!(!h.host.is_open());

        to_payment(&h).await;
        h.flow.apply_now().await.unwrap();
        let second = h.gateway.last_request().order_id;
        assert!(!second.as_str().is_empty());
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_late_result_ignored_after_close() {
        let h = harness(FlowKind::FullCheckout, FakeGateway::delayed(Duration::from_millis(50)));
        to_payment(&h).await;

        let flow = h.flow.clone();
        let pending = tokio::spawn(async move { flow.apply_now().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(h.flow.state(), FlowState::Launching);

        h.flow.close();
        assert_eq!(pending.await.unwrap().unwrap(), FlowState::Idle);
        assert_eq!(h.flow.state(), FlowState::Idle);
        assert!(!h.host.is_open());
        assert_eq!(h.gateway.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_buy_now_uses_priced_selection_and_placeholder() {
        let h = harness(FlowKind::BuyNow, FakeGateway::default());

        assert_eq!(h.flow.buy_intent(Some(tire_selection())).unwrap(), FlowState::CollectingSelection);
        assert_eq!(h.flow.confirm_selection().await.unwrap(), FlowState::ChoosingPaymentMethod);
        h.flow.choose_payment(PaymentMethod::Financing).await.unwrap();

        let request = h.gateway.last_request();
        assert_eq!(request.customer, CustomerInfo::placeholder());
        assert_eq!(request.items[0].name, "Michelin Defender - 225/65R17");
        assert_eq!(request.items[0].quantity, 4);
        assert_eq!(request.total_amount, dec!(1199.96));
        assert!(request.order_id.as_str().starts_with("BUY-"));
    }

    #[tokio::test]
    async fn test_card_branch_is_pending_stub() {
        let h = harness(FlowKind::FullCheckout, FakeGateway::default());
        to_payment(&h).await;
        let mut notices = h.flow.subscribe_notices();

        assert_eq!(h.flow.choose_payment(PaymentMethod::Card).await.unwrap(), FlowState::CardPending);
        assert_eq!(notices.recv().await.unwrap().message, "Credit card payment coming soon!");
        assert_eq!(h.gateway.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.flow.back(), FlowState::ChoosingPaymentMethod);
    }

    #[tokio::test]
    async fn test_pre_approval_uses_estimate() {
        let h = harness(FlowKind::pre_approval(), FakeGateway::default());

        assert_eq!(h.flow.start().unwrap(), FlowState::CollectingShippingInfo);
        h.flow.submit_customer(&valid_form()).unwrap();
        h.flow.apply_now().await.unwrap();

        let request = h.gateway.last_request();
        assert_eq!(request.total_amount, dec!(5000));
        assert_eq!(request.subtotal, dec!(5000));
        assert_eq!(request.items.len(), 1);
        assert_eq!(request.items[0].name, "Pre-Approval Application");
        assert!(request.order_id.as_str().starts_with("PREAPP-"));
    }

    #[tokio::test]
    async fn test_back_navigation() {
        let h = harness(FlowKind::FullCheckout, FakeGateway::default());
        to_payment(&h).await;
        h.flow.apply_now().await.unwrap();

        assert_eq!(h.flow.back(), FlowState::ChoosingPaymentMethod);
        assert!(!h.host.is_open());
        assert!(h.flow.snapshot().session.is_none());
        assert_eq!(h.flow.back(), FlowState::CollectingShippingInfo);
        assert_eq!(h.flow.back(), FlowState::CollectingSelection);
        assert_eq!(h.flow.back(), FlowState::Idle);
    }

    #[tokio::test]
    async fn test_out_of_order_action_rejected() {
        let h = harness(FlowKind::FullCheckout, FakeGateway::default());
        let err = h.flow.apply_now().await.unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidTransition { .. }));
        assert_eq!(h.gateway.calls.load(Ordering::SeqCst), 0);
    }

    struct QuoteWidget;

    impl VisualizerWidget for QuoteWidget {
        fn current_selection(&self) -> Option<Selection> {
            Some(tire_selection())
        }
    }

    #[tokio::test]
    async fn test_bridge_buy_event_starts_flow() {
        let h = harness(FlowKind::BuyNow, FakeGateway::default());
        let bridge = VisualizerBridge::new(Arc::new(QuoteWidget));
        let subscription = h.flow.attach(&bridge);

        bridge.dispatch("buyClick", &serde_json::json!({}));

        for _ in 0..50 {
            if h.flow.state() != FlowState::Idle {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(h.flow.state(), FlowState::CollectingSelection);
        assert!(h.flow.snapshot().selection.unwrap().has_products());

        subscription.unsubscribe();
    }
}
