//! Visualizer Bridge
//!
//! Boundary with the third-party vehicle visualizer. The widget glue calls
//! [`VisualizerBridge::dispatch`] for every widget event; subscribers receive
//! typed [`BridgeEvent`]s over a broadcast channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;

use crate::model::Selection;

/// Widget events that mean "the shopper wants to buy"
pub const BUY_EVENTS: [&str; 4] = ["submitQuote", "buy", "buyClick", "addToCart"];

const EVENT_CAPACITY: usize = 64;

/// Handle to the embedded visualizer instance
pub trait VisualizerWidget: Send + Sync {
    /// The widget's own view of the current quote or selection
    fn current_selection(&self) -> Option<Selection>;
}

/// Typed visualizer event
#[derive(Clone, Debug, PartialEq)]
pub enum BridgeEvent {
    /// Shopper changed tires, wheels or vehicle
    SelectionChanged(Selection),

    /// Buy/quote click; carries the event's own selection when it had one
    BuyIntent(Option<Selection>),
}

/// Forwards widget callbacks into a channel
pub struct VisualizerBridge {
    widget: Arc<dyn VisualizerWidget>,
    events: broadcast::Sender<BridgeEvent>,
    ready: AtomicBool,
}

impl VisualizerBridge {
    pub fn new(widget: Arc<dyn VisualizerWidget>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            widget,
            events,
            ready: AtomicBool::new(false),
        }
    }

    pub fn widget(&self) -> Arc<dyn VisualizerWidget> {
        self.widget.clone()
    }

    /// Register for selection and buy events; dropping the receiver unsubscribes
    pub fn on_selection_event(&self) -> broadcast::Receiver<BridgeEvent> {
        self.events.subscribe()
    }

    /// The widget has emitted at least one event
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Entry point for the widget's `onEvent` callback
    pub fn dispatch(&self, event: &str, data: &serde_json::Value) {
        self.ready.store(true, Ordering::Release);

        let selection = parse_selection(data);
        tracing::debug!(event, has_selection = selection.is_some(), "Visualizer event");

        if let Some(ref selection) = selection {
            self.publish(BridgeEvent::SelectionChanged(selection.clone()));
        }

        if BUY_EVENTS.contains(&event) {
            let with_products = selection.filter(Selection::has_products);
            self.publish(BridgeEvent::BuyIntent(with_products));
        }
    }

    fn publish(&self, event: BridgeEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("No visualizer subscribers");
        }
    }
}

fn parse_selection(data: &serde_json::Value) -> Option<Selection> {
    let object = data.as_object()?;
    if !["wheels", "tires", "vehicle"].iter().any(|k| object.contains_key(*k)) {
        return None;
    }

    match serde_json::from_value::<Selection>(data.clone()) {
        Ok(selection) => Some(selection),
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring malformed visualizer selection");
            None
        }
    }
}
