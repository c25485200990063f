//! Cart Store
//!
//! The cart is a single JSON array persisted under one key of a key-value
//! store. Each mutation re-reads, mutates and re-writes the whole collection,
//! which is only safe with a single client mutating the cart.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CheckoutError, Result};
use crate::model::{LineItem, NewLineItem, OrderTotals, TaxPolicy};

/// Key the cart blob is stored under
pub const CART_STORAGE_KEY: &str = "storefront_cart";

/// Largest quantity a single line item may hold
pub const MAX_LINE_QUANTITY: u32 = 9_999;

/// Key-value persistence backing the cart
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory store (for development/testing)
#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// One file per key under a directory
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{file}.json"))
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CheckoutError::Storage(e.to_string())),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| CheckoutError::Storage(e.to_string()))?;
        std::fs::write(self.path_for(key), value).map_err(|e| CheckoutError::Storage(e.to_string()))
    }

    fn remove(&self, key: &str) -> Result<()> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CheckoutError::Storage(e.to_string())),
        }
    }
}

/// Cart contents after an operation, plus a non-fatal storage warning
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CartUpdate {
    pub items: Vec<LineItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Totals shown in the cart drawer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    /// Sum of quantities
    pub item_count: u64,
    pub totals: OrderTotals,
}

impl CartSummary {
    pub fn of(items: &[LineItem], policy: &TaxPolicy) -> Self {
        let subtotal = items
            .iter()
            .map(LineItem::line_total)
            .fold(Decimal::ZERO, Decimal::saturating_add);
        Self {
            item_count: items
                .iter()
                .fold(0u64, |count, i| count.saturating_add(u64::from(i.quantity))),
            totals: OrderTotals::from_subtotal(subtotal, policy),
        }
    }
}

/// Line-item cart over a key-value store
pub struct CartStore {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl CartStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(store, CART_STORAGE_KEY)
    }

    pub fn with_key(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self { store, key: key.into() }
    }

    /// Current cart; read failures and malformed blobs yield an empty cart
    pub fn get(&self) -> CartUpdate {
        match self.read() {
            Ok(items) => CartUpdate { items, warning: None },
            Err(warning) => CartUpdate { items: Vec::new(), warning: Some(warning) },
        }
    }

    /// Insert with quantity 1, or bump the quantity of an existing id by 1
    pub fn add(&self, product: NewLineItem) -> CartUpdate {
        self.mutate(|items| {
            if let Some(existing) = items.iter_mut().find(|i| i.id == product.id) {
                existing.quantity = existing.quantity.saturating_add(1).min(MAX_LINE_QUANTITY);
            } else {
                items.push(product.into_line_item());
            }
        })
    }

    /// Set the quantity; zero or negative removes the item, larger values
    /// are clamped to [`MAX_LINE_QUANTITY`]
    pub fn set_quantity(&self, id: &str, quantity: i64) -> CartUpdate {
        self.mutate(|items| {
            let Some(index) = items.iter().position(|i| i.id == id) else {
                return;
            };
            if quantity <= 0 {
                items.remove(index);
            } else {
                items[index].quantity = u32::try_from(quantity)
                    .unwrap_or(u32::MAX)
                    .min(MAX_LINE_QUANTITY);
            }
        })
    }

    pub fn remove(&self, id: &str) -> CartUpdate {
        self.mutate(|items| items.retain(|i| i.id != id))
    }

    pub fn clear(&self) -> CartUpdate {
        match self.store.remove(&self.key) {
            Ok(()) => CartUpdate::default(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to clear cart");
                CartUpdate { items: Vec::new(), warning: Some(e.to_string()) }
            }
        }
    }

    fn mutate(&self, apply: impl FnOnce(&mut Vec<LineItem>)) -> CartUpdate {
        let CartUpdate { mut items, mut warning } = self.get();

        apply(&mut items);

        if let Err(e) = self.write(&items) {
            tracing::warn!(error = %e, "Failed to save cart");
            warning = Some(e.to_string());
        }

        CartUpdate { items, warning }
    }

    fn read(&self) -> std::result::Result<Vec<LineItem>, String> {
        let blob = match self.store.get(&self.key) {
            Ok(Some(blob)) => blob,
            Ok(None) => return Ok(Vec::new()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read cart");
                return Err(e.to_string());
            }
        };

        match serde_json::from_str::<Vec<LineItem>>(&blob) {
            Ok(items) => Ok(items.into_iter().filter(|i| i.quantity >= 1).collect()),
            Err(e) => {
                tracing::warn!(error = %e, "Stored cart is malformed, starting empty");
                Err(format!("Stored cart was unreadable: {e}"))
            }
        }
    }

    fn write(&self, items: &[LineItem]) -> Result<()> {
        let blob = serde_json::to_string(items)?;
        self.store.set(&self.key, &blob)
    }
}
