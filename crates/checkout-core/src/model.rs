//! Domain Models
//!
//! Cart line items, customer details, visualizer selections and order totals.
//! Uses `rust_decimal` for all monetary values.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Quantity assumed when the visualizer does not report one (a set of four)
pub const DEFAULT_SET_QUANTITY: u32 = 4;

/// Kind of product sold by the storefront
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    Tire,
    Wheel,
}

impl ProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::Tire => "tire",
            ProductType::Wheel => "wheel",
        }
    }
}

impl std::fmt::Display for ProductType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One cart entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: String,

    #[serde(rename = "type")]
    pub product_type: ProductType,

    pub brand: String,
    pub model: String,
    pub sku: String,

    /// Unit price in USD
    #[serde(rename = "price", with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,

    /// Always >= 1 while the item is in the cart
    pub quantity: u32,

    #[serde(default)]
    pub description: String,

    #[serde(rename = "image", default)]
    pub image_ref: String,
}

impl LineItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price.saturating_mul(Decimal::from(self.quantity))
    }
}

/// A product being added to the cart (quantity is managed by the store)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewLineItem {
    pub id: String,

    #[serde(rename = "type")]
    pub product_type: ProductType,

    pub brand: String,
    pub model: String,
    pub sku: String,

    #[serde(rename = "price", with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,

    #[serde(default)]
    pub description: String,

    #[serde(rename = "image", default)]
    pub image_ref: String,
}

impl NewLineItem {
    pub(crate) fn into_line_item(self) -> LineItem {
        LineItem {
            id: self.id,
            product_type: self.product_type,
            brand: self.brand,
            model: self.model,
            sku: self.sku,
            unit_price: self.unit_price,
            quantity: 1,
            description: self.description,
            image_ref: self.image_ref,
        }
    }
}

/// Validated customer details
///
/// Only constructed through [`crate::validation::CustomerForm::validate`]
/// or [`CustomerInfo::placeholder`]; the phone is stored as exactly 10 digits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,

    #[serde(rename = "mobilePhone")]
    pub phone_digits: String,

    pub street_address: String,
    pub city: String,

    /// Two-letter uppercase state code
    pub state: String,

    #[serde(rename = "zipCode")]
    pub zip: String,
}

impl CustomerInfo {
    /// Stand-in customer used by the abbreviated buy-now path
    pub fn placeholder() -> Self {
        Self {
            first_name: "Guest".into(),
            last_name: "Customer".into(),
            email: "guest@customer.com".into(),
            phone_digits: "5555555555".into(),
            street_address: "123 Main St".into(),
            city: "City".into(),
            state: "PA".into(),
            zip: "12345".into(),
        }
    }
}

/// Vehicle the visualizer is showing
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    #[serde(default)]
    pub year: Option<serde_json::Value>,
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// A tire or wheel as reported by the visualizer widget
///
/// Dimension fields arrive as numbers or strings depending on the widget
/// build, so they are kept as raw JSON values.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedProduct {
    pub part_number: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Accepts `4`, `4.0` or `"4"`; anything else counts as missing
    #[serde(default, deserialize_with = "lenient_quantity")]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub width: Option<serde_json::Value>,
    #[serde(default)]
    pub ratio: Option<serde_json::Value>,
    #[serde(default)]
    pub diameter: Option<serde_json::Value>,
}

impl SelectedProduct {
    fn describe(&self, product_type: ProductType) -> String {
        let brand = self.brand.as_deref().unwrap_or("");
        let model = self.model.as_deref().unwrap_or(&self.part_number);
        let width = dimension(self.width.as_ref());
        let diameter = dimension(self.diameter.as_ref());

        match product_type {
            ProductType::Tire => format!(
                "{brand} {model} - {width}/{}R{diameter}",
                dimension(self.ratio.as_ref())
            ),
            ProductType::Wheel => format!("{brand} {model} - {diameter}x{width}"),
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::float_cmp)]
fn lenient_quantity<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let quantity = match value {
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64)),
        Some(serde_json::Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    Ok(quantity.and_then(|q| u32::try_from(q).ok()))
}

fn dimension(value: Option<&serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Immutable snapshot of what the shopper has picked in the visualizer
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    #[serde(default)]
    pub tires: Option<Vec<SelectedProduct>>,
    #[serde(default)]
    pub wheels: Option<Vec<SelectedProduct>>,
    #[serde(default)]
    pub vehicle: Option<Vehicle>,
}

impl Selection {
    /// At least one tire or wheel is present
    pub fn has_products(&self) -> bool {
        self.tires.as_ref().is_some_and(|t| !t.is_empty())
            || self.wheels.as_ref().is_some_and(|w| !w.is_empty())
    }

    /// Unpriced order lines, tires first
    pub fn order_lines(&self) -> Vec<OrderLine> {
        let tires = self.tires.iter().flatten().map(|p| (ProductType::Tire, p));
        let wheels = self.wheels.iter().flatten().map(|p| (ProductType::Wheel, p));

        tires
            .chain(wheels)
            .map(|(product_type, product)| OrderLine {
                sku: product.part_number.clone(),
                product_type: Some(product_type),
                description: product.describe(product_type),
                quantity: product.quantity.filter(|q| *q > 0).unwrap_or(DEFAULT_SET_QUANTITY),
                unit_price: None,
            })
            .collect()
    }
}

/// A line in an order about to be financed
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub sku: String,
    /// `None` for synthetic lines such as a pre-approval estimate
    pub product_type: Option<ProductType>,
    pub description: String,
    pub quantity: u32,
    /// Filled in by the pricing step when absent
    pub unit_price: Option<Decimal>,
}

impl OrderLine {
    pub fn priced(description: impl Into<String>, unit_price: Decimal, quantity: u32) -> Self {
        Self {
            sku: String::new(),
            product_type: None,
            description: description.into(),
            quantity,
            unit_price: Some(unit_price),
        }
    }
}

impl From<&LineItem> for OrderLine {
    fn from(item: &LineItem) -> Self {
        let description = if item.description.is_empty() {
            format!("{} {}", item.brand, item.model)
        } else {
            item.description.clone()
        };

        Self {
            sku: item.sku.clone(),
            product_type: Some(item.product_type),
            description,
            quantity: item.quantity,
            unit_price: Some(item.unit_price),
        }
    }
}

/// Sales tax policy shared by the cart summary and the financing launch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxPolicy {
    /// Fraction, e.g. 0.08 for 8%
    pub rate: Decimal,
}

impl TaxPolicy {
    pub fn new(rate: Decimal) -> Self {
        Self { rate }
    }

    pub fn tax_on(&self, subtotal: Decimal) -> Decimal {
        round_money(subtotal * self.rate)
    }
}

/// Computed order amounts
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub tax: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub fees: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub shipping: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
}

impl OrderTotals {
    /// Fees and shipping are not charged by the storefront
    pub fn from_subtotal(subtotal: Decimal, policy: &TaxPolicy) -> Self {
        let subtotal = round_money(subtotal);
        let tax = policy.tax_on(subtotal);
        Self {
            subtotal,
            tax,
            fees: Decimal::ZERO,
            shipping: Decimal::ZERO,
            total: subtotal + tax,
        }
    }
}

/// Round to cents, midpoint away from zero
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_selection_without_products() {
        assert!(!Selection::default().has_products());

        let empty_lists = Selection {
            tires: Some(vec![]),
            wheels: None,
            vehicle: Some(Vehicle::default()),
        };
        assert!(!empty_lists.has_products());
    }

    #[test]
    fn test_selection_order_lines() {
        let selection: Selection = serde_json::from_value(serde_json::json!({
            "tires": [{ "partNumber": "T1", "brand": "Falken", "model": "Wildpeak", "width": 275, "ratio": 65, "diameter": "18" }],
            "wheels": [{ "partNumber": "W9", "brand": "Fuel", "quantity": 2, "diameter": 20, "width": 9 }],
        }))
        .unwrap();

        assert!(selection.has_products());
        let lines = selection.order_lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].description, "Falken Wildpeak - 275/65R18");
        assert_eq!(lines[0].quantity, DEFAULT_SET_QUANTITY);
        assert_eq!(lines[1].description, "Fuel W9 - 20x9");
        assert_eq!(lines[1].quantity, 2);
        assert!(lines.iter().all(|l| l.unit_price.is_none()));
    }

    #[test]
    fn test_widget_quantity_forms() {
        let selection: Selection = serde_json::from_value(serde_json::json!({
            "tires": [
                { "partNumber": "A", "quantity": "2" },
                { "partNumber": "B", "quantity": 3.0 },
                { "partNumber": "C", "quantity": "four" },
                { "partNumber": "D", "quantity": -1 },
                { "partNumber": "E", "quantity": null }
            ]
        }))
        .unwrap();

        let quantities: Vec<u32> = selection.order_lines().iter().map(|l| l.quantity).collect();
        assert_eq!(quantities, vec![2, 3, DEFAULT_SET_QUANTITY, DEFAULT_SET_QUANTITY, DEFAULT_SET_QUANTITY]);
    }

    #[test]
    fn test_line_item_wire_names() {
        let item: LineItem = serde_json::from_value(serde_json::json!({
            "id": "t-1", "type": "tire", "brand": "Michelin", "model": "Defender",
            "sku": "T1", "price": 299.99, "quantity": 4, "description": "", "image": "/t1.png"
        }))
        .unwrap();
        assert_eq!(item.product_type, ProductType::Tire);
        assert_eq!(item.line_total(), dec!(1199.96));
    }

    #[test]
    fn test_totals_with_zero_tax() {
        let totals = OrderTotals::from_subtotal(dec!(1199.96), &TaxPolicy::default());
        assert_eq!(totals.tax, Decimal::ZERO);
        assert_eq!(totals.total, totals.subtotal);
    }

    #[test]
    fn test_totals_with_tax_rate() {
        let totals = OrderTotals::from_subtotal(dec!(100.05), &TaxPolicy::new(dec!(0.08)));
        assert_eq!(totals.tax, dec!(8.00));
        assert_eq!(totals.total, dec!(108.05));
    }
}
