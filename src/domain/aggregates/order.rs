//! Order Aggregate

use chrono::{NaiveDateTime, Timelike};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use crate::domain::value_objects::{lenient, parse_timestamp, StatusKeywords};

/// Status code the marketplace API uses for completed orders.
pub const COMPLETED_CODE: &str = "4";
pub const CANCELLED_CODE: &str = "-1";
pub const CANCELLED_LABEL: &str = "İptal Edildi";

/// One marketplace order as stored in the order file.
///
/// Field names follow the upstream API; fields this crate does not model are
/// kept in `extra` and written back untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub no: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub order_number: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub datetime: String,
    #[serde(rename = "store_order_status", default, deserialize_with = "lenient::string")]
    pub status_code: String,
    #[serde(rename = "store_order_status_name", default, deserialize_with = "lenient::string")]
    pub status_label: String,
    #[serde(rename = "entegration", default, deserialize_with = "lenient::string")]
    pub platform: String,
    #[serde(rename = "cargo_company", default, deserialize_with = "lenient::string")]
    pub carrier: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub cargo_code: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub firstname: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub lastname: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub ship_address: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub invoice_address: String,
    #[serde(rename = "grand_total", default, deserialize_with = "lenient::decimal")]
    pub total: Decimal,
    #[serde(rename = "order_product", default)]
    pub items: Vec<LineItem>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One product line inside an order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub barcode: String,
    #[serde(rename = "store_stock_code", default, deserialize_with = "lenient::string")]
    pub stock_code: String,
    #[serde(rename = "picture", default, deserialize_with = "lenient::string")]
    pub picture_url: String,
    #[serde(default = "lenient::one", deserialize_with = "lenient::quantity")]
    pub quantity: u32,
    #[serde(rename = "price", default, deserialize_with = "lenient::decimal")]
    pub unit_price: Decimal,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub collected: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for LineItem {
    fn default() -> Self {
        Self {
            name: String::new(), barcode: String::new(), stock_code: String::new(), picture_url: String::new(),
            quantity: 1, unit_price: Decimal::ZERO, collected: false, extra: Map::new(),
        }
    }
}

impl LineItem {
    pub fn new(name: impl Into<String>, barcode: impl Into<String>, quantity: u32) -> Self {
        Self { name: name.into(), barcode: barcode.into(), quantity: quantity.max(1), ..Self::default() }
    }
    pub fn with_stock_code(mut self, code: impl Into<String>) -> Self { self.stock_code = code.into(); self }
    pub fn with_collected(mut self, collected: bool) -> Self { self.collected = collected; self }
}

/// How long an order has been waiting, as a colour band.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency { Overdue, Late, Morning, Fresh }

impl Urgency {
    pub fn color(&self) -> &'static str {
        match self { Self::Overdue => "#c62828", Self::Late => "#f8bb53", Self::Morning => "#f87171", Self::Fresh => "#5bc980" }
    }
}

/// `-N gün` badge text; empty when the age is unknown.
pub fn days_label(days: Option<i64>) -> String {
    days.map(|d| format!("-{d} gün")).unwrap_or_default()
}

impl Order {
    pub fn new(no: impl Into<String>, datetime: impl Into<String>, status_label: impl Into<String>) -> Self {
        Self { no: Some(no.into()), datetime: datetime.into(), status_label: status_label.into(), ..Self::default() }
    }
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self { self.platform = platform.into(); self }
    pub fn with_carrier(mut self, carrier: impl Into<String>) -> Self { self.carrier = carrier.into(); self }
    pub fn with_status_code(mut self, code: impl Into<String>) -> Self { self.status_code = code.into(); self }
    pub fn with_item(mut self, item: LineItem) -> Self { self.items.push(item); self }

    /// The one identifier used for de-duplication: `no`, then `order_number`, then `id`.
    pub fn canonical_id(&self) -> Option<&str> { self.identifiers().next() }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        [&self.no, &self.order_number, &self.id].into_iter().filter_map(|v| v.as_deref()).filter(|v| !v.is_empty())
    }

    /// True when any identifier field equals `id`.
    pub fn matches_id(&self, id: &str) -> bool {
        let id = id.trim();
        !id.is_empty() && self.identifiers().any(|own| own == id)
    }

    /// Number the marketplace shows its customers, falling back to the canonical id.
    pub fn marketplace_number(&self) -> &str {
        self.order_number.as_deref().or_else(|| self.canonical_id()).unwrap_or_default()
    }

    pub fn customer_name(&self) -> String { format!("{} {}", self.firstname, self.lastname).trim().to_string() }

    pub fn address(&self) -> &str {
        if self.ship_address.trim().is_empty() { &self.invoice_address } else { &self.ship_address }
    }

    pub fn placed_at(&self) -> Option<NaiveDateTime> { parse_timestamp(&self.datetime) }

    pub fn days_elapsed(&self, now: NaiveDateTime) -> Option<i64> {
        self.placed_at().map(|at| (now - at).num_days())
    }

    pub fn urgency(&self, now: NaiveDateTime) -> Urgency {
        let Some(at) = self.placed_at() else { return Urgency::Fresh };
        let hours = (now - at).num_seconds() as f64 / 3600.0;
        if hours >= 24.0 { Urgency::Overdue }
        else if hours >= 16.0 { Urgency::Late }
        else if at.hour() < 12 { Urgency::Morning }
        else { Urgency::Fresh }
    }

    pub fn is_cancelled(&self, keywords: &StatusKeywords) -> bool {
        self.status_code.trim() == CANCELLED_CODE || keywords.is_cancelled_label(&self.status_label)
    }

    pub fn item_count(&self) -> usize { self.items.len() }
    pub fn collected_count(&self) -> usize { self.items.iter().filter(|i| i.collected).count() }
    pub fn all_collected(&self) -> bool { self.items.iter().all(|i| i.collected) }

    /// Sets `collected` on every line with this barcode; returns whether anything changed.
    pub fn set_collected(&mut self, barcode: &str, collected: bool) -> bool {
        let mut changed = false;
        for item in self.items.iter_mut().filter(|i| i.barcode == barcode && i.collected != collected) {
            item.collected = collected;
            changed = true;
        }
        changed
    }

    pub fn cancel(&mut self) -> bool {
        if self.status_code == CANCELLED_CODE && self.status_label == CANCELLED_LABEL { return false; }
        self.status_code = CANCELLED_CODE.to_string();
        self.status_label = CANCELLED_LABEL.to_string();
        true
    }
}
