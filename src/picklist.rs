//! Pick list: open order lines grouped by product.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::domain::aggregates::{days_label, Order};
use crate::domain::value_objects::{choice, fold_case, normalize_platform, DateRange, StatusKeywords};
use crate::locations::LocationRegistry;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PicklistQuery {
    pub platform: Option<String>,
    pub dates: DateRange,
    pub search: Option<String>,
}

impl PicklistQuery {
    pub fn new() -> Self { Self::default() }
    pub fn platform(mut self, platform: &str) -> Self { self.platform = choice(Some(platform)); self }
    pub fn dates(mut self, dates: DateRange) -> Self { self.dates = dates; self }
    pub fn search(mut self, term: &str) -> Self {
        let term = term.trim();
        self.search = (!term.is_empty()).then(|| term.to_string());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlatformShare { pub quantity: u32, pub order_number: String }

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Contribution { pub order_id: String, pub collected: bool }

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PicklistEntry {
    pub name: String,
    pub barcode: String,
    pub stock_code: String,
    pub picture_url: String,
    pub total_quantity: u32,
    /// Age of the newest contributing order.
    pub days_elapsed: Option<i64>,
    pub days_label: String,
    pub platforms: BTreeMap<String, Vec<PlatformShare>>,
    pub location: Option<String>,
    pub contributions: Vec<Contribution>,
    pub fully_collected: bool,
}

impl PicklistEntry {
    fn matches_search(&self, term: &str) -> bool {
        let term = fold_case(term);
        [&self.name, &self.barcode, &self.stock_code].into_iter().any(|f| fold_case(f).contains(&term))
    }
}

/// Groups the line items of open orders by `(name, barcode)`.
///
/// Orders with a terminal status are skipped. Unparsable order dates pass the
/// date bounds. Entries come back sorted by name, case-insensitively.
pub fn aggregate(
    orders: &[Order],
    query: &PicklistQuery,
    keywords: &StatusKeywords,
    locations: &LocationRegistry,
    now: NaiveDateTime,
) -> Vec<PicklistEntry> {
    let wanted_platform = query.platform.as_deref().map(normalize_platform);
    let mut entries: Vec<PicklistEntry> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    let open = orders.iter()
        .filter(|o| !keywords.is_terminal_label(&o.status_label))
        .filter(|o| wanted_platform.as_ref().map_or(true, |p| normalize_platform(&o.platform) == *p))
        .filter(|o| o.placed_at().map_or(true, |at| query.dates.contains(at)));

    for order in open {
        let days = order.days_elapsed(now);
        let bucket = normalize_platform(&order.platform).to_uppercase();
        let order_id = order.canonical_id().unwrap_or_default().to_string();
        for item in &order.items {
            let key = (item.name.clone(), item.barcode.clone());
            let slot = *index.entry(key).or_insert_with(|| {
                entries.push(PicklistEntry {
                    name: item.name.clone(),
                    barcode: item.barcode.clone(),
                    stock_code: item.stock_code.clone(),
                    picture_url: item.picture_url.clone(),
                    total_quantity: 0,
                    days_elapsed: None,
                    days_label: String::new(),
                    platforms: BTreeMap::new(),
                    location: None,
                    contributions: Vec::new(),
                    fully_collected: false,
                });
                entries.len() - 1
            });
            let entry = &mut entries[slot];
            entry.total_quantity = entry.total_quantity.saturating_add(item.quantity);
            entry.days_elapsed = match (entry.days_elapsed, days) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
            if !bucket.is_empty() {
                entry.platforms.entry(bucket.clone()).or_default()
                    .push(PlatformShare { quantity: item.quantity, order_number: order.marketplace_number().to_string() });
            }
            entry.contributions.push(Contribution { order_id: order_id.clone(), collected: item.collected });
        }
    }

    entries.sort_by_cached_key(|e| fold_case(&e.name));
    if let Some(term) = query.search.as_deref() {
        entries.retain(|e| e.matches_search(term));
    }
    for entry in &mut entries {
        entry.fully_collected = entry.contributions.iter().all(|c| c.collected);
        entry.days_label = days_label(entry.days_elapsed);
        entry.location = locations.get(&entry.name).map(str::to_owned);
    }
    entries
}

/// Drops entries with nothing left to collect.
pub fn outstanding(entries: Vec<PicklistEntry>) -> Vec<PicklistEntry> {
    entries.into_iter().filter(|e| !e.fully_collected).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::LineItem;
    use crate::domain::value_objects::parse_timestamp;

    fn now() -> NaiveDateTime { parse_timestamp("2024-01-05 12:00:00").unwrap() }

    fn run(orders: &[Order], query: &PicklistQuery) -> Vec<PicklistEntry> {
        aggregate(orders, query, &StatusKeywords::default(), &LocationRegistry::new(), now())
    }

    #[test]
    fn test_quantities_sum_across_orders() {
        let orders = vec![
            Order::new("1", "2024-01-01 10:00:00", "Depoda").with_platform("Trendyol").with_item(LineItem::new("Widget", "123", 2)),
            Order::new("2", "2024-01-03 10:00:00", "Depoda").with_platform("Hepsiburada").with_item(LineItem::new("Widget", "123", 3)),
        ];
        let entries = run(&orders, &PicklistQuery::new());
        assert_eq!(entries.len(), 1);
        let widget = &entries[0];
        assert_eq!(widget.total_quantity, 5);
        assert_eq!(widget.platforms["TRENDYOL"], vec![PlatformShare { quantity: 2, order_number: "1".into() }]);
        assert_eq!(widget.platforms["HEPSIBURADA"][0].quantity, 3);
        let bucket_sum: u32 = widget.platforms.values().flatten().map(|s| s.quantity).sum();
        assert_eq!(bucket_sum, 5);
        assert_eq!(widget.days_elapsed, Some(2));
        assert_eq!(widget.days_label, "-2 gün");
    }

    #[test]
    fn test_same_platform_shares_one_bucket() {
        let orders = vec![
            Order::new("1", "2024-01-01 10:00:00", "Depoda").with_platform("trendyol").with_item(LineItem::new("Widget", "123", 2)),
            Order::new("2", "2024-01-02 10:00:00", "Depoda").with_platform("Trendyol Mağaza").with_item(LineItem::new("Widget", "123", 3)),
        ];
        let entries = run(&orders, &PicklistQuery::new());
        assert_eq!(entries[0].platforms.len(), 1);
        assert_eq!(entries[0].platforms["TRENDYOL"].len(), 2);
    }

    #[test]
    fn test_fully_collected_requires_every_line() {
        let mut orders = vec![
            Order::new("1", "2024-01-01 10:00:00", "Depoda").with_item(LineItem::new("Widget", "123", 2).with_collected(true)),
            Order::new("2", "2024-01-02 10:00:00", "Depoda").with_item(LineItem::new("Widget", "123", 3).with_collected(true)),
        ];
        assert!(run(&orders, &PicklistQuery::new())[0].fully_collected);
        orders[1].set_collected("123", false);
        let entries = run(&orders, &PicklistQuery::new());
        assert!(!entries[0].fully_collected);
        assert_eq!(outstanding(entries).len(), 1);
    }

    #[test]
    fn test_terminal_orders_are_skipped() {
        let orders = vec![
            Order::new("1", "2024-01-01 10:00:00", "Teslim Edildi").with_item(LineItem::new("Widget", "123", 2)),
            Order::new("2", "2024-01-01 10:00:00", "İptal Edildi").with_item(LineItem::new("Gadget", "456", 1)),
            Order::new("3", "2024-01-01 10:00:00", "Depoda").with_item(LineItem::new("Kalem", "789", 1)),
        ];
        let names: Vec<String> = run(&orders, &PicklistQuery::new()).into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["Kalem"]);
    }

    #[test]
    fn test_filters_search_and_sorting() {
        let orders = vec![
            Order::new("1", "2024-01-01 10:00:00", "Depoda").with_platform("Amazon")
                .with_item(LineItem::new("zımba", "900", 1))
                .with_item(LineItem::new("Ataş", "901", 1).with_stock_code("OFIS-7")),
            Order::new("2", "tarih yok", "Depoda").with_platform("Amazon").with_item(LineItem::new("Bant", "902", 1)),
            Order::new("3", "2023-12-01 10:00:00", "Depoda").with_platform("Amazon").with_item(LineItem::new("Defter", "903", 1)),
            Order::new("4", "2024-01-01 10:00:00", "Depoda").with_platform("N11").with_item(LineItem::new("Silgi", "904", 1)),
        ];
        let query = PicklistQuery::new().platform("amazon").dates(DateRange::parse_days(Some("01.01.2024"), None));
        let entries = run(&orders, &query);
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Ataş", "Bant", "zımba"]);
        assert_eq!(entries[1].days_elapsed, None);
        assert_eq!(entries[1].days_label, "");

        let found = run(&orders, &query.clone().search("ofis"));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Ataş");
    }

    #[test]
    fn test_location_attached_and_empty_platform_unbucketed() {
        let mut locations = LocationRegistry::new();
        locations.set("Widget", "A-3-2");
        let orders = vec![Order::new("1", "2024-01-01 10:00:00", "Depoda").with_item(LineItem::new("Widget", "123", 4))];
        let entries = aggregate(&orders, &PicklistQuery::new(), &StatusKeywords::default(), &locations, now());
        assert_eq!(entries[0].location.as_deref(), Some("A-3-2"));
        assert_eq!(entries[0].total_quantity, 4);
        assert!(entries[0].platforms.is_empty());
    }

    #[test]
    fn test_total_quantity_saturates() {
        let orders = vec![
            Order::new("1", "2024-01-01 10:00:00", "Depoda").with_item(LineItem::new("Widget", "123", u32::MAX)),
            Order::new("2", "2024-01-02 10:00:00", "Depoda").with_item(LineItem::new("Widget", "123", 5)),
        ];
        assert_eq!(run(&orders, &PicklistQuery::new())[0].total_quantity, u32::MAX);
    }
}
