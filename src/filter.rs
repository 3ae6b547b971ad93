//! Order list filtering.

use crate::domain::aggregates::Order;
use crate::domain::value_objects::{choice, normalize_platform, DateRange, StatusBucket, StatusKeywords};

/// Criteria for the order list. `None` platform/carrier means "all".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub status: StatusBucket,
    pub platform: Option<String>,
    pub carrier: Option<String>,
    pub dates: DateRange,
}

impl OrderFilter {
    pub fn new() -> Self { Self::default() }
    pub fn status(mut self, status: StatusBucket) -> Self { self.status = status; self }
    pub fn platform(mut self, platform: &str) -> Self { self.platform = choice(Some(platform)); self }
    pub fn carrier(mut self, carrier: &str) -> Self { self.carrier = choice(Some(carrier)); self }
    pub fn dates(mut self, dates: DateRange) -> Self { self.dates = dates; self }

    /// Narrows `orders`, applying status, platform, carrier and date predicates in that order.
    pub fn apply(&self, orders: &[Order], keywords: &StatusKeywords) -> Vec<Order> {
        let mut out = orders.to_vec();
        out.retain(|o| self.matches_status(o, keywords));
        out.retain(|o| self.matches_platform(o));
        out.retain(|o| self.matches_carrier(o));
        out.retain(|o| self.matches_dates(o));
        out
    }

    pub fn matches(&self, order: &Order, keywords: &StatusKeywords) -> bool {
        self.matches_status(order, keywords) && self.matches_platform(order) && self.matches_carrier(order) && self.matches_dates(order)
    }

    fn matches_status(&self, order: &Order, keywords: &StatusKeywords) -> bool {
        match self.status {
            StatusBucket::All => !order.is_cancelled(keywords),
            StatusBucket::Cancelled => order.is_cancelled(keywords),
            bucket => keywords.label_in_bucket(bucket, &order.status_label) && !order.is_cancelled(keywords),
        }
    }

    fn matches_platform(&self, order: &Order) -> bool {
        self.platform.as_deref().map_or(true, |p| normalize_platform(&order.platform) == normalize_platform(p))
    }

    fn matches_carrier(&self, order: &Order) -> bool {
        self.carrier.as_deref().map_or(true, |c| order.carrier == c)
    }

    /// Without bounds every order passes; with bounds an unparsable timestamp fails.
    fn matches_dates(&self, order: &Order) -> bool {
        if !self.dates.is_bounded() { return true; }
        order.placed_at().is_some_and(|at| self.dates.contains(at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::CANCELLED_CODE;

    fn orders() -> Vec<Order> {
        vec![
            Order::new("A1", "2024-01-01 10:00:00", "Depoda").with_platform("Trendyol").with_carrier("Yurtiçi"),
            Order::new("B2", "2024-01-02 10:00:00", "İptal Edildi").with_platform("Hepsiburada").with_carrier("Aras"),
            Order::new("C3", "2024-01-03 10:00:00", "Kargoya Verildi").with_platform("trendyol market").with_carrier("Aras"),
            Order::new("D4", "bozuk tarih", "Hazırlanıyor").with_platform("N11").with_carrier("Yurtiçi"),
            Order::new("E5", "2024-01-05 10:00:00", "Teslim Edildi").with_platform("Amazon").with_carrier("MNG"),
            Order::new("F6", "2024-01-06 10:00:00", "iptal talebi").with_platform("Amazon").with_carrier("MNG"),
        ]
    }

    fn ids(orders: &[Order]) -> Vec<&str> { orders.iter().filter_map(Order::canonical_id).collect() }

    #[test]
    fn test_all_hides_cancelled() {
        let kw = StatusKeywords::default();
        let out = OrderFilter::new().apply(&orders(), &kw);
        assert_eq!(ids(&out), vec!["A1", "C3", "D4", "E5"]);
        assert!(out.iter().all(|o| !o.status_label.to_lowercase().contains("iptal")));
    }

    #[test]
    fn test_all_hides_cancel_code_without_label() {
        let kw = StatusKeywords::default();
        let coded = Order::new("G7", "2024-01-01 10:00:00", "Depoda").with_status_code(CANCELLED_CODE);
        assert!(OrderFilter::new().apply(&[coded], &kw).is_empty());
    }

    #[test]
    fn test_named_buckets() {
        let kw = StatusKeywords::default();
        let by = |b| ids(&OrderFilter::new().status(b).apply(&orders(), &kw)).into_iter().map(String::from).collect::<Vec<_>>();
        assert_eq!(by(StatusBucket::Warehouse), vec!["A1"]);
        assert_eq!(by(StatusBucket::InProgress), vec!["D4"]);
        assert_eq!(by(StatusBucket::ReadyToShip), vec!["C3"]);
        assert_eq!(by(StatusBucket::Completed), vec!["E5"]);
        assert_eq!(by(StatusBucket::Cancelled), vec!["B2", "F6"]);
    }

    #[test]
    fn test_platform_is_normalised_and_carrier_exact() {
        let kw = StatusKeywords::default();
        let out = OrderFilter::new().platform("TRENDYOL").apply(&orders(), &kw);
        assert_eq!(ids(&out), vec!["A1", "C3"]);
        let out = OrderFilter::new().carrier("Aras").apply(&orders(), &kw);
        assert_eq!(ids(&out), vec!["C3"]);
        assert!(OrderFilter::new().carrier("aras").apply(&orders(), &kw).is_empty());
        assert_eq!(OrderFilter::new().platform("TÜMÜ").carrier("ALL"), OrderFilter::new());
    }

    #[test]
    fn test_date_bounds_are_inclusive_and_drop_bad_dates() {
        let kw = StatusKeywords::default();
        let dates = DateRange::parse_days(Some("01.01.2024"), Some("03.01.2024"));
        let out = OrderFilter::new().dates(dates).apply(&orders(), &kw);
        assert_eq!(ids(&out), vec!["A1", "C3"]);
        let out = OrderFilter::new().dates(DateRange::default()).apply(&orders(), &kw);
        assert!(ids(&out).contains(&"D4"));
    }

    #[test]
    fn test_matches_agrees_with_apply() {
        let kw = StatusKeywords::default();
        let filter = OrderFilter::new().status(StatusBucket::Completed).platform("amazon").carrier("MNG");
        let all = orders();
        let applied = filter.apply(&all, &kw);
        let matched: Vec<Order> = all.into_iter().filter(|o| filter.matches(o, &kw)).collect();
        assert_eq!(applied, matched);
    }

    #[test]
    fn test_cancel_code_moves_order_to_cancelled_bucket() {
        let kw = StatusKeywords::default();
        let coded = vec![Order::new("X1", "2024-01-01 10:00:00", "Depoda").with_status_code(CANCELLED_CODE)];
        assert!(OrderFilter::new().apply(&coded, &kw).is_empty());
        assert!(OrderFilter::new().status(StatusBucket::Warehouse).apply(&coded, &kw).is_empty());
        assert_eq!(ids(&OrderFilter::new().status(StatusBucket::Cancelled).apply(&coded, &kw)), vec!["X1"]);
    }

    #[test]
    fn test_bucket_without_keywords_matches_nothing() {
        let mut kw = StatusKeywords::default();
        kw.buckets.insert(StatusBucket::Completed, Vec::new());
        assert!(OrderFilter::new().status(StatusBucket::Completed).apply(&orders(), &kw).is_empty());
        kw.buckets.remove(&StatusBucket::Warehouse);
        assert!(OrderFilter::new().status(StatusBucket::Warehouse).apply(&orders(), &kw).is_empty());
    }
}
