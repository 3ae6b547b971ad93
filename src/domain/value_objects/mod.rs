//! Value Objects for warehouse orders

pub(crate) mod lenient;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Timestamp format used by the marketplace API and the order file.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Day format typed into date filters.
pub const DAY_FORMAT: &str = "%d.%m.%Y";

/// Marketplaces recognised by [`normalize_platform`], first match wins.
pub const KNOWN_PLATFORMS: [&str; 7] = ["trendyol", "hepsiburada", "amazon", "n11", "ciceksepeti", "pazarama", "idefix"];

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT).ok()
}

pub fn parse_day(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DAY_FORMAT).ok()
}

/// Lower-cases `s`, folding the Turkish dotted capital `İ` to a plain `i`.
pub fn fold_case(s: &str) -> String {
    s.chars().flat_map(|c| if c == 'İ' { 'i'.to_lowercase() } else { c.to_lowercase() }).collect()
}

pub fn normalize_platform(raw: &str) -> String {
    let lowered = fold_case(raw.trim());
    KNOWN_PLATFORMS.iter().find(|p| lowered.contains(*p)).map(|p| p.to_string()).unwrap_or(lowered)
}

/// `ALL` (or the Turkish `TÜMÜ`) and blank input mean "no filter".
pub fn is_all(raw: &str) -> bool {
    let t = raw.trim();
    t.is_empty() || t.eq_ignore_ascii_case("all") || t == "TÜMÜ"
}

/// Turns a filter choice into `None` when it is the "all" sentinel.
pub fn choice(raw: Option<&str>) -> Option<String> {
    raw.filter(|r| !is_all(r)).map(|r| r.trim().to_string())
}

/// Status bucket selectable in the order list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusBucket { #[default] All, Warehouse, InProgress, ReadyToShip, Completed, Cancelled }

impl StatusBucket {
    pub const NAMED: [StatusBucket; 5] = [Self::Warehouse, Self::InProgress, Self::ReadyToShip, Self::Completed, Self::Cancelled];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Warehouse => "warehouse",
            Self::InProgress => "in_progress",
            Self::ReadyToShip => "ready_to_ship",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Label shown by the warehouse front ends.
    pub fn label(&self) -> &'static str {
        match self {
            Self::All => "TÜMÜ",
            Self::Warehouse => "Depodaki Siparişler",
            Self::InProgress => "Devam Eden Siparişler",
            Self::ReadyToShip => "Kargoya Verilecek Siparişler",
            Self::Completed => "Tamamlanan Siparişler",
            Self::Cancelled => "İptal Edilen Siparişler",
        }
    }
}

impl fmt::Display for StatusBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for StatusBucket {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if is_all(s) { return Ok(Self::All); }
        let wanted = s.trim();
        Self::NAMED.into_iter()
            .find(|b| b.as_str().eq_ignore_ascii_case(wanted) || b.label() == wanted)
            .ok_or_else(|| UnknownStatus(wanted.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub struct UnknownStatus(pub String);
impl std::error::Error for UnknownStatus {}
impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "unknown status filter: {}", self.0) }
}

/// Keyword lists matched (case-insensitively, by substring) against status labels.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusKeywords {
    /// Any of these marks an order as cancelled; `All` hides such orders.
    pub cancelled: Vec<String>,
    /// Per-bucket keywords for the named status filters.
    pub buckets: BTreeMap<StatusBucket, Vec<String>>,
    /// Orders past warehouse work; the pick list skips them.
    pub terminal: Vec<String>,
}

impl Default for StatusKeywords {
    fn default() -> Self {
        let words = |ws: &[&str]| ws.iter().map(|w| w.to_string()).collect::<Vec<_>>();
        let buckets = BTreeMap::from([
            (StatusBucket::Warehouse, words(&["Depoda", "Depodaki Siparişler"])),
            (StatusBucket::InProgress, words(&["Devam Ediyor", "Hazırlanıyor"])),
            (StatusBucket::ReadyToShip, words(&["Kargoya Verilecek", "Kargoya Verildi"])),
            (StatusBucket::Completed, words(&["Teslim Edildi", "Tamamlandı", "Tamamlanan"])),
            (StatusBucket::Cancelled, words(&["İptal", "İptal Edildi"])),
        ]);
        Self {
            cancelled: words(&["iptal"]),
            buckets,
            terminal: words(&["tamamlandı", "teslim edildi", "iptal", "iptal edildi"]),
        }
    }
}

impl StatusKeywords {
    pub fn bucket(&self, bucket: StatusBucket) -> &[String] {
        self.buckets.get(&bucket).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn label_in_bucket(&self, bucket: StatusBucket, label: &str) -> bool {
        contains_any(label, self.bucket(bucket))
    }

    pub fn is_cancelled_label(&self, label: &str) -> bool { contains_any(label, &self.cancelled) }
    pub fn is_terminal_label(&self, label: &str) -> bool { contains_any(label, &self.terminal) }
}

fn contains_any(label: &str, keywords: &[String]) -> bool {
    let label = fold_case(label);
    keywords.iter().any(|k| label.contains(&fold_case(k)))
}

/// Inclusive timestamp bounds; an open side accepts everything.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DateRange { pub start: Option<NaiveDateTime>, pub end: Option<NaiveDateTime> }

impl DateRange {
    pub fn new(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Self { Self { start, end } }

    /// Day-granular bounds; the end day is included in full.
    pub fn from_days(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self {
            start: start.map(|d| d.and_time(NaiveTime::MIN)),
            end: end.and_then(|d| d.and_hms_opt(23, 59, 59)),
        }
    }

    /// Parses `DD.MM.YYYY` inputs. Blank or invalid text leaves that side open.
    pub fn parse_days(start: Option<&str>, end: Option<&str>) -> Self {
        Self::from_days(start.and_then(parse_day), end.and_then(parse_day))
    }

    pub fn is_bounded(&self) -> bool { self.start.is_some() || self.end.is_some() }

    pub fn contains(&self, at: NaiveDateTime) -> bool {
        self.start.map_or(true, |s| at >= s) && self.end.map_or(true, |e| at <= e)
    }
}
