//! File-backed order persistence.
//!
//! Three JSON documents live side by side: the active order file, the done
//! set (orders already invoiced) and the archive. Every write replaces the
//! whole document through a temporary file and a rename.

use std::collections::HashSet;
use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::aggregates::{Order, COMPLETED_CODE};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io { path: PathBuf, #[source] source: io::Error },

    #[error("JSON error on {}: {source}", .path.display())]
    Json { path: PathBuf, #[source] source: serde_json::Error },
}

#[derive(Debug, Default, Deserialize)]
struct OrdersDocument { #[serde(default)] orders: Vec<Order> }

#[derive(Serialize)]
struct OrdersDocumentRef<'a> { orders: &'a [Order] }

/// Identifiers of finalized orders, in the order they were finalized.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoneSet { #[serde(default)] orders: Vec<String> }

impl DoneSet {
    pub fn new() -> Self { Self::default() }
    pub fn contains(&self, id: &str) -> bool { self.orders.iter().any(|o| o == id) }
    pub fn len(&self) -> usize { self.orders.len() }
    pub fn is_empty(&self) -> bool { self.orders.is_empty() }
    pub fn iter(&self) -> impl Iterator<Item = &str> { self.orders.iter().map(String::as_str) }

    /// Returns false when `id` was already present.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.contains(&id) { return false; }
        self.orders.push(id);
        true
    }

    /// True when any of the order's identifiers has been finalized.
    pub fn covers(&self, order: &Order) -> bool { order.identifiers().any(|id| self.contains(id)) }
}

impl<S: Into<String>> FromIterator<S> for DoneSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for id in iter { set.insert(id); }
        set
    }
}

/// Folds freshly fetched orders into the known ones.
///
/// Known orders are never replaced, so local `collected` edits survive a
/// refresh. Fetched orders without any identifier are dropped. Anything in
/// `done` is removed from the result, old or new.
pub fn merge(fetched: Vec<Order>, existing: Vec<Order>, done: &DoneSet) -> Vec<Order> {
    let mut known: HashSet<String> = existing.iter().filter_map(Order::canonical_id).map(str::to_owned).collect();
    let mut merged = existing;
    for order in fetched {
        let Some(id) = order.canonical_id().map(str::to_owned) else {
            warn!("dropping fetched order without an identifier");
            continue;
        };
        if known.insert(id) { merged.push(order); }
    }
    merged.retain(|o| !done.covers(o));
    merged
}

/// Splits orders into `(keep, archive)`.
///
/// Completed orders at least `retention_days` old are archived; unparsable
/// timestamps are always kept.
pub fn partition_for_archive(orders: Vec<Order>, retention_days: i64, now: NaiveDateTime) -> (Vec<Order>, Vec<Order>) {
    orders.into_iter().partition(|o| {
        let expired = o.status_code.trim() == COMPLETED_CODE && o.days_elapsed(now).is_some_and(|d| d >= retention_days);
        !expired
    })
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ArchiveReport { pub kept: usize, pub archived: usize }

#[derive(Clone, Debug)]
pub struct StorePaths { pub orders: PathBuf, pub done: PathBuf, pub archive: PathBuf }

impl StorePaths {
    /// Default file names inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self { orders: dir.join("output.json"), done: dir.join("done_orders.json"), archive: dir.join("archive.json") }
    }
}

#[derive(Clone, Debug)]
pub struct OrderStore { paths: StorePaths }

impl OrderStore {
    pub fn new(paths: StorePaths) -> Self { Self { paths } }
    pub fn paths(&self) -> &StorePaths { &self.paths }

    /// Reads the order file. A missing or corrupt file reads as no orders.
    pub fn load(&self) -> Vec<Order> {
        match read_json::<OrdersDocument>(&self.paths.orders) {
            Ok(doc) => doc.map(|d| d.orders).unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "order file unreadable, treating as empty");
                Vec::new()
            }
        }
    }

    pub fn save(&self, orders: &[Order]) -> Result<(), StoreError> {
        write_json(&self.paths.orders, &OrdersDocumentRef { orders })
    }

    pub fn load_done(&self) -> DoneSet {
        match read_json::<DoneSet>(&self.paths.done) {
            Ok(done) => done.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "done set unreadable, treating as empty");
                DoneSet::new()
            }
        }
    }

    /// Records `id` as finalized. Idempotent; returns whether it was new.
    pub fn mark_done(&self, id: &str) -> Result<bool, StoreError> {
        let mut done = self.load_done();
        if !done.insert(id.trim()) { return Ok(false); }
        write_json(&self.paths.done, &done)?;
        Ok(true)
    }

    /// Merges `fetched` into the stored orders and saves. Returns the stored count.
    pub fn merge_and_save(&self, fetched: Vec<Order>) -> Result<usize, StoreError> {
        let merged = merge(fetched, self.load(), &self.load_done());
        self.save(&merged)?;
        Ok(merged.len())
    }

    /// Loads, applies `mutate`, and saves only when it reports a change.
    pub fn update<F>(&self, mutate: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut Vec<Order>) -> bool,
    {
        let mut orders = self.load();
        if !mutate(&mut orders) { return Ok(false); }
        self.save(&orders)?;
        Ok(true)
    }

    /// Removes the order matching `id` on any identifier field.
    pub fn delete(&self, id: &str) -> Result<Option<Order>, StoreError> {
        let (removed, kept): (Vec<Order>, Vec<Order>) = self.load().into_iter().partition(|o| o.matches_id(id));
        let Some(first) = removed.into_iter().next() else {
            warn!(order = id, "order not found, nothing deleted");
            return Ok(None);
        };
        self.save(&kept)?;
        info!(order = id, "order deleted");
        Ok(Some(first))
    }

    pub fn archive(&self, retention_days: i64, now: NaiveDateTime) -> Result<ArchiveReport, StoreError> {
        let (keep, archive) = partition_for_archive(self.load(), retention_days, now);
        // The archive must land before the orders leave the active file.
        write_json(&self.paths.archive, &OrdersDocumentRef { orders: &archive })?;
        self.save(&keep)?;
        info!(kept = keep.len(), archived = archive.len(), retention_days, "orders archived");
        Ok(ArchiveReport { kept: keep.len(), archived: archive.len() })
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(StoreError::Io { path: path.to_owned(), source }),
    };
    serde_json::from_str(&raw).map(Some).map_err(|source| StoreError::Json { path: path.to_owned(), source })
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let body = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Json { path: path.to_owned(), source })?;
    write_atomic(path, &body).map_err(|source| StoreError::Io { path: path.to_owned(), source })
}

/// Writes `bytes` to a temporary file beside `path` and renames it into place.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    let mut temp_file = NamedTempFile::new_in(parent)?;
    temp_file.write_all(bytes)?;
    temp_file.as_file().sync_all()?;
    temp_file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::LineItem;
    use crate::domain::value_objects::parse_timestamp;

    fn order(id: &str) -> Order {
        Order::new(id, "2024-01-01 10:00:00", "Depoda").with_item(LineItem::new("Widget", "123", 2))
    }

    fn ids(orders: &[Order]) -> Vec<&str> { orders.iter().filter_map(Order::canonical_id).collect() }

    fn store() -> (tempfile::TempDir, OrderStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = OrderStore::new(StorePaths::in_dir(dir.path()));
        (dir, store)
    }

    #[test]
    fn test_merge_appends_unknown_and_keeps_known() {
        let mut local = order("A1");
        local.set_collected("123", true);
        let merged = merge(vec![order("A1"), order("B2"), order("B2")], vec![local], &DoneSet::new());
        assert_eq!(ids(&merged), vec!["A1", "B2"]);
        assert!(merged[0].items[0].collected);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let done: DoneSet = ["C3"].into_iter().collect();
        let existing = vec![order("A1")];
        let fetched = vec![order("B2"), order("C3"), order("A1")];
        let once = merge(fetched.clone(), existing, &done);
        let twice = merge(fetched, once.clone(), &done);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_drops_done_orders_old_and_new() {
        let mut by_number = order("D4");
        by_number.no = None;
        by_number.order_number = Some("HB-9".into());
        let done: DoneSet = ["A1", "HB-9", "B2"].into_iter().collect();
        let merged = merge(vec![order("B2"), by_number, order("E5")], vec![order("A1")], &done);
        assert_eq!(ids(&merged), vec!["E5"]);
    }

    #[test]
    fn test_merge_drops_orders_without_identifier() {
        let mut anonymous = order("X");
        anonymous.no = None;
        assert!(merge(vec![anonymous], vec![], &DoneSet::new()).is_empty());
    }

    #[test]
    fn test_load_missing_or_corrupt_is_empty() {
        let (_dir, store) = store();
        assert!(store.load().is_empty());
        fs::write(&store.paths().orders, "{ not json").unwrap();
        assert!(store.load().is_empty());
        assert!(store.load_done().is_empty());
    }

    #[test]
    fn test_save_replaces_whole_document() {
        let (_dir, store) = store();
        store.save(&[order("A1"), order("B2")]).unwrap();
        store.save(&[order("C3")]).unwrap();
        assert_eq!(ids(&store.load()), vec!["C3"]);
        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&store.paths().orders).unwrap()).unwrap();
        assert!(raw["orders"].is_array());
    }

    #[test]
    fn test_delete_hit_and_miss() {
        let (_dir, store) = store();
        store.save(&[order("A1"), order("B2")]).unwrap();
        assert!(store.delete("Z9").unwrap().is_none());
        assert_eq!(ids(&store.load()), vec!["A1", "B2"]);
        assert_eq!(store.delete("A1").unwrap().and_then(|o| o.no), Some("A1".to_string()));
        assert_eq!(ids(&store.load()), vec!["B2"]);
    }

    #[test]
    fn test_delete_matches_order_number() {
        let (_dir, store) = store();
        let mut hb = order("A1");
        hb.order_number = Some("HB-1".into());
        store.save(&[hb, order("B2")]).unwrap();
        assert!(store.delete("HB-1").unwrap().is_some());
        assert_eq!(ids(&store.load()), vec!["B2"]);
    }

    #[test]
    fn test_mark_done_is_idempotent() {
        let (_dir, store) = store();
        assert!(store.mark_done("A1").unwrap());
        assert!(!store.mark_done("A1").unwrap());
        assert!(store.mark_done("B2").unwrap());
        assert_eq!(store.load_done().iter().collect::<Vec<_>>(), vec!["A1", "B2"]);
    }

    #[test]
    fn test_merge_and_save_respects_done_file() {
        let (_dir, store) = store();
        store.save(&[order("A1")]).unwrap();
        store.mark_done("B2").unwrap();
        assert_eq!(store.merge_and_save(vec![order("B2"), order("C3")]).unwrap(), 2);
        assert_eq!(ids(&store.load()), vec!["A1", "C3"]);
    }

    #[test]
    fn test_update_skips_save_without_change() {
        let (_dir, store) = store();
        assert!(!store.update(|_| false).unwrap());
        assert!(!store.paths().orders.exists());
        assert!(store.update(|orders| { orders.push(order("A1")); true }).unwrap());
        assert_eq!(ids(&store.load()), vec!["A1"]);
    }

    #[test]
    fn test_archive_partitions_completed_and_old() {
        let (_dir, store) = store();
        let now = parse_timestamp("2024-03-01 12:00:00").unwrap();
        let old_done = Order::new("A1", "2024-01-01 10:00:00", "Teslim Edildi").with_status_code("4");
        let fresh_done = Order::new("B2", "2024-02-20 10:00:00", "Teslim Edildi").with_status_code("4");
        let old_open = Order::new("C3", "2024-01-01 10:00:00", "Depoda").with_status_code("1");
        let bad_date = Order::new("D4", "yesterday", "Teslim Edildi").with_status_code("4");
        store.save(&[old_done, fresh_done, old_open, bad_date]).unwrap();

        let report = store.archive(30, now).unwrap();
        assert_eq!(report, ArchiveReport { kept: 3, archived: 1 });
        assert_eq!(ids(&store.load()), vec!["B2", "C3", "D4"]);
        let archived: OrdersDocument = serde_json::from_str(&fs::read_to_string(&store.paths().archive).unwrap()).unwrap();
        assert_eq!(ids(&archived.orders), vec!["A1"]);
    }

    #[test]
    fn test_archive_boundary_is_inclusive() {
        let now = parse_timestamp("2024-01-31 10:00:00").unwrap();
        let o = Order::new("A1", "2024-01-01 10:00:00", "").with_status_code("4");
        let (keep, archive) = partition_for_archive(vec![o], 30, now);
        assert!(keep.is_empty());
        assert_eq!(archive.len(), 1);
    }

    #[test]
    fn test_archive_failure_keeps_active_orders() {
        let (dir, store) = store();
        let paths = StorePaths { archive: dir.path().join("archive_dir"), ..store.paths().clone() };
        fs::create_dir(&paths.archive).unwrap();
        fs::write(paths.archive.join("occupied"), "x").unwrap();
        let store = OrderStore::new(paths);
        let now = parse_timestamp("2024-03-01 12:00:00").unwrap();
        store.save(&[Order::new("A1", "2024-01-01 10:00:00", "Teslim Edildi").with_status_code("4"), order("B2")]).unwrap();

        assert!(store.archive(30, now).is_err());
        assert_eq!(ids(&store.load()), vec!["A1", "B2"]);
    }

    #[test]
    fn test_failed_write_leaves_previous_document() {
        let (dir, store) = store();
        store.save(&[order("A1")]).unwrap();
        let blocked = OrderStore::new(StorePaths { done: dir.path().join("done_dir"), ..store.paths().clone() });
        fs::create_dir(&blocked.paths().done).unwrap();
        fs::write(blocked.paths().done.join("occupied"), "x").unwrap();

        assert!(matches!(blocked.mark_done("A1"), Err(StoreError::Io { .. })));
        assert_eq!(ids(&store.load()), vec!["A1"]);
        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap()
            .filter_map(|e| e.ok()).filter(|e| e.file_name().to_string_lossy().starts_with(".tmp")).collect();
        assert!(leftovers.is_empty());
    }
}
