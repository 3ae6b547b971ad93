//! Warehouse operations used by the front ends.
//!
//! Every failure degrades: reads fall back to empty values, missing orders
//! are reported as [`Outcome::NotFound`], failed writes as
//! [`Outcome::NotPersisted`]. Mutations run one at a time.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::domain::aggregates::{days_label, Order, Urgency};
use crate::domain::value_objects::StatusKeywords;
use crate::fetch::{fetch_all, OrderSource};
use crate::filter::OrderFilter;
use crate::locations::{Location, LocationRegistry};
use crate::picklist::{aggregate, PicklistEntry, PicklistQuery};
use crate::store::{ArchiveReport, OrderStore};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome { Applied, Unchanged, NotFound, NotPersisted }

#[derive(Clone, Debug, PartialEq)]
pub enum Finalize {
    /// Removed and recorded as done; the order is returned for printing.
    Done(Order),
    Incomplete { collected: usize, total: usize },
    NotFound,
    NotPersisted,
}

/// An order with the derived fields list screens show.
#[derive(Clone, Debug, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub customer: String,
    pub days_label: String,
    pub urgency: Urgency,
    pub color: &'static str,
    pub collected_count: usize,
    pub item_count: usize,
}

impl OrderView {
    pub fn new(order: Order, now: NaiveDateTime) -> Self {
        let urgency = order.urgency(now);
        Self {
            customer: order.customer_name(),
            days_label: days_label(order.days_elapsed(now)),
            urgency,
            color: urgency.color(),
            collected_count: order.collected_count(),
            item_count: order.item_count(),
            order,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Facets { pub platforms: Vec<String>, pub carriers: Vec<String> }

fn local_now() -> NaiveDateTime { Local::now().naive_local() }

pub struct Warehouse {
    store: OrderStore,
    locations_path: PathBuf,
    keywords: StatusKeywords,
    write_lock: Mutex<()>,
    clock: fn() -> NaiveDateTime,
}

impl Warehouse {
    pub fn new(store: OrderStore, locations_path: impl Into<PathBuf>, keywords: StatusKeywords) -> Self {
        Self { store, locations_path: locations_path.into(), keywords, write_lock: Mutex::new(()), clock: local_now }
    }

    /// Builds the service from paths and keyword file named in `config`.
    pub fn from_config(config: &Config) -> crate::Result<Self> {
        let keywords = config.status_keywords()?;
        Ok(Self::new(OrderStore::new(config.store.clone()), config.locations_path.clone(), keywords))
    }

    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self { self.clock = clock; self }
    pub fn store(&self) -> &OrderStore { &self.store }
    pub fn keywords(&self) -> &StatusKeywords { &self.keywords }
    fn now(&self) -> NaiveDateTime { (self.clock)() }

    fn lock(&self) -> MutexGuard<'_, ()> { self.write_lock.lock().unwrap_or_else(PoisonError::into_inner) }

    /// Pulls every page from `source` and merges it into the store.
    /// Returns how many orders were retrieved; 0 leaves the store untouched.
    pub async fn fetch_and_merge<S: OrderSource + Sync>(&self, source: &S, page_size: usize) -> usize {
        let fetched = fetch_all(source, page_size).await;
        if fetched.is_empty() {
            info!("no orders retrieved, store left as is");
            return 0;
        }
        let count = fetched.len();
        let _guard = self.lock();
        match self.store.merge_and_save(fetched) {
            Ok(stored) => {
                info!(fetched = count, stored, "orders merged");
                count
            }
            Err(e) => {
                error!(error = %e, "saving merged orders failed");
                0
            }
        }
    }

    pub fn list_orders(&self, filter: &OrderFilter) -> Vec<OrderView> {
        let now = self.now();
        filter.apply(&self.store.load(), &self.keywords).into_iter().map(|o| OrderView::new(o, now)).collect()
    }

    pub fn order(&self, id: &str) -> Option<Order> {
        self.store.load().into_iter().find(|o| o.matches_id(id))
    }

    pub fn build_picklist(&self, query: &PicklistQuery) -> Vec<PicklistEntry> {
        let locations = LocationRegistry::load(&self.locations_path);
        aggregate(&self.store.load(), query, &self.keywords, &locations, self.now())
    }

    /// Sets `collected` on lines with `barcode`: inside the order matching
    /// `scope`, or across every order when no scope is given.
    pub fn toggle_collected(&self, barcode: &str, collected: bool, scope: Option<&str>) -> Outcome {
        let _guard = self.lock();
        let mut found = false;
        let result = self.store.update(|orders| {
            let mut changed = false;
            for order in orders.iter_mut().filter(|o| scope.map_or(true, |id| o.matches_id(id))) {
                found |= order.items.iter().any(|i| i.barcode == barcode);
                changed |= order.set_collected(barcode, collected);
            }
            changed
        });
        match result {
            Ok(true) => {
                info!(barcode, collected, order = scope.unwrap_or("*"), "collected flag updated");
                Outcome::Applied
            }
            Ok(false) if found => Outcome::Unchanged,
            Ok(false) => {
                warn!(barcode, order = scope.unwrap_or("*"), "no line item with this barcode");
                Outcome::NotFound
            }
            Err(e) => {
                error!(error = %e, barcode, "saving collected flag failed");
                Outcome::NotPersisted
            }
        }
    }

    pub fn cancel_order(&self, id: &str) -> Outcome {
        let _guard = self.lock();
        let mut found = false;
        let result = self.store.update(|orders| {
            let mut changed = false;
            for order in orders.iter_mut().filter(|o| o.matches_id(id)) {
                found = true;
                changed |= order.cancel();
            }
            changed
        });
        match result {
            Ok(true) => {
                info!(order = id, "order cancelled");
                Outcome::Applied
            }
            Ok(false) if found => Outcome::Unchanged,
            Ok(false) => {
                warn!(order = id, "order not found, nothing cancelled");
                Outcome::NotFound
            }
            Err(e) => {
                error!(error = %e, order = id, "saving cancellation failed");
                Outcome::NotPersisted
            }
        }
    }

    /// Records a fully collected order as done and removes it from the store.
    pub fn finalize_order(&self, id: &str) -> Finalize {
        let _guard = self.lock();
        let Some(order) = self.store.load().into_iter().find(|o| o.matches_id(id)) else {
            warn!(order = id, "order not found, nothing finalized");
            return Finalize::NotFound;
        };
        if !order.all_collected() {
            return Finalize::Incomplete { collected: order.collected_count(), total: order.item_count() };
        }
        let done_id = order.canonical_id().unwrap_or(id).to_string();
        if let Err(e) = self.store.mark_done(&done_id) {
            error!(error = %e, order = %done_id, "recording finalized order failed");
            return Finalize::NotPersisted;
        }
        match self.store.delete(&done_id) {
            Ok(_) => {
                info!(order = %done_id, "order finalized");
                Finalize::Done(order)
            }
            Err(e) => {
                error!(error = %e, order = %done_id, "removing finalized order failed");
                Finalize::NotPersisted
            }
        }
    }

    pub fn archive(&self, retention_days: i64) -> Option<ArchiveReport> {
        let _guard = self.lock();
        self.store.archive(retention_days, self.now())
            .map_err(|e| error!(error = %e, "archiving failed"))
            .ok()
    }

    pub fn location(&self, name: &str) -> Option<String> {
        LocationRegistry::load(&self.locations_path).get(name).map(str::to_owned)
    }

    pub fn set_location(&self, name: &str, location: &str) -> Outcome {
        if name.trim().is_empty() { return Outcome::Unchanged; }
        let _guard = self.lock();
        let mut registry = LocationRegistry::load(&self.locations_path);
        if registry.get(name) == Some(location.trim()) { return Outcome::Unchanged; }
        registry.set(name, location);
        match registry.save(&self.locations_path) {
            Ok(()) => {
                info!(product = name.trim(), location = location.trim(), "location saved");
                Outcome::Applied
            }
            Err(e) => {
                error!(error = %e, "saving locations failed");
                Outcome::NotPersisted
            }
        }
    }

    pub fn locations(&self, query: &str) -> Vec<Location> {
        LocationRegistry::load(&self.locations_path).search(query)
    }

    /// Merges CSV rows into the registry. `None` when the result could not be saved.
    pub fn import_locations(&self, csv_text: &str) -> Option<usize> {
        let _guard = self.lock();
        let mut registry = LocationRegistry::load(&self.locations_path);
        let applied = registry.import_csv(csv_text);
        match registry.save(&self.locations_path) {
            Ok(()) => {
                info!(applied, total = registry.len(), "locations imported");
                Some(applied)
            }
            Err(e) => {
                error!(error = %e, "saving imported locations failed");
                None
            }
        }
    }

    pub fn export_locations(&self) -> String {
        LocationRegistry::load(&self.locations_path).to_csv().unwrap_or_else(|e| {
            error!(error = %e, "exporting locations failed");
            String::new()
        })
    }

    pub fn facets(&self) -> Facets {
        let orders = self.store.load();
        let distinct = |field: fn(&Order) -> &str| -> Vec<String> {
            orders.iter().map(field).map(str::trim).filter(|v| !v.is_empty()).map(str::to_owned)
                .collect::<BTreeSet<_>>().into_iter().collect()
        };
        Facets { platforms: distinct(|o| o.platform.as_str()), carriers: distinct(|o| o.carrier.as_str()) }
    }
}
