//! JSON API over the warehouse service.

use std::sync::Arc;

use axum::{extract::{Path, Query, State}, http::{header, StatusCode}, response::IntoResponse, routing::{get, post}, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::domain::aggregates::Order;
use crate::domain::value_objects::{DateRange, StatusBucket};
use crate::fetch::OrderSource;
use crate::filter::OrderFilter;
use crate::locations::Location;
use crate::picklist::{outstanding, PicklistEntry, PicklistQuery};
use crate::service::{Facets, Finalize, OrderView, Outcome, Warehouse};
use crate::store::ArchiveReport;

type ApiError = (StatusCode, String);

pub struct AppState<S> {
    pub warehouse: Arc<Warehouse>,
    pub source: Arc<S>,
    pub page_size: usize,
    pub retention_days: i64,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self { warehouse: self.warehouse.clone(), source: self.source.clone(), page_size: self.page_size, retention_days: self.retention_days }
    }
}

pub fn router<S: OrderSource + Send + Sync + 'static>(state: AppState<S>) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(json!({"status": "healthy", "service": "depo-orders"})) }))
        .route("/api/v1/orders", get(list_orders::<S>))
        .route("/api/v1/orders/:id", get(get_order::<S>))
        .route("/api/v1/orders/:id/cancel", post(cancel_order::<S>))
        .route("/api/v1/orders/:id/finalize", post(finalize_order::<S>))
        .route("/api/v1/orders/:id/toggle", post(toggle_in_order::<S>))
        .route("/api/v1/picklist", get(picklist::<S>))
        .route("/api/v1/picklist/toggle", post(toggle_everywhere::<S>))
        .route("/api/v1/locations", get(list_locations::<S>).post(set_location::<S>))
        .route("/api/v1/locations/export", get(export_locations::<S>))
        .route("/api/v1/locations/import", post(import_locations::<S>))
        .route("/api/v1/facets", get(facets::<S>))
        .route("/api/v1/refresh", post(refresh::<S>))
        .route("/api/v1/archive", post(archive::<S>))
        .with_state(state)
}

fn outcome_response(outcome: Outcome) -> (StatusCode, Json<Value>) {
    let status = match outcome {
        Outcome::Applied | Outcome::Unchanged => StatusCode::OK,
        Outcome::NotFound => StatusCode::NOT_FOUND,
        Outcome::NotPersisted => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(json!({"outcome": outcome})))
}

fn validated<T: Validate>(body: T) -> Result<T, ApiError> {
    body.validate().map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;
    Ok(body)
}

#[derive(Debug, Deserialize)] pub struct OrderParams { pub status: Option<String>, pub platform: Option<String>, pub carrier: Option<String>, pub t1: Option<String>, pub t2: Option<String> }

async fn list_orders<S>(State(s): State<AppState<S>>, Query(p): Query<OrderParams>) -> Result<Json<Vec<OrderView>>, ApiError> {
    let status = p.status.as_deref().map(str::parse::<StatusBucket>).transpose().map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?.unwrap_or_default();
    let filter = OrderFilter::new().status(status).platform(p.platform.as_deref().unwrap_or_default())
        .carrier(p.carrier.as_deref().unwrap_or_default()).dates(DateRange::parse_days(p.t1.as_deref(), p.t2.as_deref()));
    Ok(Json(s.warehouse.list_orders(&filter)))
}

async fn get_order<S>(State(s): State<AppState<S>>, Path(id): Path<String>) -> Result<Json<Order>, ApiError> {
    s.warehouse.order(&id).map(Json).ok_or((StatusCode::NOT_FOUND, "Not found".to_string()))
}

async fn cancel_order<S>(State(s): State<AppState<S>>, Path(id): Path<String>) -> impl IntoResponse {
    outcome_response(s.warehouse.cancel_order(&id))
}

async fn finalize_order<S>(State(s): State<AppState<S>>, Path(id): Path<String>) -> Result<Json<Order>, ApiError> {
    match s.warehouse.finalize_order(&id) {
        Finalize::Done(order) => Ok(Json(order)),
        Finalize::Incomplete { collected, total } => Err((StatusCode::CONFLICT, format!("{collected}/{total} items collected"))),
        Finalize::NotFound => Err((StatusCode::NOT_FOUND, "Not found".to_string())),
        Finalize::NotPersisted => Err((StatusCode::SERVICE_UNAVAILABLE, "Order could not be saved".to_string())),
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ToggleRequest {
    #[validate(length(min = 1, message = "barcode is required"))]
    pub barcode: String,
    pub collected: bool,
    /// Limits the change to one order.
    pub order: Option<String>,
}

async fn toggle_in_order<S>(State(s): State<AppState<S>>, Path(id): Path<String>, Json(r): Json<ToggleRequest>) -> Result<impl IntoResponse, ApiError> {
    let r = validated(r)?;
    Ok(outcome_response(s.warehouse.toggle_collected(&r.barcode, r.collected, Some(&id))))
}

async fn toggle_everywhere<S>(State(s): State<AppState<S>>, Json(r): Json<ToggleRequest>) -> Result<impl IntoResponse, ApiError> {
    let r = validated(r)?;
    Ok(outcome_response(s.warehouse.toggle_collected(&r.barcode, r.collected, r.order.as_deref())))
}

#[derive(Debug, Deserialize)] pub struct PicklistParams { pub platform: Option<String>, pub t1: Option<String>, pub t2: Option<String>, pub q: Option<String>, pub hide_collected: Option<bool> }

async fn picklist<S>(State(s): State<AppState<S>>, Query(p): Query<PicklistParams>) -> Json<Vec<PicklistEntry>> {
    let query = PicklistQuery::new().platform(p.platform.as_deref().unwrap_or_default())
        .dates(DateRange::parse_days(p.t1.as_deref(), p.t2.as_deref())).search(p.q.as_deref().unwrap_or_default());
    let entries = s.warehouse.build_picklist(&query);
    Json(if p.hide_collected.unwrap_or(true) { outstanding(entries) } else { entries })
}

#[derive(Debug, Deserialize)] pub struct LocationParams { pub q: Option<String> }

async fn list_locations<S>(State(s): State<AppState<S>>, Query(p): Query<LocationParams>) -> Json<Vec<Location>> {
    Json(s.warehouse.locations(p.q.as_deref().unwrap_or_default()))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetLocationRequest {
    #[validate(length(min = 1, message = "product name is required"))]
    pub name: String,
    #[validate(length(max = 64))]
    pub location: String,
}

async fn set_location<S>(State(s): State<AppState<S>>, Json(r): Json<SetLocationRequest>) -> Result<impl IntoResponse, ApiError> {
    let r = validated(r)?;
    Ok(outcome_response(s.warehouse.set_location(&r.name, &r.location)))
}

async fn export_locations<S>(State(s): State<AppState<S>>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], s.warehouse.export_locations())
}

async fn import_locations<S>(State(s): State<AppState<S>>, body: String) -> Result<Json<Value>, ApiError> {
    s.warehouse.import_locations(&body).map(|applied| Json(json!({"applied": applied})))
        .ok_or((StatusCode::SERVICE_UNAVAILABLE, "Locations could not be saved".to_string()))
}

async fn facets<S>(State(s): State<AppState<S>>) -> Json<Facets> { Json(s.warehouse.facets()) }

async fn refresh<S: OrderSource + Send + Sync + 'static>(State(s): State<AppState<S>>) -> Json<Value> {
    let fetched = s.warehouse.fetch_and_merge(s.source.as_ref(), s.page_size).await;
    Json(json!({"fetched": fetched}))
}

#[derive(Debug, Deserialize)] pub struct ArchiveParams { pub days: Option<i64> }

async fn archive<S>(State(s): State<AppState<S>>, Query(p): Query<ArchiveParams>) -> Result<Json<ArchiveReport>, ApiError> {
    s.warehouse.archive(p.days.unwrap_or(s.retention_days)).map(Json)
        .ok_or((StatusCode::SERVICE_UNAVAILABLE, "Archive could not be written".to_string()))
}
