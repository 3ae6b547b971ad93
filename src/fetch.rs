//! Paginated order retrieval from the marketplace integration API.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::FetchConfig;
use crate::domain::aggregates::Order;
use crate::domain::value_objects::TIMESTAMP_FORMAT;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("no API token in {}", .0.display())]
    MissingToken(PathBuf),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Anything that can hand out pages of orders, starting at page 1.
pub trait OrderSource {
    fn fetch_page(&self, page: u32) -> impl Future<Output = Result<Vec<Order>, FetchError>> + Send;
}

/// Walks pages until an empty or short page. A failing page ends the walk;
/// whatever was gathered before it is returned.
pub async fn fetch_all<S: OrderSource + Sync>(source: &S, page_size: usize) -> Vec<Order> {
    let mut all = Vec::new();
    let mut page = 1;
    loop {
        let batch = match source.fetch_page(page).await {
            Ok(batch) => batch,
            Err(e) => {
                warn!(page, error = %e, "order fetch failed");
                break;
            }
        };
        let last = batch.len() < page_size;
        all.extend(batch);
        if last { break; }
        page += 1;
    }
    info!(fetched = all.len(), pages = page, "order fetch finished");
    all
}

#[derive(Debug, Default, Deserialize)]
struct OrdersPage { #[serde(default)] orders: Vec<Order> }

/// `start_date`/`end_date` for a window of `hours` ending at `now`.
pub fn fetch_window(now: NaiveDateTime, hours: i64) -> (String, String) {
    let start = now - chrono::Duration::hours(hours);
    (start.format(TIMESTAMP_FORMAT).to_string(), now.format(TIMESTAMP_FORMAT).to_string())
}

#[derive(Clone)]
pub struct EntegraClient {
    client: reqwest::Client,
    base_url: String,
    token_path: PathBuf,
    window_hours: i64,
    page_size: usize,
}

impl EntegraClient {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token_path: config.token_path.clone(),
            window_hours: config.window_hours,
            page_size: config.page_size,
        })
    }
}

/// Reads the token file; the token is rotated out of band so it is read per request.
fn read_token(path: &Path) -> Result<SecretString, FetchError> {
    let raw = std::fs::read_to_string(path).unwrap_or_default();
    let token = raw.trim();
    if token.is_empty() { return Err(FetchError::MissingToken(path.to_owned())); }
    Ok(SecretString::from(token.to_string()))
}

impl OrderSource for EntegraClient {
    async fn fetch_page(&self, page: u32) -> Result<Vec<Order>, FetchError> {
        let token = read_token(&self.token_path)?;
        let (start_date, end_date) = fetch_window(Local::now().naive_local(), self.window_hours);
        let url = format!("{}/order/page={page}/", self.base_url);
        let body: OrdersPage = self.client.get(&url)
            .header("Authorization", format!("JWT {}", token.expose_secret()))
            .query(&[("start_date", start_date), ("end_date", end_date), ("limit", self.page_size.to_string())])
            .send().await?
            .error_for_status()?
            .json().await?;
        Ok(body.orders)
    }
}
