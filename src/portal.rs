//! Upstream portal API adapter.
//!
//! Every call is a JSON `POST` of `{route, token, page}`. Paginated collections are fetched
//! page 1 first; its `total_pages` drives pages `2..=N`, fetched concurrently and joined
//! all-or-nothing so that the analytics never see a truncated collection.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::config::{env_value, parse_positive, ConfigError};
use crate::listing::{Listing, MyListing};
use crate::membership::Character;
use crate::snapshot::SnapshotInputs;

pub const DEFAULT_PORTAL_URL: &str = "https://streamarenarpg.com/portal/portal_api.php";

pub const ROUTE_GAME_ITEMS: &str = "get_game_items";
pub const ROUTE_LISTINGS: &str = "get_listings";
pub const ROUTE_INVENTORY: &str = "get_inventory";
pub const ROUTE_USER_DATA: &str = "get_udata";
pub const ROUTE_MY_LISTINGS: &str = "get_my_listings";

const MAX_PARALLEL_PAGES: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalConfig {
    pub api_url: String,
    pub token: Option<String>,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_PORTAL_URL.to_string(),
            token: None,
            timeout_ms: 15_000,
            max_retries: 2,
            retry_backoff_ms: 200,
        }
    }
}

pub fn portal_config_from_env() -> Result<PortalConfig, ConfigError> {
    let mut config = PortalConfig::default();

    if let Some(url) = env_value("ARENA_PORTAL_URL") {
        config.api_url = url;
    }
    config.token = env_value("RPG_TOKEN");
    if let Some(raw) = env_value("ARENA_PORTAL_TIMEOUT_MS") {
        config.timeout_ms = parse_positive("ARENA_PORTAL_TIMEOUT_MS", &raw)? as u64;
    }
    if let Some(raw) = env_value("ARENA_PORTAL_MAX_RETRIES") {
        config.max_retries = raw.parse().map_err(|_| ConfigError::Invalid {
            var: "ARENA_PORTAL_MAX_RETRIES",
            value: raw.clone(),
        })?;
    }
    if let Some(raw) = env_value("ARENA_PORTAL_RETRY_BACKOFF_MS") {
        config.retry_backoff_ms = raw.parse().map_err(|_| ConfigError::Invalid {
            var: "ARENA_PORTAL_RETRY_BACKOFF_MS",
            value: raw.clone(),
        })?;
    }

    Ok(config)
}

#[derive(Debug, Error)]
pub enum PortalError {
    #[error("portal token missing (set RPG_TOKEN)")]
    MissingToken,
    #[error("HTTP client build error: {0}")]
    HttpClientBuild(String),
    #[error("HTTP request failed for route {route}: {message}")]
    HttpRequest { route: String, message: String },
    #[error("could not decode response for route {route}: {message}")]
    Decode { route: String, message: String },
    #[error("response for route {route} has no '{field}' field")]
    MissingField { route: String, field: &'static str },
    #[error("page {page} of route {route} failed: {message}")]
    PageFailed {
        route: String,
        page: u32,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortalRequest {
    pub route: String,
    pub token: String,
    pub page: u32,
}

pub trait PortalTransport: Send + Sync {
    fn post(&self, api_url: &str, request: &PortalRequest) -> Result<Value, PortalError>;
}

#[cfg(feature = "portal")]
pub struct ReqwestPortalTransport {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "portal")]
impl ReqwestPortalTransport {
    pub fn new(timeout_ms: u64) -> Result<Self, PortalError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()
            .map_err(|err| PortalError::HttpClientBuild(err.to_string()))?;
        Ok(Self { client })
    }
}

#[cfg(feature = "portal")]
impl PortalTransport for ReqwestPortalTransport {
    fn post(&self, api_url: &str, request: &PortalRequest) -> Result<Value, PortalError> {
        let http_error = |message: String| PortalError::HttpRequest {
            route: request.route.clone(),
            message,
        };
        let body = serde_json::to_vec(request).map_err(|err| http_error(err.to_string()))?;

        let response = self
            .client
            .post(api_url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .map_err(|err| http_error(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(http_error(format!("unexpected HTTP status {status}")));
        }

        let bytes = response.bytes().map_err(|err| http_error(err.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|err| PortalError::Decode {
            route: request.route.clone(),
            message: err.to_string(),
        })
    }
}

/// One decoded page of a paginated collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_pages: u32,
}

/// Concatenates page 1 with pages `2..=first.total_pages`. Any failed or missing page fails
/// the whole collection.
pub fn join_pages<T>(
    route: &str,
    first: Page<T>,
    rest: impl IntoIterator<Item = (u32, Result<Page<T>, PortalError>)>,
) -> Result<Vec<T>, PortalError> {
    let total_pages = first.total_pages.max(1);
    let mut pages: Vec<(u32, Page<T>)> = Vec::new();

    for (page, result) in rest {
        match result {
            Ok(items) => pages.push((page, items)),
            Err(err) => {
                warn!(
                    component = "portal",
                    event = "portal.page_join.failed",
                    route,
                    page,
                    error = %err
                );
                return Err(PortalError::PageFailed {
                    route: route.to_string(),
                    page,
                    message: err.to_string(),
                });
            }
        }
    }

    pages.sort_by_key(|(page, _)| *page);
    for expected in 2..=total_pages {
        let delivered = pages.iter().filter(|(page, _)| *page == expected).count();
        if delivered != 1 {
            warn!(
                component = "portal",
                event = "portal.page_join.failed",
                route,
                page = expected,
                delivered
            );
            return Err(PortalError::PageFailed {
                route: route.to_string(),
                page: expected,
                message: format!("expected exactly one copy of the page, got {delivered}"),
            });
        }
    }

    let mut joined = first.items;
    for (page, items) in pages {
        if page >= 2 && page <= total_pages {
            joined.extend(items.items);
        }
    }
    Ok(joined)
}

pub struct PortalClient {
    transport: Arc<dyn PortalTransport>,
    config: PortalConfig,
    token: String,
}

impl PortalClient {
    pub fn new(
        transport: Arc<dyn PortalTransport>,
        config: PortalConfig,
    ) -> Result<Self, PortalError> {
        let token = config
            .token
            .clone()
            .filter(|token| !token.trim().is_empty())
            .ok_or(PortalError::MissingToken)?;
        Ok(Self {
            transport,
            config,
            token,
        })
    }

    #[cfg(feature = "portal")]
    pub fn from_config(config: PortalConfig) -> Result<Self, PortalError> {
        let transport = ReqwestPortalTransport::new(config.timeout_ms)?;
        Self::new(Arc::new(transport), config)
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    fn post(&self, route: &str, page: u32) -> Result<Value, PortalError> {
        let request = PortalRequest {
            route: route.to_string(),
            token: self.token.clone(),
            page,
        };
        retry(&self.config, || {
            self.transport.post(&self.config.api_url, &request)
        })
    }

    fn fetch_page<T: DeserializeOwned>(
        &self,
        route: &str,
        field: &'static str,
        page: u32,
    ) -> Result<Page<T>, PortalError> {
        let body = self.post(route, page)?;
        decode_page(route, field, &body)
    }

    fn fetch_all_pages<T>(&self, route: &str, field: &'static str) -> Result<Vec<T>, PortalError>
    where
        T: DeserializeOwned + Send,
    {
        let first: Page<T> = self.fetch_page(route, field, 1)?;
        let total_pages = first.total_pages.max(1);
        let remaining: Vec<u32> = (2..=total_pages).collect();

        let mut rest: Vec<(u32, Result<Page<T>, PortalError>)> = Vec::new();
        for batch in remaining.chunks(MAX_PARALLEL_PAGES) {
            std::thread::scope(|scope| {
                let handles: Vec<_> = batch
                    .iter()
                    .map(|&page| (page, scope.spawn(move || self.fetch_page(route, field, page))))
                    .collect();
                for (page, handle) in handles {
                    let result = handle.join().unwrap_or_else(|_| {
                        Err(PortalError::PageFailed {
                            route: route.to_string(),
                            page,
                            message: "page worker panicked".to_string(),
                        })
                    });
                    rest.push((page, result));
                }
            });
        }

        let joined = join_pages(route, first, rest)?;
        info!(
            component = "portal",
            event = "portal.collection.fetched",
            route,
            total_pages,
            items = joined.len()
        );
        Ok(joined)
    }

    pub fn fetch_catalog(&self) -> Result<Catalog, PortalError> {
        let body = self.post(ROUTE_GAME_ITEMS, 1)?;
        let catalog = Catalog::from_json(&body);
        debug!(
            component = "portal",
            event = "portal.catalog.fetched",
            items = catalog.len()
        );
        Ok(catalog)
    }

    pub fn fetch_listings(&self) -> Result<Vec<Listing>, PortalError> {
        self.fetch_all_pages(ROUTE_LISTINGS, "listings")
    }

    pub fn fetch_inventory(&self) -> Result<Vec<Listing>, PortalError> {
        self.fetch_all_pages(ROUTE_INVENTORY, "player_items")
    }

    pub fn fetch_my_listings(&self) -> Result<Vec<MyListing>, PortalError> {
        self.fetch_all_pages(ROUTE_MY_LISTINGS, "listings")
    }

    pub fn fetch_characters(&self) -> Result<Vec<Character>, PortalError> {
        let body = self.post(ROUTE_USER_DATA, 1)?;
        let characters = body
            .get("characters")
            .and_then(Value::as_array)
            .ok_or_else(|| PortalError::MissingField {
                route: ROUTE_USER_DATA.to_string(),
                field: "characters",
            })?;
        Ok(characters.iter().filter_map(Character::from_value).collect())
    }

    /// Every collection the analytics need, each one complete or an error.
    pub fn fetch_snapshot_inputs(&self) -> Result<SnapshotInputs, PortalError> {
        Ok(SnapshotInputs {
            catalog: self.fetch_catalog()?,
            listings: self.fetch_listings()?,
            inventory: self.fetch_inventory()?,
            characters: self.fetch_characters()?,
            my_listings: self.fetch_my_listings()?,
        })
    }
}

fn decode_page<T: DeserializeOwned>(
    route: &str,
    field: &'static str,
    body: &Value,
) -> Result<Page<T>, PortalError> {
    let raw_items = body
        .get(field)
        .and_then(Value::as_array)
        .ok_or_else(|| PortalError::MissingField {
            route: route.to_string(),
            field,
        })?;
    let items = raw_items
        .iter()
        .map(|item| serde_json::from_value(item.clone()))
        .collect::<Result<Vec<T>, _>>()
        .map_err(|err| PortalError::Decode {
            route: route.to_string(),
            message: err.to_string(),
        })?;

    let total_pages = match body.get("total_pages") {
        Some(Value::Number(number)) => number.as_u64(),
        Some(Value::String(text)) => text.trim().parse().ok(),
        _ => None,
    }
    .map(|pages| pages.clamp(1, u64::from(u32::MAX)) as u32)
    .unwrap_or(1);

    Ok(Page { items, total_pages })
}

fn retry<T>(
    cfg: &PortalConfig,
    mut f: impl FnMut() -> Result<T, PortalError>,
) -> Result<T, PortalError> {
    let mut attempt: u32 = 0;
    loop {
        match f() {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= cfg.max_retries => return Err(err),
            Err(err) => {
                attempt = attempt.saturating_add(1);
                let shift = attempt.saturating_sub(1).min(10);
                let factor = 1u64 << shift;
                let sleep_ms = cfg.retry_backoff_ms.saturating_mul(factor);
                debug!(
                    component = "portal",
                    event = "portal.request.retry",
                    attempt,
                    sleep_ms,
                    error = %err
                );
                std::thread::sleep(std::time::Duration::from_millis(sleep_ms));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockTransport {
        responses: HashMap<(String, u32), Value>,
        failures_before_success: Mutex<HashMap<(String, u32), usize>>,
        calls: AtomicUsize,
    }

    impl MockTransport {
        fn with(mut self, route: &str, page: u32, body: Value) -> Self {
            self.responses.insert((route.to_string(), page), body);
            self
        }

        fn flaky(self, route: &str, page: u32, failures: usize) -> Self {
            self.failures_before_success
                .lock()
                .expect("mock lock should not be poisoned")
                .insert((route.to_string(), page), failures);
            self
        }
    }

    impl PortalTransport for MockTransport {
        fn post(&self, _api_url: &str, request: &PortalRequest) -> Result<Value, PortalError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let key = (request.route.clone(), request.page);
            {
                let mut failures = self
                    .failures_before_success
                    .lock()
                    .expect("mock lock should not be poisoned");
                if let Some(left) = failures.get_mut(&key) {
                    if *left > 0 {
                        *left -= 1;
                        return Err(PortalError::HttpRequest {
                            route: request.route.clone(),
                            message: "transient".to_string(),
                        });
                    }
                }
            }
            self.responses
                .get(&key)
                .cloned()
                .ok_or_else(|| PortalError::HttpRequest {
                    route: request.route.clone(),
                    message: "missing mock response".to_string(),
                })
        }
    }

    fn config() -> PortalConfig {
        PortalConfig {
            token: Some("secret".to_string()),
            retry_backoff_ms: 0,
            ..PortalConfig::default()
        }
    }

    fn listings_page(ids: &[u64], total_pages: u32) -> Value {
        json!({
            "listings": ids.iter().map(|id| json!({"id": id, "slot": "weapon", "power": "0.5"})).collect::<Vec<_>>(),
            "total_pages": total_pages,
            "total_listings": 99
        })
    }

    #[test]
    fn missing_token_is_rejected_up_front() {
        let result = PortalClient::new(Arc::new(MockTransport::default()), PortalConfig::default());
        assert!(matches!(result, Err(PortalError::MissingToken)));
    }

    #[test]
    fn all_pages_are_joined_in_order() {
        let transport = MockTransport::default()
            .with(ROUTE_LISTINGS, 1, listings_page(&[1, 2], 3))
            .with(ROUTE_LISTINGS, 2, listings_page(&[3], 3))
            .with(ROUTE_LISTINGS, 3, listings_page(&[4, 5], 3));
        let client = PortalClient::new(Arc::new(transport), config()).expect("client");

        let listings = client.fetch_listings().expect("all pages succeed");
        let ids: Vec<&str> = listings.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn one_failed_page_fails_the_collection() {
        let transport = MockTransport::default()
            .with(ROUTE_LISTINGS, 1, listings_page(&[1], 3))
            .with(ROUTE_LISTINGS, 3, listings_page(&[3], 3));
        let client = PortalClient::new(Arc::new(transport), config()).expect("client");

        let err = client.fetch_listings().expect_err("page 2 is missing");
        assert!(matches!(err, PortalError::PageFailed { page: 2, .. }));
    }

    #[test]
    fn transient_failures_are_retried() {
        let transport = Arc::new(
            MockTransport::default()
                .with(ROUTE_LISTINGS, 1, listings_page(&[1], 1))
                .flaky(ROUTE_LISTINGS, 1, 2),
        );
        let client = PortalClient::new(transport.clone(), config()).expect("client");

        assert_eq!(client.fetch_listings().expect("third attempt").len(), 1);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn retries_are_bounded() {
        let transport = Arc::new(
            MockTransport::default()
                .with(ROUTE_LISTINGS, 1, listings_page(&[1], 1))
                .flaky(ROUTE_LISTINGS, 1, 5),
        );
        let client = PortalClient::new(transport.clone(), config()).expect("client");

        assert!(client.fetch_listings().is_err());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn join_rejects_duplicate_pages() {
        let first = Page {
            items: vec![1],
            total_pages: 2,
        };
        let rest = vec![
            (2, Ok(Page { items: vec![2], total_pages: 2 })),
            (2, Ok(Page { items: vec![2], total_pages: 2 })),
        ];
        assert!(matches!(
            join_pages("r", first, rest),
            Err(PortalError::PageFailed { page: 2, .. })
        ));
    }

    #[test]
    fn characters_and_catalog_decode_from_their_routes() {
        let transport = MockTransport::default()
            .with(
                ROUTE_USER_DATA,
                1,
                json!({"characters": [{"name": "Ayla", "weapon_equip": 7}], "user": {}}),
            )
            .with(
                ROUTE_GAME_ITEMS,
                1,
                json!({"game_items": [{"id": 7, "slot": "weapon", "item_name": "Sword"}]}),
            );
        let client = PortalClient::new(Arc::new(transport), config()).expect("client");

        let characters = client.fetch_characters().expect("characters");
        assert_eq!(characters.len(), 1);
        assert_eq!(client.fetch_catalog().expect("catalog").len(), 1);
    }
}
