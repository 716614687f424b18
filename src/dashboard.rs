//! Read-only JSON dashboard over the current market snapshot.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::aggregate::ItemCohort;
use crate::comparison::ItemComparison;
use crate::filter::{
    apply_filters, compare_by, empty_as_none, sort_items, FilterCriteria, SortKey,
};
use crate::listing::{ItemId, MyListing, Slot};
use crate::membership::ItemStatus;
use crate::my_listings::{expiring_within, time_remaining, ListingTotals, TimeRemaining};
use crate::normalize::{ItemNormalizer, ItemView};
use crate::snapshot::SnapshotSource;
use crate::tier::classify_tier;

pub fn dashboard_router(source: Arc<dyn SnapshotSource>) -> Router {
    Router::new()
        .route("/api/listings", get(get_listings))
        .route("/api/inventory", get(get_inventory))
        .route("/api/inventory/summary", get(get_inventory_summary))
        .route("/api/analysis", get(get_analysis))
        .route("/api/slot-analysis", get(get_slot_analysis))
        .route("/api/my-listings", get(get_my_listings))
        .route("/api/tier", get(get_tier))
        .route("/api/filter-options", get(get_filter_options))
        .with_state(DashboardAppState { source })
}

#[derive(Clone)]
struct DashboardAppState {
    source: Arc<dyn SnapshotSource>,
}

#[derive(Debug, Default, Deserialize)]
struct SortQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    sort: Option<SortKey>,
}

#[derive(Debug, Deserialize)]
struct SlotAnalysisQuery {
    slot: Slot,
    power_type: String,
}

#[derive(Debug, Deserialize)]
struct TierQuery {
    percentile: f64,
    sample_size: usize,
}

#[derive(Debug, Default, Deserialize)]
struct MyListingsQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    expiring_within_hours: Option<f64>,
}

#[derive(Serialize)]
struct Page<T> {
    total: usize,
    filtered: usize,
    items: Vec<T>,
}

#[derive(Serialize)]
struct ComparedItem {
    #[serde(flatten)]
    item: ItemView,
    comparison: ItemComparison,
}

#[derive(Serialize)]
struct MyListingEntry {
    #[serde(flatten)]
    item: ItemView,
    owned_item_id: Option<ItemId>,
    time_remaining: Option<TimeRemaining>,
    time_remaining_label: Option<String>,
}

#[derive(Serialize)]
struct MyListingsResponse {
    totals: ListingTotals,
    filtered: usize,
    items: Vec<MyListingEntry>,
}

async fn get_listings(
    State(state): State<DashboardAppState>,
    Query(criteria): Query<FilterCriteria>,
    Query(sort): Query<SortQuery>,
) -> impl IntoResponse {
    let snapshot = state.source.snapshot();
    let views = snapshot.listing_views();
    let filtered = apply_filters(views, &criteria);
    let sorted = sort_items(&filtered, sort.sort.unwrap_or(SortKey::TimeNewest));
    let items: Vec<ComparedItem> = sorted
        .into_iter()
        .map(|item| ComparedItem {
            comparison: snapshot.compare(&item),
            item,
        })
        .collect();

    info!(
        component = "dashboard",
        event = "http.listings.request",
        total = views.len(),
        filtered = items.len()
    );
    Json(Page {
        total: views.len(),
        filtered: items.len(),
        items,
    })
}

async fn get_inventory(
    State(state): State<DashboardAppState>,
    Query(criteria): Query<FilterCriteria>,
    Query(sort): Query<SortQuery>,
) -> impl IntoResponse {
    let snapshot = state.source.snapshot();
    let views = snapshot.inventory_views();
    let filtered = apply_filters(views, &criteria);
    let sorted = sort_items(&filtered, sort.sort.unwrap_or(SortKey::PowerHigh));
    let items: Vec<ComparedItem> = sorted
        .into_iter()
        .map(|item| ComparedItem {
            comparison: snapshot.compare(&item),
            item,
        })
        .collect();

    info!(
        component = "dashboard",
        event = "http.inventory.request",
        total = views.len(),
        filtered = items.len(),
        status = criteria.status.map(|status| status.as_str())
    );
    Json(Page {
        total: views.len(),
        filtered: items.len(),
        items,
    })
}

async fn get_inventory_summary(State(state): State<DashboardAppState>) -> impl IntoResponse {
    let snapshot = state.source.snapshot();
    info!(
        component = "dashboard",
        event = "http.inventory_summary.request"
    );
    Json(snapshot.inventory_summary())
}

async fn get_analysis(
    State(state): State<DashboardAppState>,
    Query(criteria): Query<FilterCriteria>,
    Query(sort): Query<SortQuery>,
) -> impl IntoResponse {
    let snapshot = state.source.snapshot();
    let cohorts: Vec<ItemCohort> = snapshot.item_cohorts().iter().cloned().collect();
    let filtered = apply_filters(&cohorts, &criteria);
    let items = sort_items(&filtered, sort.sort.unwrap_or(SortKey::Name));

    info!(
        component = "dashboard",
        event = "http.analysis.request",
        total = cohorts.len(),
        filtered = items.len()
    );
    Json(Page {
        total: cohorts.len(),
        filtered: items.len(),
        items,
    })
}

async fn get_slot_analysis(
    State(state): State<DashboardAppState>,
    Query(query): Query<SlotAnalysisQuery>,
) -> Response {
    let snapshot = state.source.snapshot();
    let stats = snapshot.slot_cohort(&query.slot, &query.power_type);
    info!(
        component = "dashboard",
        event = "http.slot_analysis.request",
        slot = %query.slot,
        power_type = %query.power_type,
        found = stats.is_some()
    );

    match stats {
        Some(stats) => Json(json!({
            "slot": query.slot,
            "power_type": query.power_type,
            "stats": stats.as_ref(),
        }))
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": format!(
                    "no listings for slot '{}' with power type '{}'",
                    query.slot, query.power_type
                )
            })),
        )
            .into_response(),
    }
}

async fn get_my_listings(
    State(state): State<DashboardAppState>,
    Query(query): Query<MyListingsQuery>,
    Query(sort): Query<SortQuery>,
) -> impl IntoResponse {
    let snapshot = state.source.snapshot();
    let now = Utc::now();
    let all = &snapshot.inputs().my_listings;
    let selected = match query.expiring_within_hours {
        Some(hours) => expiring_within(all, hours, now),
        None => all.iter().collect(),
    };

    // Status comes from the owned item id; the listing id is the marketplace's own.
    let normalizer = ItemNormalizer::new(&snapshot.inputs().catalog, snapshot.currency());
    let mut entries: Vec<(ItemView, &MyListing)> = selected
        .iter()
        .map(|my_listing| {
            let mut view = normalizer.normalize(&my_listing.listing);
            view.status = my_listing
                .owned_item_id()
                .map(|owned| snapshot.membership().status_of(owned))
                .unwrap_or(ItemStatus::Listed);
            (view, *my_listing)
        })
        .collect();
    let key = sort.sort.unwrap_or(SortKey::TimeNewest);
    entries.sort_by(|a, b| compare_by(&a.0, &b.0, key));

    let items: Vec<MyListingEntry> = entries
        .into_iter()
        .map(|(item, my_listing)| {
            let remaining = item.expires_at.map(|expires_at| time_remaining(expires_at, now));
            MyListingEntry {
                owned_item_id: my_listing.owned_item_id().cloned(),
                time_remaining_label: remaining.map(|r| r.label()),
                time_remaining: remaining,
                item,
            }
        })
        .collect();

    info!(
        component = "dashboard",
        event = "http.my_listings.request",
        total = all.len(),
        filtered = items.len()
    );
    Json(MyListingsResponse {
        totals: snapshot.my_listing_totals(now),
        filtered: items.len(),
        items,
    })
}

async fn get_tier(Query(query): Query<TierQuery>) -> Response {
    if !(0.0..=100.0).contains(&query.percentile) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "percentile must be within 0..=100"})),
        )
            .into_response();
    }
    info!(
        component = "dashboard",
        event = "http.tier.request",
        percentile = query.percentile,
        sample_size = query.sample_size
    );
    Json(classify_tier(query.percentile, query.sample_size)).into_response()
}

async fn get_filter_options(State(state): State<DashboardAppState>) -> impl IntoResponse {
    let snapshot = state.source.snapshot();
    info!(
        component = "dashboard",
        event = "http.filter_options.request"
    );
    Json(snapshot.filter_options())
}
