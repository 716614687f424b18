//! Arena market core crate.
//!
//! Turns raw marketplace, inventory and character data into normalized item views,
//! cohort statistics and tier grades, and serves them from a JSON dashboard.

mod aggregate;
mod catalog;
mod cohort;
mod comparison;
mod config;
mod dashboard;
mod filter;
mod listing;
mod membership;
mod my_listings;
mod normalize;
mod observability;
mod portal;
mod snapshot;
mod tier;

pub use aggregate::{
    aggregate_by_exact_item, aggregate_by_slot, cost_per_power, percentile_in_range, CohortPoint,
    CohortStats, CohortTable, ItemCohort,
};
pub use catalog::{parse_class_info, Catalog, CatalogItem};
pub use cohort::{stats_segment, ExactCohortKey, SlotCohortKey, NO_STATS};
pub use comparison::{
    compare_against, power_standing, price_standing, CohortComparison, ItemComparison, Standing,
};
pub use config::{
    currency_config_from_env, server_config_from_env, ConfigError, CurrencyConfig, ServerConfig,
    DEFAULT_DASHBOARD_ADDR, DEFAULT_PLATINUM_TO_GOLD, DEFAULT_REFRESH_INTERVAL_MS,
};
pub use dashboard::dashboard_router;
pub use filter::{
    apply_filters, compare_by, sort_items, FilterCriteria, Filterable, SortKey, Sortable,
    TwoHandedFilter,
};
pub use listing::{
    normalize_stat_name, parse_optional_json, parse_timestamp, sanitize_label, Absent, ItemId,
    Listing, ListingExtra, MyListing, Slot, EQUIPMENT_SLOTS,
};
pub use membership::{
    build_equipped_index, build_listed_index, status_of, Character, InventorySummary, ItemStatus,
    MembershipIndex, SlotCount, StatusCounts,
};
pub use my_listings::{
    expiring_within, listing_totals, time_remaining, ListingTotals, TimeRemaining, Urgency,
};
pub use normalize::{
    power_type, stat_color, stat_types, total_gold_value, Costs, ItemNormalizer, ItemView,
    StatScope, UNKNOWN_ITEM_NAME,
};
pub use observability::{
    init_logging, log_app_bind, log_app_start, log_config_loaded, log_source_selected,
    logging_config_from_env, LogFormat, LoggingConfig, LoggingInitError, SourceSelection,
};
pub use portal::{
    join_pages, portal_config_from_env, Page, PortalClient, PortalConfig, PortalError,
    PortalRequest, PortalTransport, DEFAULT_PORTAL_URL, ROUTE_GAME_ITEMS, ROUTE_INVENTORY,
    ROUTE_LISTINGS, ROUTE_MY_LISTINGS, ROUTE_USER_DATA,
};
#[cfg(feature = "portal")]
pub use portal::ReqwestPortalTransport;
#[cfg(feature = "portal")]
pub use snapshot::LivePortalSnapshotSource;
pub use snapshot::{
    load_snapshot_bundle, FilterOptions, InMemorySnapshotSource, MarketSnapshot, SnapshotInputs,
    SnapshotLoadError, SnapshotSource,
};
pub use tier::{classify_tier, Tier, TierGrade};
