//! Market snapshot: the complete input collections plus every cache derived from them.
//!
//! A snapshot is immutable once published. Replacing any input produces a new snapshot with
//! all views, cohorts and indexes rebuilt from scratch; readers holding the old `Arc` keep a
//! consistent view.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::aggregate::{aggregate_by_exact_item, aggregate_by_slot, CohortStats, CohortTable};
use crate::catalog::Catalog;
use crate::cohort::SlotCohortKey;
use crate::comparison::ItemComparison;
use crate::config::CurrencyConfig;
use crate::listing::{Listing, MyListing, Slot, EQUIPMENT_SLOTS};
use crate::membership::{Character, InventorySummary, MembershipIndex};
use crate::my_listings::{listing_totals, ListingTotals};
use crate::normalize::{ItemNormalizer, ItemView};

/// Raw collections as fetched from upstream or loaded from a bundle.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SnapshotInputs {
    pub catalog: Catalog,
    pub listings: Vec<Listing>,
    pub inventory: Vec<Listing>,
    pub characters: Vec<Character>,
    pub my_listings: Vec<MyListing>,
}

#[derive(Debug, Error)]
pub enum SnapshotLoadError {
    #[error("failed to read snapshot bundle {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode snapshot bundle {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Reads a JSON bundle with `catalog`, `listings`, `inventory`, `characters` and
/// `my_listings`. Missing collections are empty.
pub fn load_snapshot_bundle(path: &Path) -> Result<SnapshotInputs, SnapshotLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| SnapshotLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| SnapshotLoadError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Distinct values available to populate filter controls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub slots: Vec<Slot>,
    pub classes: BTreeSet<String>,
    pub stats: BTreeSet<String>,
    pub item_names: BTreeSet<String>,
}

pub struct MarketSnapshot {
    inputs: SnapshotInputs,
    currency: CurrencyConfig,
    membership: MembershipIndex,
    listing_views: Vec<ItemView>,
    inventory_views: Vec<ItemView>,
    item_cohorts: CohortTable,
    slot_cohorts: Mutex<HashMap<SlotCohortKey, Option<Arc<CohortStats>>>>,
    built_at: DateTime<Utc>,
}

impl MarketSnapshot {
    pub fn build(inputs: SnapshotInputs, currency: CurrencyConfig) -> Self {
        let membership = MembershipIndex::build(&inputs.characters, &inputs.my_listings);
        let normalizer = ItemNormalizer::new(&inputs.catalog, &currency);
        let listing_views = normalizer.normalize_all(&inputs.listings);
        let inventory_views = normalizer
            .with_membership(&membership)
            .normalize_all(&inputs.inventory);
        let item_cohorts = aggregate_by_exact_item(&listing_views);

        info!(
            component = "snapshot",
            event = "snapshot.rebuilt",
            catalog_items = inputs.catalog.len(),
            listings = listing_views.len(),
            inventory = inventory_views.len(),
            item_cohorts = item_cohorts.len(),
            equipped = membership.equipped().len(),
            listed = membership.listed().len()
        );

        Self {
            inputs,
            currency,
            membership,
            listing_views,
            inventory_views,
            item_cohorts,
            slot_cohorts: Mutex::new(HashMap::new()),
            built_at: Utc::now(),
        }
    }

    pub fn empty(currency: CurrencyConfig) -> Self {
        Self::build(SnapshotInputs::default(), currency)
    }

    fn rebuilt(&self, update: impl FnOnce(&mut SnapshotInputs)) -> Self {
        let mut inputs = self.inputs.clone();
        update(&mut inputs);
        Self::build(inputs, self.currency)
    }

    pub fn with_catalog(&self, catalog: Catalog) -> Self {
        self.rebuilt(|inputs| inputs.catalog = catalog)
    }

    pub fn with_listings(&self, listings: Vec<Listing>) -> Self {
        self.rebuilt(|inputs| inputs.listings = listings)
    }

    pub fn with_inventory(&self, inventory: Vec<Listing>) -> Self {
        self.rebuilt(|inputs| inputs.inventory = inventory)
    }

    pub fn with_characters(&self, characters: Vec<Character>) -> Self {
        self.rebuilt(|inputs| inputs.characters = characters)
    }

    pub fn with_my_listings(&self, my_listings: Vec<MyListing>) -> Self {
        self.rebuilt(|inputs| inputs.my_listings = my_listings)
    }

    pub fn inputs(&self) -> &SnapshotInputs {
        &self.inputs
    }

    pub fn currency(&self) -> &CurrencyConfig {
        &self.currency
    }

    pub fn membership(&self) -> &MembershipIndex {
        &self.membership
    }

    pub fn listing_views(&self) -> &[ItemView] {
        &self.listing_views
    }

    pub fn inventory_views(&self) -> &[ItemView] {
        &self.inventory_views
    }

    pub fn item_cohorts(&self) -> &CohortTable {
        &self.item_cohorts
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Market-wide cohort for `(slot, power_type)`, computed on first request and memoized
    /// for the lifetime of this snapshot.
    pub fn slot_cohort(&self, slot: &Slot, power_type: &str) -> Option<Arc<CohortStats>> {
        let key = SlotCohortKey::new(slot.clone(), power_type);
        let mut memo = self
            .slot_cohorts
            .lock()
            .expect("slot cohort memo lock should not be poisoned");
        memo.entry(key)
            .or_insert_with(|| {
                aggregate_by_slot(&self.listing_views, slot, power_type).map(Arc::new)
            })
            .clone()
    }

    pub fn compare(&self, view: &ItemView) -> ItemComparison {
        let item_cohort = self.item_cohorts.cohort_for(view).map(|c| &c.summary);
        let slot_cohort = self.slot_cohort(&view.slot, &view.power_type);
        ItemComparison::new(view, item_cohort, slot_cohort.as_deref())
    }

    pub fn inventory_summary(&self) -> InventorySummary {
        InventorySummary::from_views(&self.inventory_views)
    }

    pub fn my_listing_totals(&self, now: DateTime<Utc>) -> ListingTotals {
        listing_totals(&self.inputs.my_listings, &self.currency, now)
    }

    pub fn filter_options(&self) -> FilterOptions {
        let normalizer = ItemNormalizer::new(&self.inputs.catalog, &self.currency);
        let mut stats = self.inputs.catalog.stat_options();
        for listing in self.inputs.listings.iter().chain(&self.inputs.inventory) {
            stats.extend(normalizer.possible_stats(listing));
        }

        FilterOptions {
            slots: EQUIPMENT_SLOTS.to_vec(),
            classes: self.inputs.catalog.distinct_classes(),
            stats,
            item_names: self
                .listing_views
                .iter()
                .chain(&self.inventory_views)
                .filter(|view| view.has_known_name())
                .map(|view| view.name.clone())
                .collect(),
        }
    }
}

pub trait SnapshotSource: Send + Sync + 'static {
    fn snapshot(&self) -> Arc<MarketSnapshot>;
}

#[derive(Clone)]
pub struct InMemorySnapshotSource {
    inner: Arc<RwLock<Arc<MarketSnapshot>>>,
}

impl InMemorySnapshotSource {
    pub fn new(snapshot: MarketSnapshot) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(snapshot))),
        }
    }

    pub fn from_inputs(inputs: SnapshotInputs, currency: CurrencyConfig) -> Self {
        Self::new(MarketSnapshot::build(inputs, currency))
    }

    /// Publishes a new snapshot wholesale. Readers never observe a partial update.
    pub fn replace_snapshot(&self, snapshot: MarketSnapshot) {
        let mut guard = self
            .inner
            .write()
            .expect("in-memory snapshot lock should not be poisoned");
        *guard = Arc::new(snapshot);
    }
}

impl SnapshotSource for InMemorySnapshotSource {
    fn snapshot(&self) -> Arc<MarketSnapshot> {
        self.inner
            .read()
            .expect("in-memory snapshot lock should not be poisoned")
            .clone()
    }
}

#[cfg(feature = "portal")]
pub use live::LivePortalSnapshotSource;

#[cfg(feature = "portal")]
mod live {
    use std::sync::Arc;
    use std::time::Duration;

    use tracing::{info, warn};

    use super::{InMemorySnapshotSource, MarketSnapshot, SnapshotSource};
    use crate::config::CurrencyConfig;
    use crate::portal::PortalClient;

    /// Refreshes from the portal on an interval. A failed refresh keeps the last complete
    /// snapshot published.
    #[derive(Clone)]
    pub struct LivePortalSnapshotSource {
        published: InMemorySnapshotSource,
    }

    impl LivePortalSnapshotSource {
        /// Must be called from within a tokio runtime.
        pub fn spawn(
            client: PortalClient,
            currency: CurrencyConfig,
            refresh_interval_ms: u64,
        ) -> Self {
            let published = InMemorySnapshotSource::new(MarketSnapshot::empty(currency));
            let source = Self {
                published: published.clone(),
            };
            let client = Arc::new(client);

            tokio::spawn(async move {
                let mut ticker =
                    tokio::time::interval(Duration::from_millis(refresh_interval_ms.max(1)));
                loop {
                    ticker.tick().await;
                    let client = Arc::clone(&client);
                    let fetched =
                        tokio::task::spawn_blocking(move || client.fetch_snapshot_inputs()).await;
                    match fetched {
                        Ok(Ok(inputs)) => {
                            published.replace_snapshot(MarketSnapshot::build(inputs, currency));
                            info!(
                                component = "snapshot",
                                event = "source.refresh.ok",
                                refresh_interval_ms
                            );
                        }
                        Ok(Err(err)) => warn!(
                            component = "snapshot",
                            event = "source.refresh.failed",
                            error = %err
                        ),
                        Err(err) => warn!(
                            component = "snapshot",
                            event = "source.refresh.panicked",
                            error = %err
                        ),
                    }
                }
            });

            source
        }
    }

    impl SnapshotSource for LivePortalSnapshotSource {
        fn snapshot(&self) -> Arc<MarketSnapshot> {
            self.published.snapshot()
        }
    }
}
