//! Canonical item views derived from a raw listing plus the catalog.
//!
//! A view is a pure function of `(listing, catalog, membership, currency)`. Nothing here
//! caches; callers rebuild views whenever any input collection is replaced.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::catalog::Catalog;
use crate::config::CurrencyConfig;
use crate::listing::{sanitize_label, ItemId, Listing, ListingExtra, Slot};
use crate::membership::{ItemStatus, MembershipIndex};

pub const UNKNOWN_ITEM_NAME: &str = "Unknown Item";

const STAT_COLOR_DAMAGE: &str = "#ef4444";
const STAT_COLOR_HP: &str = "#10b981";
const STAT_COLOR_ATTACK_SPEED: &str = "#f59e0b";
const STAT_COLOR_MOVEMENT_SPEED: &str = "#06b6d4";
const STAT_COLOR_DEFAULT: &str = "#8b5cf6";

/// Which stat set to report for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatScope {
    /// Innate slot stat plus the stat this exact listing rolled.
    Actual,
    /// Innate slot stat plus every stat the catalog allows for the base item.
    Possible,
}

/// Label of the stat the `power` value measures for this listing.
pub fn power_type(slot: &Slot, extra: &ListingExtra) -> String {
    if let Some(innate) = slot.innate_stat() {
        return innate.to_string();
    }
    let rolled = extra.stat.clone();
    match slot {
        Slot::Neck => rolled.unwrap_or_else(|| "Placeholder".to_string()),
        Slot::Ring | Slot::OffHand => rolled.unwrap_or_else(|| "Stat".to_string()),
        _ => "Power".to_string(),
    }
}

pub fn stat_color(power_type: &str) -> &'static str {
    let lower = power_type.to_ascii_lowercase();
    if lower.contains("damage") {
        STAT_COLOR_DAMAGE
    } else if lower.contains("hp") {
        STAT_COLOR_HP
    } else if lower.contains("attack speed") {
        STAT_COLOR_ATTACK_SPEED
    } else if lower.contains("movement speed") {
        STAT_COLOR_MOVEMENT_SPEED
    } else {
        STAT_COLOR_DEFAULT
    }
}

/// Platinum converted to gold plus gold. Gems are a separate currency and never folded in.
pub fn total_gold_value(listing: &Listing, currency: &CurrencyConfig) -> i64 {
    listing
        .platinum_cost
        .saturating_mul(currency.platinum_to_gold)
        .saturating_add(listing.gold_cost)
}

pub fn stat_types(
    listing: &Listing,
    extra: &ListingExtra,
    catalog: &Catalog,
    scope: StatScope,
) -> BTreeSet<String> {
    let mut stats = BTreeSet::new();
    if let Some(innate) = listing.slot.innate_stat() {
        stats.insert(innate.to_string());
    }
    match scope {
        StatScope::Actual => {
            if let Some(stat) = &extra.stat {
                stats.insert(stat.clone());
            }
        }
        StatScope::Possible => {
            if let Some(stat) = &extra.stat {
                stats.insert(stat.clone());
            }
            if let Some(item) = catalog.get(&listing.base_item_id, &listing.slot) {
                stats.extend(item.stat_options.iter().cloned());
            }
        }
    }
    stats.retain(|stat| !stat.trim().is_empty());
    stats
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Costs {
    pub platinum: i64,
    pub gold: i64,
    pub gems: i64,
}

/// Display-ready item, for both marketplace listings and inventory items.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemView {
    pub id: ItemId,
    pub base_item_id: ItemId,
    pub slot: Slot,
    pub username: String,
    pub name: String,
    pub classes: Vec<String>,
    /// `power * 100`; `NaN` propagates so that broken records stay visible.
    #[serde(serialize_with = "serialize_nan_as_null")]
    pub power_percent: f64,
    pub power_type: String,
    pub stat_color: &'static str,
    pub range: Option<f64>,
    pub two_handed: Option<String>,
    pub is_two_handed: bool,
    pub costs: Costs,
    pub total_gold_value: i64,
    pub stat_types: BTreeSet<String>,
    pub status: ItemStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ItemView {
    pub fn has_known_name(&self) -> bool {
        self.name != UNKNOWN_ITEM_NAME
    }
}

pub(crate) fn serialize_nan_as_null<S: serde::Serializer>(
    value: &f64,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else {
        serializer.serialize_none()
    }
}

/// Binds the lookups a view depends on.
#[derive(Debug, Clone, Copy)]
pub struct ItemNormalizer<'a> {
    catalog: &'a Catalog,
    membership: Option<&'a MembershipIndex>,
    currency: &'a CurrencyConfig,
}

impl<'a> ItemNormalizer<'a> {
    pub fn new(catalog: &'a Catalog, currency: &'a CurrencyConfig) -> Self {
        Self {
            catalog,
            membership: None,
            currency,
        }
    }

    /// Views produced through this normalizer carry the membership status of their id.
    pub fn with_membership(mut self, membership: &'a MembershipIndex) -> Self {
        self.membership = Some(membership);
        self
    }

    pub fn normalize(&self, listing: &Listing) -> ItemView {
        let extra = listing.parsed_extra();
        let catalog_item = self.catalog.get(&listing.base_item_id, &listing.slot);

        let name = match catalog_item.map(|item| item.item_name.as_str()) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                debug!(
                    component = "normalize",
                    event = "catalog.entry.missing",
                    base_item_id = %listing.base_item_id,
                    slot = %listing.slot
                );
                UNKNOWN_ITEM_NAME.to_string()
            }
        };

        let two_handed = extra.two_handed.clone().or_else(|| {
            catalog_item
                .filter(|item| item.two_handed)
                .map(|_| "Yes".to_string())
        });
        let power_type = power_type(&listing.slot, &extra);
        let status = self
            .membership
            .map(|index| index.status_of(&listing.id))
            .unwrap_or(ItemStatus::Available);

        ItemView {
            id: listing.id.clone(),
            base_item_id: listing.base_item_id.clone(),
            slot: listing.slot.clone(),
            username: sanitize_label(&listing.username),
            name,
            classes: catalog_item
                .map(|item| item.classes.clone())
                .unwrap_or_default(),
            power_percent: listing.power * 100.0,
            stat_color: stat_color(&power_type),
            power_type,
            range: extra.range,
            is_two_handed: two_handed.is_some(),
            two_handed,
            costs: Costs {
                platinum: listing.platinum_cost,
                gold: listing.gold_cost,
                gems: listing.gem_cost,
            },
            total_gold_value: total_gold_value(listing, self.currency),
            stat_types: stat_types(listing, &extra, self.catalog, StatScope::Actual),
            status,
            created_at: listing.created_at(),
            expires_at: listing.expires_at(),
        }
    }

    pub fn normalize_all<'l>(
        &self,
        listings: impl IntoIterator<Item = &'l Listing>,
    ) -> Vec<ItemView> {
        listings
            .into_iter()
            .map(|listing| self.normalize(listing))
            .collect()
    }

    pub fn possible_stats(&self, listing: &Listing) -> BTreeSet<String> {
        stat_types(
            listing,
            &listing.parsed_extra(),
            self.catalog,
            StatScope::Possible,
        )
    }
}
