//! Declarative filtering and total-order sorting over listings, inventory and cohorts.

use std::cmp::Ordering;
use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::aggregate::ItemCohort;
use crate::listing::Slot;
use crate::membership::ItemStatus;
use crate::normalize::ItemView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TwoHandedFilter {
    Yes,
    No,
}

impl FromStr for TwoHandedFilter {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "yes" | "true" | "1" => Ok(TwoHandedFilter::Yes),
            "no" | "false" | "0" => Ok(TwoHandedFilter::No),
            other => Err(format!("unknown two-handed filter `{other}`")),
        }
    }
}

/// Absent fields do not filter. Numeric bounds are inclusive; an item lacking the filtered
/// value (e.g. `NaN` power, no range) fails any bound set on it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    /// Case-insensitive substring of the item name.
    #[serde(deserialize_with = "empty_as_none")]
    pub name: Option<String>,
    /// Case-insensitive substring of the seller.
    #[serde(deserialize_with = "empty_as_none")]
    pub username: Option<String>,
    /// Exact item name.
    #[serde(deserialize_with = "empty_as_none")]
    pub item_name: Option<String>,
    #[serde(deserialize_with = "empty_as_none")]
    pub slot: Option<Slot>,
    #[serde(deserialize_with = "empty_as_none")]
    pub class: Option<String>,
    #[serde(deserialize_with = "empty_as_none")]
    pub stat: Option<String>,
    #[serde(deserialize_with = "empty_as_none")]
    pub two_handed: Option<TwoHandedFilter>,
    #[serde(deserialize_with = "empty_as_none")]
    pub min_power: Option<f64>,
    #[serde(deserialize_with = "empty_as_none")]
    pub max_power: Option<f64>,
    #[serde(deserialize_with = "empty_as_none")]
    pub min_range: Option<f64>,
    #[serde(deserialize_with = "empty_as_none")]
    pub max_range: Option<f64>,
    #[serde(deserialize_with = "empty_as_none")]
    pub min_total_gold: Option<i64>,
    #[serde(deserialize_with = "empty_as_none")]
    pub max_total_gold: Option<i64>,
    #[serde(deserialize_with = "empty_as_none")]
    pub max_platinum: Option<i64>,
    #[serde(deserialize_with = "empty_as_none")]
    pub max_gems: Option<i64>,
    #[serde(deserialize_with = "empty_as_none")]
    pub status: Option<ItemStatus>,
}

/// Accepts query-string text and JSON scalars alike. Blank inputs (`key=`) and
/// `null` mean "not set".
pub(crate) fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let text = match Value::deserialize(deserializer)? {
        Value::Null => return Ok(None),
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        other => {
            return Err(serde::de::Error::custom(format!(
                "expected a scalar filter value, got {other}"
            )))
        }
    };
    match text.trim() {
        "" => Ok(None),
        trimmed => trimmed.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// Facets a filter can inspect. Facets an item kind does not have return `None`.
pub trait Filterable {
    fn item_name(&self) -> &str;
    fn username(&self) -> Option<&str>;
    fn slot(&self) -> &Slot;
    fn classes(&self) -> &[String];
    fn has_stat(&self, stat: &str) -> bool;
    fn is_two_handed(&self) -> bool;
    fn power(&self) -> f64;
    fn range(&self) -> Option<f64>;
    fn total_gold(&self) -> Option<i64>;
    fn platinum(&self) -> Option<i64>;
    fn gems(&self) -> Option<i64>;
    fn status(&self) -> Option<ItemStatus>;
}

impl Filterable for ItemView {
    fn item_name(&self) -> &str {
        &self.name
    }

    fn username(&self) -> Option<&str> {
        Some(&self.username)
    }

    fn slot(&self) -> &Slot {
        &self.slot
    }

    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn has_stat(&self, stat: &str) -> bool {
        self.stat_types.contains(stat)
    }

    fn is_two_handed(&self) -> bool {
        self.is_two_handed
    }

    fn power(&self) -> f64 {
        self.power_percent
    }

    fn range(&self) -> Option<f64> {
        self.range
    }

    fn total_gold(&self) -> Option<i64> {
        Some(self.total_gold_value)
    }

    fn platinum(&self) -> Option<i64> {
        Some(self.costs.platinum)
    }

    fn gems(&self) -> Option<i64> {
        Some(self.costs.gems)
    }

    fn status(&self) -> Option<ItemStatus> {
        Some(self.status)
    }
}

// Cohorts filter on their best power and cheapest price.
impl Filterable for ItemCohort {
    fn item_name(&self) -> &str {
        &self.name
    }

    fn username(&self) -> Option<&str> {
        None
    }

    fn slot(&self) -> &Slot {
        &self.slot
    }

    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn has_stat(&self, stat: &str) -> bool {
        self.stats.iter().any(|s| s == stat)
    }

    fn is_two_handed(&self) -> bool {
        self.is_two_handed
    }

    fn power(&self) -> f64 {
        self.summary.max_power().unwrap_or(f64::NAN)
    }

    fn range(&self) -> Option<f64> {
        None
    }

    fn total_gold(&self) -> Option<i64> {
        self.summary.min_price()
    }

    fn platinum(&self) -> Option<i64> {
        None
    }

    fn gems(&self) -> Option<i64> {
        None
    }

    fn status(&self) -> Option<ItemStatus> {
        None
    }
}

impl FilterCriteria {
    pub fn is_empty(&self) -> bool {
        self == &FilterCriteria::default()
    }

    pub fn matches<T: Filterable + ?Sized>(&self, item: &T) -> bool {
        if let Some(needle) = &self.name {
            if !contains_ignore_case(item.item_name(), needle) {
                return false;
            }
        }
        if let Some(needle) = &self.username {
            match item.username() {
                Some(username) if contains_ignore_case(username, needle) => {}
                _ => return false,
            }
        }
        if let Some(exact) = &self.item_name {
            if item.item_name() != exact {
                return false;
            }
        }
        if let Some(slot) = &self.slot {
            if item.slot() != slot {
                return false;
            }
        }
        if let Some(class) = &self.class {
            if !item.classes().iter().any(|c| c == class) {
                return false;
            }
        }
        if let Some(stat) = &self.stat {
            if !item.has_stat(stat) {
                return false;
            }
        }
        match self.two_handed {
            Some(TwoHandedFilter::Yes) if !item.is_two_handed() => return false,
            Some(TwoHandedFilter::No) if item.is_two_handed() => return false,
            _ => {}
        }

        let power = Some(item.power()).filter(|p| !p.is_nan());
        if !within(power, self.min_power, self.max_power) {
            return false;
        }
        if !within(item.range(), self.min_range, self.max_range) {
            return false;
        }
        if !within(item.total_gold(), self.min_total_gold, self.max_total_gold) {
            return false;
        }
        if !within(item.platinum(), None, self.max_platinum) {
            return false;
        }
        if !within(item.gems(), None, self.max_gems) {
            return false;
        }

        if let Some(wanted) = self.status {
            match item.status() {
                Some(status) if status.matches(wanted) => {}
                _ => return false,
            }
        }

        true
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack
        .to_lowercase()
        .contains(needle.trim().to_lowercase().as_str())
}

fn within<T: PartialOrd>(value: Option<T>, min: Option<T>, max: Option<T>) -> bool {
    if min.is_none() && max.is_none() {
        return true;
    }
    let Some(value) = value else {
        return false;
    };
    if let Some(min) = min {
        if value < min {
            return false;
        }
    }
    if let Some(max) = max {
        if value > max {
            return false;
        }
    }
    true
}

pub fn apply_filters<T: Filterable + Clone>(items: &[T], criteria: &FilterCriteria) -> Vec<T> {
    items
        .iter()
        .filter(|item| criteria.matches(*item))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    TimeNewest,
    TimeOldest,
    PowerHigh,
    PowerLow,
    PriceHigh,
    PriceLow,
    Name,
    /// Cohort size, largest first.
    Listings,
    MaxPower,
    MinPrice,
    MaxPrice,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let key = match raw.trim() {
            "time_newest" => SortKey::TimeNewest,
            "time_oldest" => SortKey::TimeOldest,
            "power_high" => SortKey::PowerHigh,
            "power_low" => SortKey::PowerLow,
            "price_high" => SortKey::PriceHigh,
            "price_low" => SortKey::PriceLow,
            "name" => SortKey::Name,
            "listings" => SortKey::Listings,
            "max_power" | "maxPower" => SortKey::MaxPower,
            "min_price" | "minPrice" => SortKey::MinPrice,
            "max_price" | "maxPrice" => SortKey::MaxPrice,
            other => return Err(format!("unknown sort key `{other}`")),
        };
        Ok(key)
    }
}

/// Values a comparator can order by.
pub trait Sortable {
    fn sort_name(&self) -> &str;
    fn created_at(&self) -> Option<DateTime<Utc>>;
    fn id_text(&self) -> &str;
    fn power_value(&self) -> f64;
    fn price_value(&self) -> Option<i64>;
    fn listing_count(&self) -> usize;
    fn peak_power(&self) -> f64;
    fn floor_price(&self) -> Option<i64>;
    fn ceiling_price(&self) -> Option<i64>;
}

impl Sortable for ItemView {
    fn sort_name(&self) -> &str {
        &self.name
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn id_text(&self) -> &str {
        self.id.as_str()
    }

    fn power_value(&self) -> f64 {
        self.power_percent
    }

    fn price_value(&self) -> Option<i64> {
        Some(self.total_gold_value)
    }

    fn listing_count(&self) -> usize {
        1
    }

    fn peak_power(&self) -> f64 {
        self.power_percent
    }

    fn floor_price(&self) -> Option<i64> {
        Some(self.total_gold_value)
    }

    fn ceiling_price(&self) -> Option<i64> {
        Some(self.total_gold_value)
    }
}

impl Sortable for ItemCohort {
    fn sort_name(&self) -> &str {
        &self.name
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        None
    }

    fn id_text(&self) -> &str {
        self.base_item_id.as_str()
    }

    fn power_value(&self) -> f64 {
        self.summary.avg_power.unwrap_or(f64::NAN)
    }

    fn price_value(&self) -> Option<i64> {
        self.summary.min_price()
    }

    fn listing_count(&self) -> usize {
        self.summary.count
    }

    fn peak_power(&self) -> f64 {
        self.summary.max_power().unwrap_or(f64::NAN)
    }

    fn floor_price(&self) -> Option<i64> {
        self.summary.min_price()
    }

    fn ceiling_price(&self) -> Option<i64> {
        self.summary.max_price()
    }
}

/// Orders `f64`s with `NaN` always after real numbers, whichever direction.
fn cmp_power(a: f64, b: f64, descending: bool) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) if descending => b.total_cmp(&a),
        (false, false) => a.total_cmp(&b),
    }
}

/// Orders options with `None` always last, whichever direction.
fn cmp_present<T: Ord>(a: Option<T>, b: Option<T>, descending: bool) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) if descending => b.cmp(&a),
        (Some(a), Some(b)) => a.cmp(&b),
    }
}

/// Numeric ids numerically, then non-numeric ids by text.
fn cmp_ids<T: Sortable + ?Sized>(a: &T, b: &T, descending: bool) -> Ordering {
    let numeric = |item: &T| item.id_text().parse::<i64>().ok();
    cmp_present(numeric(a), numeric(b), descending).then_with(|| {
        if descending {
            b.id_text().cmp(a.id_text())
        } else {
            a.id_text().cmp(b.id_text())
        }
    })
}

pub fn compare_by<T: Sortable + ?Sized>(a: &T, b: &T, key: SortKey) -> Ordering {
    let primary = match key {
        SortKey::TimeNewest => {
            return cmp_present(a.created_at(), b.created_at(), true)
                .then_with(|| cmp_ids(a, b, true));
        }
        SortKey::TimeOldest => {
            return cmp_present(a.created_at(), b.created_at(), false)
                .then_with(|| cmp_ids(a, b, false));
        }
        SortKey::PowerHigh => cmp_power(a.power_value(), b.power_value(), true),
        SortKey::PowerLow => cmp_power(a.power_value(), b.power_value(), false),
        SortKey::PriceHigh => cmp_present(a.price_value(), b.price_value(), true),
        SortKey::PriceLow => cmp_present(a.price_value(), b.price_value(), false),
        SortKey::Name => a
            .sort_name()
            .to_lowercase()
            .cmp(&b.sort_name().to_lowercase())
            .then_with(|| a.sort_name().cmp(b.sort_name())),
        SortKey::Listings => b.listing_count().cmp(&a.listing_count()),
        SortKey::MaxPower => cmp_power(a.peak_power(), b.peak_power(), true),
        SortKey::MinPrice => cmp_present(a.floor_price(), b.floor_price(), false),
        SortKey::MaxPrice => cmp_present(a.ceiling_price(), b.ceiling_price(), true),
    };
    primary.then_with(|| cmp_ids(a, b, false))
}

pub fn sort_items<T: Sortable + Clone>(items: &[T], key: SortKey) -> Vec<T> {
    let mut sorted = items.to_vec();
    sorted.sort_by(|a, b| compare_by(a, b, key));
    sorted
}
