//! Cohort statistics: one pass over the full listing collection.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::cohort::{ExactCohortKey, NO_STATS};
use crate::listing::{ItemId, Slot};
use crate::normalize::{serialize_nan_as_null, ItemView};

/// A concrete listing behind an extremum, so callers can link back to the offer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortPoint {
    pub listing_id: ItemId,
    #[serde(serialize_with = "serialize_nan_as_null")]
    pub power_percent: f64,
    pub price: i64,
}

impl CohortPoint {
    fn of(view: &ItemView) -> Self {
        Self {
            listing_id: view.id.clone(),
            power_percent: view.power_percent,
            price: view.total_gold_value,
        }
    }
}

/// Statistics shared by exact-item and slot cohorts.
///
/// Averages are `None` when undefined (empty cohort, non-numeric power, zero average power
/// for cost-per-power). `None` is never a stand-in for zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortStats {
    pub count: usize,
    pub members: Vec<ItemId>,
    pub lowest_power: Option<CohortPoint>,
    pub highest_power: Option<CohortPoint>,
    pub cheapest: Option<CohortPoint>,
    pub priciest: Option<CohortPoint>,
    pub avg_power: Option<f64>,
    pub avg_price: Option<f64>,
    pub avg_cost_per_power: Option<f64>,
}

impl CohortStats {
    pub fn min_power(&self) -> Option<f64> {
        self.lowest_power.as_ref().map(|p| p.power_percent)
    }

    pub fn max_power(&self) -> Option<f64> {
        self.highest_power.as_ref().map(|p| p.power_percent)
    }

    pub fn min_price(&self) -> Option<i64> {
        self.cheapest.as_ref().map(|p| p.price)
    }

    pub fn max_price(&self) -> Option<i64> {
        self.priciest.as_ref().map(|p| p.price)
    }
}

#[derive(Debug, Default)]
struct CohortAccumulator {
    members: Vec<ItemId>,
    lowest_power: Option<CohortPoint>,
    highest_power: Option<CohortPoint>,
    cheapest: Option<CohortPoint>,
    priciest: Option<CohortPoint>,
    sum_power: f64,
    sum_price: f64,
}

impl CohortAccumulator {
    fn push(&mut self, view: &ItemView) {
        self.members.push(view.id.clone());
        self.sum_power += view.power_percent;
        self.sum_price += view.total_gold_value as f64;

        // NaN power never wins an extremum but still poisons the average.
        if !view.power_percent.is_nan() {
            if self
                .lowest_power
                .as_ref()
                .map_or(true, |p| view.power_percent < p.power_percent)
            {
                self.lowest_power = Some(CohortPoint::of(view));
            }
            if self
                .highest_power
                .as_ref()
                .map_or(true, |p| view.power_percent > p.power_percent)
            {
                self.highest_power = Some(CohortPoint::of(view));
            }
        }
        if self
            .cheapest
            .as_ref()
            .map_or(true, |p| view.total_gold_value < p.price)
        {
            self.cheapest = Some(CohortPoint::of(view));
        }
        if self
            .priciest
            .as_ref()
            .map_or(true, |p| view.total_gold_value > p.price)
        {
            self.priciest = Some(CohortPoint::of(view));
        }
    }

    fn finish(self) -> CohortStats {
        let count = self.members.len();
        let avg_power = defined_ratio(self.sum_power, count as f64);
        let avg_price = defined_ratio(self.sum_price, count as f64);
        let avg_cost_per_power = match (avg_price, avg_power) {
            (Some(price), Some(power)) => defined_ratio(price, power),
            _ => None,
        };

        CohortStats {
            count,
            members: self.members,
            lowest_power: self.lowest_power,
            highest_power: self.highest_power,
            cheapest: self.cheapest,
            priciest: self.priciest,
            avg_power,
            avg_price,
            avg_cost_per_power,
        }
    }
}

fn defined_ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        return None;
    }
    let ratio = numerator / denominator;
    ratio.is_finite().then_some(ratio)
}

/// Price per power point, `None` when power is zero or not a number.
pub fn cost_per_power(price: i64, power_percent: f64) -> Option<f64> {
    defined_ratio(price as f64, power_percent)
}

/// Position of `value` within `[min, max]` as 0..=100.
///
/// A degenerate range (singleton or all-equal cohort) is the 100th percentile. A `NaN`
/// value stays `NaN`.
pub fn percentile_in_range(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        return f64::NAN;
    }
    let span = max - min;
    if !(span > 0.0) {
        return 100.0;
    }
    ((value - min) / span * 100.0).clamp(0.0, 100.0)
}

/// One exact-item cohort with its display metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemCohort {
    pub key: ExactCohortKey,
    pub name: String,
    pub slot: Slot,
    pub base_item_id: ItemId,
    pub class: Option<String>,
    pub classes: Vec<String>,
    pub power_type: String,
    pub stats: Vec<String>,
    pub stats_display: String,
    pub is_two_handed: bool,
    #[serde(flatten)]
    pub summary: CohortStats,
}

/// Exact-item cohorts keyed by identity. Rebuilt wholesale, never patched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CohortTable {
    cohorts: BTreeMap<ExactCohortKey, ItemCohort>,
}

impl CohortTable {
    pub fn len(&self) -> usize {
        self.cohorts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cohorts.is_empty()
    }

    pub fn get(&self, key: &ExactCohortKey) -> Option<&ItemCohort> {
        self.cohorts.get(key)
    }

    pub fn cohort_for(&self, view: &ItemView) -> Option<&ItemCohort> {
        self.get(&ExactCohortKey::for_view(view))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemCohort> {
        self.cohorts.values()
    }

    /// Sum of cohort sizes; equals the number of aggregated listings.
    pub fn member_count(&self) -> usize {
        self.cohorts.values().map(|c| c.summary.count).sum()
    }
}

struct CohortDraft<'v> {
    first: &'v ItemView,
    accumulator: CohortAccumulator,
}

/// Groups every view into exactly one exact-item cohort.
pub fn aggregate_by_exact_item(views: &[ItemView]) -> CohortTable {
    let mut drafts: BTreeMap<ExactCohortKey, CohortDraft<'_>> = BTreeMap::new();

    for view in views {
        let draft = match drafts.entry(ExactCohortKey::for_view(view)) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(CohortDraft {
                first: view,
                accumulator: CohortAccumulator::default(),
            }),
        };
        draft.accumulator.push(view);
    }

    let cohorts = drafts
        .into_iter()
        .map(|(key, draft)| {
            let first = draft.first;
            let stats: Vec<String> = first.stat_types.iter().cloned().collect();
            let stats_display = if stats.is_empty() {
                NO_STATS.to_string()
            } else {
                stats.join(" + ")
            };
            let cohort = ItemCohort {
                name: first.name.clone(),
                slot: first.slot.clone(),
                base_item_id: first.base_item_id.clone(),
                class: first.classes.first().cloned(),
                classes: first.classes.clone(),
                power_type: first.power_type.clone(),
                stats,
                stats_display,
                is_two_handed: first.is_two_handed,
                summary: draft.accumulator.finish(),
                key: key.clone(),
            };
            (key, cohort)
        })
        .collect();

    CohortTable { cohorts }
}

/// Market-wide statistics for one `(slot, power type)`; `None` when nothing matches.
pub fn aggregate_by_slot(views: &[ItemView], slot: &Slot, power_type: &str) -> Option<CohortStats> {
    let mut accumulator = CohortAccumulator::default();
    for view in views
        .iter()
        .filter(|view| &view.slot == slot && view.power_type == power_type)
    {
        accumulator.push(view);
    }

    if accumulator.members.is_empty() {
        None
    } else {
        Some(accumulator.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::config::CurrencyConfig;
    use crate::listing::Listing;
    use crate::normalize::ItemNormalizer;

    fn views(rows: &[(&str, &str, &str, f64, i64, Option<&str>)]) -> Vec<ItemView> {
        let catalog = Catalog::default();
        let currency = CurrencyConfig::default();
        let normalizer = ItemNormalizer::new(&catalog, &currency);
        rows.iter()
            .map(|(id, base, slot, power, gold, extra)| {
                normalizer.normalize(&Listing {
                    id: ItemId::from(*id),
                    base_item_id: ItemId::from(*base),
                    slot: Slot::parse(slot),
                    power: *power,
                    gold_cost: *gold,
                    extra: extra.map(str::to_string),
                    ..Listing::default()
                })
            })
            .collect()
    }

    #[test]
    fn two_listing_cohort_statistics() {
        let table = aggregate_by_exact_item(&views(&[
            ("1", "10", "weapon", 0.5, 100, None),
            ("2", "10", "weapon", 0.9, 900, None),
        ]));

        assert_eq!(table.len(), 1);
        let cohort = table.iter().next().expect("one cohort");
        let stats = &cohort.summary;
        assert_eq!(stats.count, 2);
        assert!((stats.min_power().unwrap() - 50.0).abs() < 1e-9);
        assert!((stats.max_power().unwrap() - 90.0).abs() < 1e-9);
        assert_eq!(stats.min_price(), Some(100));
        assert_eq!(stats.max_price(), Some(900));
        assert_eq!(
            stats.highest_power.as_ref().map(|p| p.listing_id.as_str()),
            Some("2")
        );
        assert!((stats.avg_power.unwrap() - 70.0).abs() < 1e-9);
        assert!((stats.avg_price.unwrap() - 500.0).abs() < 1e-9);
        assert!((stats.avg_cost_per_power.unwrap() - 500.0 / 70.0).abs() < 1e-9);
        assert_eq!(cohort.stats_display, "Damage");
    }

    #[test]
    fn zero_average_power_leaves_cost_per_power_undefined() {
        let table = aggregate_by_exact_item(&views(&[("1", "10", "weapon", 0.0, 100, None)]));
        let stats = &table.iter().next().expect("cohort").summary;
        assert_eq!(stats.avg_power, Some(0.0));
        assert_eq!(stats.avg_cost_per_power, None);
    }

    #[test]
    fn nan_power_makes_average_undefined_but_keeps_membership() {
        let table = aggregate_by_exact_item(&views(&[
            ("1", "10", "weapon", f64::NAN, 100, None),
            ("2", "10", "weapon", 0.6, 200, None),
        ]));
        let stats = &table.iter().next().expect("cohort").summary;
        assert_eq!(stats.count, 2);
        assert_eq!(stats.avg_power, None);
        assert_eq!(stats.avg_cost_per_power, None);
        assert_eq!(
            stats.lowest_power.as_ref().map(|p| p.listing_id.as_str()),
            Some("2")
        );
    }

    #[test]
    fn slot_cohort_ignores_base_item_and_stats() {
        let all = views(&[
            ("1", "10", "ring", 0.2, 10, Some(r#"{"extra":"Crit"}"#)),
            ("2", "11", "ring", 0.8, 80, Some(r#"{"extra":"Crit"}"#)),
            ("3", "11", "ring", 0.9, 90, Some(r#"{"extra":"Dodge"}"#)),
        ]);
        let stats = aggregate_by_slot(&all, &Slot::Ring, "Crit").expect("slot cohort");
        assert_eq!(stats.count, 2);
        assert_eq!(stats.max_price(), Some(80));
        assert!(aggregate_by_slot(&all, &Slot::Neck, "Crit").is_none());
    }

    #[test]
    fn percentile_degenerate_range_is_maximal() {
        assert_eq!(percentile_in_range(5.0, 5.0, 5.0), 100.0);
        assert_eq!(percentile_in_range(75.0, 50.0, 100.0), 50.0);
        assert_eq!(percentile_in_range(120.0, 50.0, 100.0), 100.0);
        assert!(percentile_in_range(f64::NAN, 0.0, 1.0).is_nan());
    }
}
