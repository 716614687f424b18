//! How one item stands against its exact-item cohort and its slot cohort.

use serde::Serialize;

use crate::aggregate::{cost_per_power, percentile_in_range, CohortStats};
use crate::normalize::ItemView;
use crate::tier::{classify_tier, Tier};

const TOP_BAND: f64 = 0.9;
const BOTTOM_BAND: f64 = 1.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Standing {
    Good,
    Neutral,
    Bad,
}

/// Good within 10% of the cohort's best power, bad within 10% of its worst.
pub fn power_standing(power: f64, min: f64, max: f64) -> Standing {
    if power.is_nan() {
        Standing::Neutral
    } else if power >= max * TOP_BAND {
        Standing::Good
    } else if power <= min * BOTTOM_BAND {
        Standing::Bad
    } else {
        Standing::Neutral
    }
}

/// Good within 10% of the cheapest offer, bad within 10% of the priciest.
pub fn price_standing(price: i64, min: i64, max: i64) -> Standing {
    let price = price as f64;
    if price <= min as f64 * BOTTOM_BAND {
        Standing::Good
    } else if price >= max as f64 * TOP_BAND {
        Standing::Bad
    } else {
        Standing::Neutral
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortComparison {
    pub sample_size: usize,
    pub min_power: Option<f64>,
    pub max_power: Option<f64>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub avg_cost_per_power: Option<f64>,
    /// Item's own price per power point.
    pub cost_per_power: Option<f64>,
    pub power_percentile: Option<f64>,
    /// 0 is the cheapest offer in the cohort.
    pub price_percentile: Option<f64>,
    pub power_tier: Option<Tier>,
    /// Tier of the inverted price percentile: cheaper grades higher.
    pub value_tier: Option<Tier>,
    pub power_standing: Standing,
    pub price_standing: Standing,
}

pub fn compare_against(view: &ItemView, stats: &CohortStats) -> CohortComparison {
    let power = view.power_percent;
    let price = view.total_gold_value;

    let power_percentile = match (stats.min_power(), stats.max_power()) {
        (Some(min), Some(max)) => Some(percentile_in_range(power, min, max)),
        _ => None,
    }
    .filter(|p| !p.is_nan());
    let price_percentile = match (stats.min_price(), stats.max_price()) {
        (Some(min), Some(max)) => Some(percentile_in_range(price as f64, min as f64, max as f64)),
        _ => None,
    };

    let power_standing = match (stats.min_power(), stats.max_power()) {
        (Some(min), Some(max)) => power_standing(power, min, max),
        _ => Standing::Neutral,
    };
    let price_standing = match (stats.min_price(), stats.max_price()) {
        (Some(min), Some(max)) => price_standing(price, min, max),
        _ => Standing::Neutral,
    };

    CohortComparison {
        sample_size: stats.count,
        min_power: stats.min_power(),
        max_power: stats.max_power(),
        min_price: stats.min_price(),
        max_price: stats.max_price(),
        avg_cost_per_power: stats.avg_cost_per_power,
        cost_per_power: cost_per_power(price, power),
        power_percentile,
        price_percentile,
        power_tier: power_percentile.map(|p| classify_tier(p, stats.count)),
        value_tier: price_percentile.map(|p| classify_tier(100.0 - p, stats.count)),
        power_standing,
        price_standing,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ItemComparison {
    pub same_item: Option<CohortComparison>,
    pub same_slot: Option<CohortComparison>,
}

impl ItemComparison {
    pub fn new(
        view: &ItemView,
        item_cohort: Option<&CohortStats>,
        slot_cohort: Option<&CohortStats>,
    ) -> Self {
        Self {
            same_item: item_cohort.map(|stats| compare_against(view, stats)),
            same_slot: slot_cohort.map(|stats| compare_against(view, stats)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate_by_exact_item;
    use crate::catalog::Catalog;
    use crate::config::CurrencyConfig;
    use crate::listing::{ItemId, Listing, Slot};
    use crate::normalize::ItemNormalizer;
    use crate::tier::TierGrade;

    fn weapon(id: &str, power: f64, gold: i64) -> ItemView {
        let catalog = Catalog::default();
        let currency = CurrencyConfig::default();
        ItemNormalizer::new(&catalog, &currency).normalize(&Listing {
            id: ItemId::from(id),
            base_item_id: ItemId::from("10"),
            slot: Slot::Weapon,
            power,
            gold_cost: gold,
            ..Listing::default()
        })
    }

    #[test]
    fn strongest_item_in_pair_is_b_tier() {
        let views = vec![weapon("1", 0.5, 100), weapon("2", 0.9, 900)];
        let table = aggregate_by_exact_item(&views);
        let cohort = table.cohort_for(&views[1]).expect("cohort exists");

        let comparison = compare_against(&views[1], &cohort.summary);
        assert_eq!(comparison.power_percentile, Some(100.0));
        assert_eq!(comparison.power_tier.map(|t| t.tier), Some(TierGrade::B));
        assert_eq!(comparison.power_standing, Standing::Good);
        assert_eq!(comparison.price_standing, Standing::Bad);
        assert_eq!(comparison.price_percentile, Some(100.0));
        assert!((comparison.cost_per_power.unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn singleton_cohort_is_maximal() {
        let views = vec![weapon("1", 0.4, 100)];
        let table = aggregate_by_exact_item(&views);
        let cohort = table.cohort_for(&views[0]).expect("cohort exists");
        let comparison = compare_against(&views[0], &cohort.summary);
        assert_eq!(comparison.power_percentile, Some(100.0));
        assert_eq!(comparison.price_percentile, Some(100.0));
    }

    #[test]
    fn standings_use_ten_percent_bands() {
        assert_eq!(power_standing(91.0, 10.0, 100.0), Standing::Good);
        assert_eq!(power_standing(10.5, 10.0, 100.0), Standing::Bad);
        assert_eq!(power_standing(50.0, 10.0, 100.0), Standing::Neutral);
        assert_eq!(price_standing(105, 100, 1_000), Standing::Good);
        assert_eq!(price_standing(950, 100, 1_000), Standing::Bad);
        assert_eq!(price_standing(500, 100, 1_000), Standing::Neutral);
    }

    #[test]
    fn nan_power_has_no_tier() {
        let views = vec![weapon("1", 0.4, 100), weapon("2", f64::NAN, 50)];
        let table = aggregate_by_exact_item(&views);
        let cohort = table.cohort_for(&views[1]).expect("cohort exists");
        let comparison = compare_against(&views[1], &cohort.summary);
        assert_eq!(comparison.power_percentile, None);
        assert_eq!(comparison.power_tier, None);
        assert_eq!(comparison.cost_per_power, None);
    }
}
