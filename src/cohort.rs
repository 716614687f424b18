//! Grouping keys for cohorts.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::listing::{ItemId, Slot};
use crate::normalize::ItemView;

/// Stat segment used when an item has no stats at all.
pub const NO_STATS: &str = "No Stats";

/// Identity of an exact-item cohort: base item, slot, sorted stat set and two-handedness.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ExactCohortKey {
    pub base_item_id: ItemId,
    pub slot: Slot,
    pub stats: String,
    pub two_handed: bool,
}

impl ExactCohortKey {
    pub fn new<'s>(
        base_item_id: &ItemId,
        slot: &Slot,
        stats: impl IntoIterator<Item = &'s str>,
        two_handed: bool,
    ) -> Self {
        Self {
            base_item_id: base_item_id.clone(),
            slot: slot.clone(),
            stats: stats_segment(stats),
            two_handed,
        }
    }

    pub fn for_view(view: &ItemView) -> Self {
        Self::new(
            &view.base_item_id,
            &view.slot,
            view.stat_types.iter().map(String::as_str),
            view.is_two_handed,
        )
    }
}

impl fmt::Display for ExactCohortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}",
            self.base_item_id, self.slot, self.stats, self.two_handed
        )
    }
}

/// Sorted, de-duplicated `+`-joined stat names, or [`NO_STATS`].
pub fn stats_segment<'s>(stats: impl IntoIterator<Item = &'s str>) -> String {
    let sorted: BTreeSet<&str> = stats
        .into_iter()
        .map(str::trim)
        .filter(|stat| !stat.is_empty())
        .collect();
    if sorted.is_empty() {
        NO_STATS.to_string()
    } else {
        sorted.into_iter().collect::<Vec<_>>().join("+")
    }
}

/// Market-wide comparison key: slot plus power type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SlotCohortKey {
    pub slot: Slot,
    pub power_type: String,
}

impl SlotCohortKey {
    pub fn new(slot: Slot, power_type: impl Into<String>) -> Self {
        Self {
            slot,
            power_type: power_type.into(),
        }
    }

    pub fn for_view(view: &ItemView) -> Self {
        Self::new(view.slot.clone(), view.power_type.clone())
    }
}

impl fmt::Display for SlotCohortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.slot, self.power_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stat_order_does_not_change_identity() {
        let id = ItemId::from("10");
        let a = ExactCohortKey::new(&id, &Slot::Weapon, ["HP", "Damage"], false);
        let b = ExactCohortKey::new(&id, &Slot::Weapon, ["Damage", "HP"], false);
        assert_eq!(a, b);
        assert_eq!(a.stats, "Damage+HP");
    }

    #[test]
    fn empty_stats_collapse_to_sentinel() {
        let id = ItemId::from("10");
        let empty = ExactCohortKey::new(&id, &Slot::Ring, std::iter::empty(), false);
        let blank = ExactCohortKey::new(&id, &Slot::Ring, ["", "  "], false);
        assert_eq!(empty.stats, NO_STATS);
        assert_eq!(blank.stats, NO_STATS);
        assert_eq!(empty.to_string(), "10_ring_No Stats_false");
    }

    #[test]
    fn two_handed_flag_splits_cohorts() {
        let id = ItemId::from("10");
        let one = ExactCohortKey::new(&id, &Slot::Weapon, ["Damage"], false);
        let two = ExactCohortKey::new(&id, &Slot::Weapon, ["Damage"], true);
        assert_ne!(one, two);
    }
}
