//! Equipped/listed membership indexes and inventory status resolution.
//!
//! Both indexes are derived caches. They are rebuilt from the full character roster or the
//! full my-listings collection every time, never patched in place.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::listing::{ItemId, MyListing, Slot};
use crate::normalize::ItemView;

const EQUIP_SUFFIX: &str = "_equip";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemStatus {
    Available,
    Equipped,
    Listed,
    EquippedListed,
}

impl ItemStatus {
    pub fn resolve(equipped: bool, listed: bool) -> Self {
        match (equipped, listed) {
            (true, true) => ItemStatus::EquippedListed,
            (true, false) => ItemStatus::Equipped,
            (false, true) => ItemStatus::Listed,
            (false, false) => ItemStatus::Available,
        }
    }

    /// Whether an item with this status shows up under a status filter. An item that is
    /// both equipped and listed shows up under either filter as well as its own.
    pub fn matches(self, filter: ItemStatus) -> bool {
        match filter {
            ItemStatus::Equipped => {
                matches!(self, ItemStatus::Equipped | ItemStatus::EquippedListed)
            }
            ItemStatus::Listed => matches!(self, ItemStatus::Listed | ItemStatus::EquippedListed),
            other => self == other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Available => "available",
            ItemStatus::Equipped => "equipped",
            ItemStatus::Listed => "listed",
            ItemStatus::EquippedListed => "equipped-listed",
        }
    }
}

impl FromStr for ItemStatus {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "available" => Ok(ItemStatus::Available),
            "equipped" => Ok(ItemStatus::Equipped),
            "listed" => Ok(ItemStatus::Listed),
            "equipped-listed" | "equipped_listed" => Ok(ItemStatus::EquippedListed),
            other => Err(format!("unknown item status `{other}`")),
        }
    }
}

/// A player character with its functional equipment.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Character {
    pub name: String,
    pub class: String,
    pub level: Option<i64>,
    pub skills: Vec<String>,
    /// Occupied functional slots only; cosmetic `back` and placeholder ids are dropped.
    pub equipment: BTreeMap<Slot, ItemId>,
}

impl Character {
    /// Lifts every `<slot>_equip` field of an upstream record into [`Character::equipment`].
    pub fn from_value(value: &Value) -> Option<Self> {
        let fields = value.as_object()?;

        let text = |key: &str| -> String {
            match fields.get(key) {
                Some(Value::String(text)) => text.trim().to_string(),
                Some(Value::Number(number)) => number.to_string(),
                _ => String::new(),
            }
        };

        let mut equipment = BTreeMap::new();
        for (key, raw) in fields {
            let Some(slot_name) = key.strip_suffix(EQUIP_SUFFIX) else {
                continue;
            };
            let slot = Slot::parse(slot_name);
            if slot.is_cosmetic() {
                continue;
            }
            if let Some(id) = ItemId::from_json(raw).filter(|id| !id.is_placeholder()) {
                equipment.insert(slot, id);
            }
        }

        let skills = (1..=5)
            .map(|n| text(&format!("skill{n}")))
            .filter(|skill| !skill.is_empty())
            .collect();

        let level = match fields.get("level") {
            Some(Value::Number(number)) => number.as_i64(),
            Some(Value::String(text)) => text.trim().parse().ok(),
            _ => None,
        };

        Some(Self {
            name: text("name"),
            class: text("class"),
            level,
            skills,
            equipment,
        })
    }

    pub fn equipped_ids(&self) -> impl Iterator<Item = &ItemId> {
        self.equipment.values()
    }
}

impl<'de> Deserialize<'de> for Character {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Character::from_value(&value)
            .ok_or_else(|| serde::de::Error::custom("character record must be a JSON object"))
    }
}

pub fn build_equipped_index(characters: &[Character]) -> HashSet<ItemId> {
    characters
        .iter()
        .flat_map(Character::equipped_ids)
        .filter(|id| !id.is_placeholder())
        .cloned()
        .collect()
}

pub fn build_listed_index(my_listings: &[MyListing]) -> HashSet<ItemId> {
    my_listings
        .iter()
        .filter_map(MyListing::owned_item_id)
        .cloned()
        .collect()
}

pub fn status_of(
    id: &ItemId,
    equipped: &HashSet<ItemId>,
    listed: &HashSet<ItemId>,
) -> ItemStatus {
    ItemStatus::resolve(equipped.contains(id), listed.contains(id))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MembershipIndex {
    equipped: HashSet<ItemId>,
    listed: HashSet<ItemId>,
}

impl MembershipIndex {
    pub fn build(characters: &[Character], my_listings: &[MyListing]) -> Self {
        Self {
            equipped: build_equipped_index(characters),
            listed: build_listed_index(my_listings),
        }
    }

    pub fn status_of(&self, id: &ItemId) -> ItemStatus {
        status_of(id, &self.equipped, &self.listed)
    }

    pub fn equipped(&self) -> &HashSet<ItemId> {
        &self.equipped
    }

    pub fn listed(&self) -> &HashSet<ItemId> {
        &self.listed
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub available: usize,
    pub equipped: usize,
    pub listed: usize,
    pub equipped_listed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotCount {
    pub slot: Slot,
    pub count: usize,
}

/// Status and slot breakdown of an inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InventorySummary {
    pub total: usize,
    pub statuses: StatusCounts,
    /// Sorted by count descending, then slot.
    pub slots: Vec<SlotCount>,
    /// Distinct `(name, slot, power type)` combinations.
    pub unique_items: usize,
}

impl InventorySummary {
    pub fn from_views(views: &[ItemView]) -> Self {
        let mut statuses = StatusCounts::default();
        let mut per_slot: HashMap<&Slot, usize> = HashMap::new();
        let mut unique: HashSet<(&str, &Slot, &str)> = HashSet::new();

        for view in views {
            match view.status {
                ItemStatus::Available => statuses.available += 1,
                ItemStatus::Equipped => statuses.equipped += 1,
                ItemStatus::Listed => statuses.listed += 1,
                ItemStatus::EquippedListed => statuses.equipped_listed += 1,
            }
            *per_slot.entry(&view.slot).or_default() += 1;
            unique.insert((view.name.as_str(), &view.slot, view.power_type.as_str()));
        }

        let mut slots: Vec<SlotCount> = per_slot
            .into_iter()
            .map(|(slot, count)| SlotCount {
                slot: slot.clone(),
                count,
            })
            .collect();
        slots.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.slot.cmp(&b.slot)));

        Self {
            total: views.len(),
            statuses,
            slots,
            unique_items: unique.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn equipment_is_lifted_from_equip_suffixed_fields() {
        let character = Character::from_value(&json!({
            "name": "Ayla",
            "class": "Mage",
            "level": "12",
            "skill1": "Fireball",
            "skill3": "Blink",
            "weapon_equip": 4821,
            "head_equip": "-1",
            "ring_equip": "0",
            "back_equip": 77,
            "feet_equip": " 19 "
        }))
        .expect("character parses");

        assert_eq!(character.level, Some(12));
        assert_eq!(character.skills, vec!["Fireball", "Blink"]);
        assert_eq!(
            character.equipment.get(&Slot::Weapon),
            Some(&ItemId::from("4821"))
        );
        assert_eq!(character.equipment.get(&Slot::Feet), Some(&ItemId::from("19")));
        assert!(!character.equipment.contains_key(&Slot::Head));
        assert!(!character.equipment.contains_key(&Slot::Ring));
        assert!(!character.equipment.contains_key(&Slot::Back));
    }

    #[test]
    fn composite_status_matches_both_binary_filters() {
        let both = ItemStatus::resolve(true, true);
        assert_eq!(both, ItemStatus::EquippedListed);
        assert!(both.matches(ItemStatus::Equipped));
        assert!(both.matches(ItemStatus::Listed));
        assert!(both.matches(ItemStatus::EquippedListed));
        assert!(!both.matches(ItemStatus::Available));
        assert!(!ItemStatus::Equipped.matches(ItemStatus::Listed));
        assert_eq!(
            serde_json::to_value(both).expect("serializes"),
            json!("equipped-listed")
        );
    }

    #[test]
    fn summary_counts_statuses_and_slots() {
        use crate::catalog::Catalog;
        use crate::config::CurrencyConfig;
        use crate::listing::Listing;
        use crate::normalize::ItemNormalizer;

        let catalog = Catalog::default();
        let currency = CurrencyConfig::default();
        let characters = vec![Character {
            equipment: BTreeMap::from([(Slot::Weapon, ItemId::from("1"))]),
            ..Character::default()
        }];
        let my_listings = vec![MyListing {
            item_id: Some(ItemId::from("1")),
            ..MyListing::default()
        }];
        let index = MembershipIndex::build(&characters, &my_listings);
        let normalizer = ItemNormalizer::new(&catalog, &currency).with_membership(&index);
        let inventory = [("1", "weapon"), ("2", "weapon"), ("3", "head")]
            .into_iter()
            .map(|(id, slot)| Listing {
                id: ItemId::from(id),
                slot: Slot::parse(slot),
                power: 0.5,
                ..Listing::default()
            })
            .collect::<Vec<_>>();
        let views = normalizer.normalize_all(&inventory);

        let summary = InventorySummary::from_views(&views);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.statuses.equipped_listed, 1);
        assert_eq!(summary.statuses.available, 2);
        assert_eq!(summary.slots[0].slot, Slot::Weapon);
        assert_eq!(summary.slots[0].count, 2);
        assert_eq!(summary.unique_items, 2);
    }
}
