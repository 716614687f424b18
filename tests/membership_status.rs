use arena_market::{
    apply_filters, build_equipped_index, build_listed_index, status_of, Catalog, Character,
    CurrencyConfig, FilterCriteria, InventorySummary, ItemId, ItemNormalizer, ItemStatus, Listing,
    MembershipIndex, MyListing, Slot,
};
use serde_json::json;

fn characters() -> Vec<Character> {
    serde_json::from_value(json!([
        {"name": "Aria", "class": "Mage", "level": "12",
         "weapon_equip": 4821, "head_equip": "77", "back_equip": 9000,
         "ring_equip": -1, "feet_equip": "0", "skill1": "Fireball"},
        {"name": "Borin", "class": "Warrior", "level": 30,
         "body_equip": "5120", "hands_equip": null}
    ]))
    .expect("characters decode")
}

fn my_listings() -> Vec<MyListing> {
    serde_json::from_value(json!([
        {"id": 900, "player_item_id": 4821, "gold_cost": 10},
        {"id": 901, "item_id": "6000", "gold_cost": 20},
        {"id": 902, "player_item_id": "", "inventory_item_id": 6100},
        {"id": "903"}
    ]))
    .expect("my listings decode")
}

fn inventory() -> Vec<Listing> {
    serde_json::from_value(json!([
        {"id": "4821", "base_item_id": 10, "slot": "weapon", "power": 0.8},
        {"id": "77", "base_item_id": 20, "slot": "head", "power": 0.3},
        {"id": "6000", "base_item_id": 30, "slot": "ring", "power": 0.5},
        {"id": 8, "base_item_id": 30, "slot": "ring", "power": 0.1},
        {"id": "9000", "base_item_id": 40, "slot": "back", "power": 0.0}
    ]))
    .expect("inventory decode")
}

#[test]
fn numeric_equip_field_matches_string_inventory_id() {
    let equipped = build_equipped_index(&characters());
    assert!(equipped.contains(&ItemId::from("4821")));
    assert!(equipped.contains(&ItemId::from(4821u64)));
    assert!(equipped.contains(&ItemId::from("5120")));
}

#[test]
fn placeholders_and_cosmetics_are_not_equipment() {
    let equipped = build_equipped_index(&characters());
    assert!(!equipped.contains(&ItemId::from("-1")));
    assert!(!equipped.contains(&ItemId::from("0")));
    assert!(!equipped.contains(&ItemId::from("9000")));
    assert_eq!(equipped.len(), 3);
}

#[test]
fn rebuilding_indexes_is_idempotent() {
    let chars = characters();
    assert_eq!(build_equipped_index(&chars), build_equipped_index(&chars));
    let listings = my_listings();
    assert_eq!(build_listed_index(&listings), build_listed_index(&listings));
}

#[test]
fn listed_index_walks_owned_id_fallbacks() {
    let listed = build_listed_index(&my_listings());
    for id in ["4821", "6000", "6100", "903"] {
        assert!(listed.contains(&ItemId::from(id)), "missing {id}");
    }
    assert!(!listed.contains(&ItemId::from("900")));
}

#[test]
fn equipped_and_listed_resolves_to_composite() {
    let equipped = build_equipped_index(&characters());
    let listed = build_listed_index(&my_listings());

    assert_eq!(
        status_of(&ItemId::from("4821"), &equipped, &listed),
        ItemStatus::EquippedListed
    );
    assert_eq!(
        status_of(&ItemId::from("77"), &equipped, &listed),
        ItemStatus::Equipped
    );
    assert_eq!(
        status_of(&ItemId::from("6000"), &equipped, &listed),
        ItemStatus::Listed
    );
    assert_eq!(
        status_of(&ItemId::from("8"), &equipped, &listed),
        ItemStatus::Available
    );
}

#[test]
fn composite_items_satisfy_both_binary_filters() {
    let catalog = Catalog::default();
    let currency = CurrencyConfig::default();
    let membership = MembershipIndex::build(&characters(), &my_listings());
    let views = ItemNormalizer::new(&catalog, &currency)
        .with_membership(&membership)
        .normalize_all(&inventory());

    let ids_with = |status: ItemStatus| -> Vec<String> {
        let criteria = FilterCriteria {
            status: Some(status),
            ..FilterCriteria::default()
        };
        apply_filters(&views, &criteria)
            .into_iter()
            .map(|view| view.id.as_str().to_string())
            .collect()
    };

    assert_eq!(ids_with(ItemStatus::Equipped), vec!["4821", "77"]);
    assert_eq!(ids_with(ItemStatus::Listed), vec!["4821", "6000"]);
    assert_eq!(ids_with(ItemStatus::EquippedListed), vec!["4821"]);
    assert_eq!(ids_with(ItemStatus::Available), vec!["8", "9000"]);

    let summary = InventorySummary::from_views(&views);
    assert_eq!(summary.total, 5);
    assert_eq!(summary.statuses.equipped_listed, 1);
    assert_eq!(summary.statuses.equipped, 1);
    assert_eq!(summary.statuses.listed, 1);
    assert_eq!(summary.statuses.available, 2);
    assert_eq!(summary.slots[0].slot, Slot::Ring);
    assert_eq!(summary.slots[0].count, 2);
}

#[test]
fn character_keeps_level_skills_and_slot_map() {
    let chars = characters();
    let aria = &chars[0];
    assert_eq!(aria.level, Some(12));
    assert_eq!(aria.skills, vec!["Fireball".to_string()]);
    assert_eq!(aria.equipment.get(&Slot::Weapon), Some(&ItemId::from("4821")));
    assert!(!aria.equipment.contains_key(&Slot::Back));
    assert_eq!(chars[1].equipment.len(), 1);
}
