//! Static game-item catalog keyed by `(base item id, slot)`.
//!
//! The upstream class field arrives as an array, a JSON-encoded string or a delimited string
//! depending on the item; it is normalized once here into `Vec<String>`.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::listing::{normalize_stat_name, sanitize_label, ItemId, Slot};

/// Candidate class fields, first present wins.
const CLASS_FIELDS: [&str; 8] = [
    "class",
    "item_class",
    "Class",
    "classes",
    "wearable",
    "wearable_by",
    "usable_by",
    "restricted_to",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogItem {
    pub id: ItemId,
    pub slot: Slot,
    pub item_name: String,
    pub classes: Vec<String>,
    /// Rollable stat names for this base item, in catalog order, `A_Speed` already renamed.
    pub stat_options: Vec<String>,
    /// The catalog stat list carried a two-handed marker.
    pub two_handed: bool,
}

impl CatalogItem {
    pub fn from_value(value: &Value) -> Option<Self> {
        let fields = value.as_object()?;
        let id = fields.get("id").and_then(ItemId::from_json)?;
        if id.is_empty() {
            return None;
        }
        let slot = fields
            .get("slot")
            .and_then(Value::as_str)
            .map(Slot::parse)
            .unwrap_or_default();
        let item_name = fields
            .get("item_name")
            .or_else(|| fields.get("name"))
            .and_then(Value::as_str)
            .map(|name| name.trim().to_string())
            .unwrap_or_default();
        let classes = CLASS_FIELDS
            .iter()
            .find_map(|key| fields.get(*key).filter(|v| !v.is_null()))
            .map(parse_class_info)
            .unwrap_or_default();
        let (stat_options, two_handed) = fields
            .get("extra")
            .and_then(Value::as_str)
            .map(parse_stat_list)
            .unwrap_or_default();

        Some(Self {
            id,
            slot,
            item_name,
            classes,
            stat_options,
            two_handed,
        })
    }
}

/// Splits the catalog's comma separated stat list and pulls out the two-handed marker.
fn parse_stat_list(raw: &str) -> (Vec<String>, bool) {
    let mut stats: Vec<String> = Vec::new();
    let mut two_handed = false;

    for token in raw.split(',') {
        let label = sanitize_label(token);
        if label.is_empty() {
            continue;
        }
        if is_two_handed_marker(&label) {
            two_handed = true;
            continue;
        }
        let stat = normalize_stat_name(&label);
        if !stats.contains(&stat) {
            stats.push(stat);
        }
    }

    (stats, two_handed)
}

fn is_two_handed_marker(label: &str) -> bool {
    let squashed: String = label
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_ascii_lowercase();
    squashed.contains("twohand")
}

/// Array, JSON-in-a-string, or `"Warrior, Mage"` style delimited text.
pub fn parse_class_info(value: &Value) -> Vec<String> {
    let raw: Vec<String> = match value {
        Value::Array(items) => items.iter().filter_map(class_scalar).collect(),
        Value::String(text) => {
            let trimmed = text.trim();
            match serde_json::from_str::<Value>(trimmed) {
                Ok(Value::Array(items)) => items.iter().filter_map(class_scalar).collect(),
                Ok(Value::String(inner)) => split_delimited(&inner),
                _ => split_delimited(trimmed),
            }
        }
        other => class_scalar(other).into_iter().collect(),
    };

    let mut classes: Vec<String> = Vec::with_capacity(raw.len());
    for class in raw {
        let cleaned = sanitize_label(&class);
        if !cleaned.is_empty() && !classes.contains(&cleaned) {
            classes.push(cleaned);
        }
    }
    classes
}

fn class_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn split_delimited(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|part| {
            part.chars()
                .filter(|c| !matches!(c, '[' | ']' | '"' | '\''))
                .collect::<String>()
                .trim()
                .to_string()
        })
        .filter(|part| !part.is_empty())
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    items: HashMap<(ItemId, Slot), CatalogItem>,
}

impl Catalog {
    pub fn new(items: impl IntoIterator<Item = CatalogItem>) -> Self {
        let mut map = HashMap::new();
        for item in items {
            map.entry((item.id.clone(), item.slot.clone()))
                .or_insert(item);
        }
        Self { items: map }
    }

    /// Accepts `{items: [...]}`, `{game_items: [...]}` or a bare array. Anything else is an
    /// empty catalog.
    pub fn from_json(value: &Value) -> Self {
        let entries = match value {
            Value::Array(items) => Some(items),
            Value::Object(fields) => fields
                .get("items")
                .or_else(|| fields.get("game_items"))
                .and_then(Value::as_array),
            _ => None,
        };

        Self::new(
            entries
                .into_iter()
                .flatten()
                .filter_map(CatalogItem::from_value),
        )
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &ItemId, slot: &Slot) -> Option<&CatalogItem> {
        self.items.get(&(id.clone(), slot.clone()))
    }

    pub fn item_name(&self, id: &ItemId, slot: &Slot) -> Option<&str> {
        self.get(id, slot)
            .map(|item| item.item_name.as_str())
            .filter(|name| !name.is_empty())
    }

    pub fn items(&self) -> impl Iterator<Item = &CatalogItem> {
        self.items.values()
    }

    pub fn distinct_classes(&self) -> BTreeSet<String> {
        self.items
            .values()
            .flat_map(|item| item.classes.iter().cloned())
            .collect()
    }

    /// Every stat an item in the catalog can carry, innate slot stats included.
    pub fn stat_options(&self) -> BTreeSet<String> {
        let mut stats = BTreeSet::new();
        for item in self.items.values() {
            if let Some(innate) = item.slot.innate_stat() {
                stats.insert(innate.to_string());
            }
            stats.extend(item.stat_options.iter().cloned());
        }
        stats
    }
}

impl<'de> Deserialize<'de> for Catalog {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_json(&value))
    }
}
