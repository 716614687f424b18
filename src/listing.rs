//! Raw marketplace records: item ids, slots, listings and the auxiliary `extra` payload.
//!
//! Upstream records are loosely typed (ids arrive as numbers or strings, costs as numeric
//! strings, `extra` as an embedded JSON document). Everything here is lenient at the
//! boundary so that the analytics layers downstream only ever see canonical values.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

const MAX_LABEL_LEN: usize = 64;

/// String-normalized identifier shared by listings, inventory items and catalog entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_string())
    }

    /// Coerces a JSON scalar into an id. `null`, booleans and containers are not ids.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(raw) => Some(Self::new(raw)),
            Value::Number(number) => {
                if let Some(v) = number.as_i64() {
                    Some(Self(v.to_string()))
                } else if let Some(v) = number.as_u64() {
                    Some(Self(v.to_string()))
                } else {
                    number.as_f64().map(|v| {
                        if v.is_finite() && v.fract() == 0.0 {
                            Self(format!("{}", v as i64))
                        } else {
                            Self(v.to_string())
                        }
                    })
                }
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Empty, `-1` and `0` mark an unoccupied reference rather than a real item.
    pub fn is_placeholder(&self) -> bool {
        matches!(self.0.as_str(), "" | "-1" | "0")
    }

    pub fn as_number(&self) -> Option<i64> {
        self.0.parse().ok()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for ItemId {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<u64> for ItemId {
    fn from(raw: u64) -> Self {
        Self(raw.to_string())
    }
}

impl From<i64> for ItemId {
    fn from(raw: i64) -> Self {
        Self(raw.to_string())
    }
}

impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_json(&value).unwrap_or_default())
    }
}

/// Equipment slot an item occupies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    Weapon,
    Head,
    Body,
    Hands,
    Feet,
    Neck,
    Ring,
    OffHand,
    Back,
    Other(String),
}

/// Functional equipment slots. `back` is cosmetic and never counts as equipped gear.
pub const EQUIPMENT_SLOTS: [Slot; 8] = [
    Slot::Weapon,
    Slot::Head,
    Slot::Body,
    Slot::Hands,
    Slot::Feet,
    Slot::Neck,
    Slot::Ring,
    Slot::OffHand,
];

impl Slot {
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "weapon" => Slot::Weapon,
            "head" => Slot::Head,
            "body" => Slot::Body,
            "hands" => Slot::Hands,
            "feet" => Slot::Feet,
            "neck" => Slot::Neck,
            "ring" => Slot::Ring,
            "off_hand" => Slot::OffHand,
            "back" => Slot::Back,
            _ => Slot::Other(normalized),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Slot::Weapon => "weapon",
            Slot::Head => "head",
            Slot::Body => "body",
            Slot::Hands => "hands",
            Slot::Feet => "feet",
            Slot::Neck => "neck",
            Slot::Ring => "ring",
            Slot::OffHand => "off_hand",
            Slot::Back => "back",
            Slot::Other(raw) => raw,
        }
    }

    pub fn is_cosmetic(&self) -> bool {
        matches!(self, Slot::Back)
    }

    /// Stat every item in this slot carries regardless of its rolled extra.
    pub fn innate_stat(&self) -> Option<&'static str> {
        match self {
            Slot::Weapon => Some("Damage"),
            Slot::Head | Slot::Body => Some("HP"),
            Slot::Hands => Some("Attack Speed"),
            Slot::Feet => Some("Movement Speed"),
            _ => None,
        }
    }

    /// `off_hand` -> `Off Hand`.
    pub fn label(&self) -> String {
        self.as_str()
            .split('_')
            .filter(|word| !word.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for Slot {
    fn default() -> Self {
        Slot::Other(String::new())
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Slot {
    type Err = Infallible;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Ok(Slot::parse(raw))
    }
}

impl Serialize for Slot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Slot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::String(raw) => Slot::parse(&raw),
            _ => Slot::default(),
        })
    }
}

/// A marketplace offer or an inventory-held item instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Listing {
    pub id: ItemId,
    pub base_item_id: ItemId,
    pub slot: Slot,
    #[serde(deserialize_with = "lenient_string")]
    pub username: String,
    /// Stored fraction (`0.5` is 50%). `NaN` when upstream sent something non-numeric.
    #[serde(deserialize_with = "lenient_power")]
    pub power: f64,
    #[serde(deserialize_with = "lenient_payload")]
    pub extra: Option<String>,
    #[serde(deserialize_with = "lenient_int")]
    pub platinum_cost: i64,
    #[serde(deserialize_with = "lenient_int")]
    pub gold_cost: i64,
    #[serde(deserialize_with = "lenient_int")]
    pub gem_cost: i64,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub time_created: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub time_expires: Option<String>,
}

impl Default for Listing {
    fn default() -> Self {
        Self {
            id: ItemId::default(),
            base_item_id: ItemId::default(),
            slot: Slot::default(),
            username: String::new(),
            power: f64::NAN,
            extra: None,
            platinum_cost: 0,
            gold_cost: 0,
            gem_cost: 0,
            time_created: None,
            time_expires: None,
        }
    }
}

impl Listing {
    pub fn parsed_extra(&self) -> ListingExtra {
        ListingExtra::from_payload(self.extra.as_deref())
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.time_created.as_deref().and_then(parse_timestamp)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.time_expires.as_deref().and_then(parse_timestamp)
    }
}

/// One of the user's own listings. Upstream is inconsistent about which field carries the
/// underlying inventory item id, so every known spelling is kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MyListing {
    #[serde(flatten)]
    pub listing: Listing,
    #[serde(default)]
    pub player_item_id: Option<ItemId>,
    #[serde(default)]
    pub item_id: Option<ItemId>,
    #[serde(default)]
    pub inventory_item_id: Option<ItemId>,
    #[serde(default, rename = "playerItemId")]
    pub player_item_id_alt: Option<ItemId>,
}

impl MyListing {
    /// Inventory item behind this listing:
    /// `player_item_id -> item_id -> inventory_item_id -> playerItemId -> id`.
    pub fn owned_item_id(&self) -> Option<&ItemId> {
        [
            self.player_item_id.as_ref(),
            self.item_id.as_ref(),
            self.inventory_item_id.as_ref(),
            self.player_item_id_alt.as_ref(),
            Some(&self.listing.id),
        ]
        .into_iter()
        .flatten()
        .find(|id| !id.is_empty())
    }
}

/// Why an optional JSON payload produced no value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Absent {
    #[error("payload missing")]
    Missing,
    #[error("payload malformed: {0}")]
    Malformed(String),
}

/// Decodes an optional embedded JSON document. Blank input is `Missing`, undecodable input
/// is `Malformed`; neither is an error for the caller's pipeline.
pub fn parse_optional_json<T: DeserializeOwned>(raw: Option<&str>) -> Result<T, Absent> {
    let trimmed = match raw.map(str::trim) {
        Some(text) if !text.is_empty() => text,
        _ => return Err(Absent::Missing),
    };

    serde_json::from_str(trimmed).map_err(|err| Absent::Malformed(err.to_string()))
}

/// Fields read from a listing's `extra` payload, already sanitized.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListingExtra {
    pub stat: Option<String>,
    pub range: Option<f64>,
    pub two_handed: Option<String>,
}

impl ListingExtra {
    pub fn from_payload(raw: Option<&str>) -> Self {
        match parse_optional_json::<Value>(raw) {
            Ok(value) => Self::from_value(&value),
            Err(Absent::Missing) => Self::default(),
            Err(Absent::Malformed(reason)) => {
                debug!(
                    component = "listing",
                    event = "listing.extra.malformed",
                    reason = %reason
                );
                Self::default()
            }
        }
    }

    pub fn from_value(value: &Value) -> Self {
        let Value::Object(fields) = value else {
            return Self::default();
        };

        let stat = fields
            .get("extra")
            .and_then(Value::as_str)
            .map(sanitize_label)
            .filter(|label| !label.is_empty())
            .map(|label| normalize_stat_name(&label));

        let range = fields.get("range").and_then(|raw| match raw {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        });

        let two_handed = fields
            .get("Two_handed")
            .or_else(|| fields.get("two_handed"))
            .and_then(two_handed_label);

        Self {
            stat,
            range: range.filter(|v| v.is_finite()),
            two_handed,
        }
    }
}

fn two_handed_label(value: &Value) -> Option<String> {
    match value {
        Value::Bool(true) => Some("Yes".to_string()),
        Value::Number(number) => match number.as_f64() {
            Some(v) if v != 0.0 && !v.is_nan() => Some(number.to_string()),
            _ => None,
        },
        Value::String(text) if !text.is_empty() => {
            let label = sanitize_label(text);
            Some(if label.is_empty() { "Yes".to_string() } else { label })
        }
        Value::Array(_) | Value::Object(_) => Some("Yes".to_string()),
        _ => None,
    }
}

/// Restricts an untrusted label to `[A-Za-z0-9 _-.+%]`.
pub fn sanitize_label(raw: &str) -> String {
    let filtered: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-' | '.' | '+' | '%'))
        .take(MAX_LABEL_LEN)
        .collect();
    filtered.trim().to_string()
}

pub fn normalize_stat_name(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "A_Speed" {
        "Attack Speed".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Accepts RFC 3339 and the portal's `YYYY-MM-DD HH:MM:SS` (UTC) format.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(lenient_opt_string(deserializer)?.unwrap_or_default())
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    })
}

fn lenient_power<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(number) => number.as_f64().unwrap_or(f64::NAN),
        Value::String(text) => text.trim().parse::<f64>().unwrap_or(f64::NAN),
        _ => f64::NAN,
    })
}

fn lenient_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|v| v.is_finite()).map(|v| v.trunc() as i64))
            .unwrap_or(0),
        Value::String(text) => {
            let trimmed = text.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| {
                    trimmed
                        .parse::<f64>()
                        .ok()
                        .filter(|v| v.is_finite())
                        .map(|v| v.trunc() as i64)
                })
                .unwrap_or(0)
        }
        _ => 0,
    })
}

fn lenient_payload<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    })
}
