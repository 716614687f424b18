//! Helpers over the user's own listings: value held, time left, expiry windows.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::config::CurrencyConfig;
use crate::listing::MyListing;
use crate::normalize::total_gold_value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Relaxed,
    Soon,
    Urgent,
    Critical,
    Expired,
}

impl Urgency {
    pub fn is_urgent(self) -> bool {
        matches!(self, Urgency::Urgent | Urgency::Critical | Urgency::Expired)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRemaining {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub urgency: Urgency,
}

impl TimeRemaining {
    /// `3d 4h` when at least a day remains, `4h 12m` otherwise.
    pub fn label(&self) -> String {
        match self.urgency {
            Urgency::Expired => "Expired".to_string(),
            _ if self.days >= 1 => format!("{}d {}h", self.days, self.hours),
            _ => format!("{}h {}m", self.hours, self.minutes),
        }
    }
}

pub fn time_remaining(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> TimeRemaining {
    let left = expires_at - now;
    if left <= Duration::zero() {
        return TimeRemaining {
            days: 0,
            hours: 0,
            minutes: 0,
            urgency: Urgency::Expired,
        };
    }

    let days = left.num_days();
    let hours = left.num_hours() % 24;
    let minutes = left.num_minutes() % 60;
    let urgency = if days > 1 {
        Urgency::Relaxed
    } else if days == 1 {
        Urgency::Soon
    } else if hours > 1 {
        Urgency::Urgent
    } else {
        Urgency::Critical
    };

    TimeRemaining {
        days,
        hours,
        minutes,
        urgency,
    }
}

/// Listings whose expiry is at most `hours` away. Listings without a readable expiry are
/// kept, since nothing proves they fall outside the window.
pub fn expiring_within(listings: &[MyListing], hours: f64, now: DateTime<Utc>) -> Vec<&MyListing> {
    listings
        .iter()
        .filter(|listing| match listing.listing.expires_at() {
            Some(expires_at) => {
                let hours_left = (expires_at - now).num_seconds() as f64 / 3_600.0;
                hours_left <= hours
            }
            None => true,
        })
        .collect()
}

/// Currency held in the user's listings. Platinum, gold and gems stay separate;
/// `total_gold_value` folds platinum into gold and leaves gems out.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListingTotals {
    pub count: usize,
    pub platinum: i64,
    pub gold: i64,
    pub gems: i64,
    pub total_gold_value: i64,
    pub urgent: usize,
    pub average_age_seconds: Option<i64>,
}

pub fn listing_totals(
    listings: &[MyListing],
    currency: &CurrencyConfig,
    now: DateTime<Utc>,
) -> ListingTotals {
    let mut totals = ListingTotals {
        count: listings.len(),
        ..ListingTotals::default()
    };
    let mut age_sum = 0i64;
    let mut aged = 0i64;

    for my_listing in listings {
        let listing = &my_listing.listing;
        totals.platinum = totals.platinum.saturating_add(listing.platinum_cost);
        totals.gold = totals.gold.saturating_add(listing.gold_cost);
        totals.gems = totals.gems.saturating_add(listing.gem_cost);
        totals.total_gold_value = totals
            .total_gold_value
            .saturating_add(total_gold_value(listing, currency));

        if let Some(expires_at) = listing.expires_at() {
            if time_remaining(expires_at, now).urgency.is_urgent() {
                totals.urgent += 1;
            }
        }
        if let Some(created_at) = listing.created_at() {
            age_sum = age_sum.saturating_add((now - created_at).num_seconds());
            aged += 1;
        }
    }

    totals.average_age_seconds = (aged > 0).then(|| age_sum / aged);
    totals
}
