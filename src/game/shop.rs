//! Global shop stock and player marketplace listings.
//!
//! The global shop is a fixed catalog of priced entries with optional
//! limited stock; a restock sweep periodically resets limited entries to
//! their configured baseline. Player listings escrow the listed items until
//! the listing is bought or cancelled.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::game::types::SHOP_SCHEMA_VERSION;

/// One purchasable entry in the global shop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShopEntry {
    pub item_id: u64,
    /// Price per unit, in coins.
    pub price: u64,
    /// Remaining stock. `None` means unlimited.
    pub stock: Option<u32>,
    /// Baseline the restock sweep resets limited stock to.
    #[serde(default)]
    pub restock_to: Option<u32>,
    #[serde(default)]
    pub last_restock: Option<DateTime<Utc>>,
    pub schema_version: u8,
}

impl ShopEntry {
    /// Entry with unlimited stock.
    pub fn unlimited(item_id: u64, price: u64) -> Self {
        Self {
            item_id,
            price,
            stock: None,
            restock_to: None,
            last_restock: None,
            schema_version: SHOP_SCHEMA_VERSION,
        }
    }

    /// Entry with limited stock that restocks back to the initial amount.
    pub fn limited(item_id: u64, price: u64, stock: u32, now: DateTime<Utc>) -> Self {
        Self {
            item_id,
            price,
            stock: Some(stock),
            restock_to: Some(stock),
            last_restock: Some(now),
            schema_version: SHOP_SCHEMA_VERSION,
        }
    }

    pub fn in_stock(&self) -> bool {
        self.stock.is_none_or(|q| q > 0)
    }

    /// Consume one unit. Unlimited stock never depletes. Returns false when
    /// the entry was already empty.
    pub fn take_one(&mut self) -> bool {
        match self.stock {
            None => true,
            Some(0) => false,
            Some(qty) => {
                self.stock = Some(qty - 1);
                true
            }
        }
    }

    /// Whether the restock sweep should reset this entry: limited stock,
    /// below its baseline, and at least `interval_minutes` since the last
    /// restock (an entry with no restock timestamp is due immediately).
    pub fn restock_due(&self, now: DateTime<Utc>, interval_minutes: i64) -> bool {
        let (Some(stock), Some(baseline)) = (self.stock, self.restock_to) else {
            return false;
        };
        if stock >= baseline {
            return false;
        }
        match self.last_restock {
            None => true,
            Some(last) => now.signed_duration_since(last) >= Duration::minutes(interval_minutes),
        }
    }

    /// Reset stock to the baseline and stamp the restock time. Returns true
    /// when anything changed.
    pub fn restock(&mut self, now: DateTime<Utc>, interval_minutes: i64) -> bool {
        if !self.restock_due(now, interval_minutes) {
            return false;
        }
        self.stock = self.restock_to;
        self.last_restock = Some(now);
        true
    }
}
