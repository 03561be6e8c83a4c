//! Default item catalog and drop selection.
//!
//! The catalog ships a starter set of item definitions and global-shop
//! stock, seeded once into an empty store. Passive message drops draw from
//! the catalog weighted by each item's `drop_rate`; dungeon loot draws
//! uniformly and does not consult this module.

use crate::game::types::{ItemRecord, NewItem, Rarity};

/// Catalog name of the consumable that restores one stamina point.
pub const STAMINA_POTION: &str = "Stamina Potion";

/// Items granted once when a player registers.
pub const STARTER_ITEMS: &[&str] = &["Wooden Sword", "Minor Health Potion"];

/// Baseline stock for a seeded global shop entry.
#[derive(Debug, Clone, Copy)]
pub struct ShopSeed {
    pub item_name: &'static str,
    pub price: u64,
    pub stock: u32,
}

/// The default item definitions seeded into a fresh store.
pub fn default_items() -> Vec<NewItem> {
    let item = |name: &str,
                description: &str,
                value: u64,
                image: &str,
                rarity: Rarity,
                drop_rate: f64,
                min_level: u32| NewItem {
        name: name.to_string(),
        description: description.to_string(),
        value,
        image_url: image.to_string(),
        rarity,
        drop_rate,
        min_level,
    };

    vec![
        item("Wooden Sword", "Basic training weapon", 10, "https://i.imgur.com/3sT7VQj.png", Rarity::Common, 0.3, 1),
        item("Leather Armor", "Simple protective gear", 15, "https://i.imgur.com/4bLQ9Yf.png", Rarity::Common, 0.3, 1),
        item("Minor Health Potion", "Restores 20 HP", 15, "https://i.imgur.com/2vBq8Qk.png", Rarity::Common, 0.4, 1),
        item("Iron Sword", "Reliable combat weapon", 50, "https://i.imgur.com/3sT7VQj.png", Rarity::Uncommon, 0.15, 5),
        item("Chainmail Armor", "Solid metal protection", 75, "https://i.imgur.com/4bLQ9Yf.png", Rarity::Uncommon, 0.15, 5),
        item("Health Potion", "Restores 50 HP", 30, "https://i.imgur.com/2vBq8Qk.png", Rarity::Uncommon, 0.2, 5),
        item("Steel Longsword", "Well-balanced weapon", 120, "https://i.imgur.com/3sT7VQj.png", Rarity::Rare, 0.08, 10),
        item("Scale Armor", "Flexible protection", 150, "https://i.imgur.com/4bLQ9Yf.png", Rarity::Rare, 0.08, 10),
        item("Mithril Sword", "Light yet strong", 300, "https://i.imgur.com/3sT7VQj.png", Rarity::Epic, 0.03, 15),
        item("Dragonbone Sword", "Legendary weapon", 500, "https://i.imgur.com/3sT7VQj.png", Rarity::Legendary, 0.01, 20),
        item(STAMINA_POTION, "Restores 1 stamina", 50, "https://i.imgur.com/2vBq8Qk.png", Rarity::Rare, 0.1, 5),
        item("Dungeon Key", "Unlocks special dungeons", 100, "https://i.imgur.com/9zGQk2c.png", Rarity::Epic, 0.05, 10),
    ]
}

/// The default global shop stock, referencing catalog items by name.
pub fn default_shop() -> Vec<ShopSeed> {
    vec![
        ShopSeed { item_name: STAMINA_POTION, price: 50, stock: 100 },
        ShopSeed { item_name: "Health Potion", price: 30, stock: 200 },
        ShopSeed { item_name: "Dungeon Key", price: 150, stock: 50 },
    ]
}

/// Pick an item by drop-rate weight.
///
/// `roll` is a uniform sample in [0, 1); the caller supplies it so the draw
/// stays deterministic under test. Items with non-positive weight never win.
/// Returns `None` when the slice is empty or carries no positive weight.
pub fn pick_weighted(items: &[ItemRecord], roll: f64) -> Option<&ItemRecord> {
    let total: f64 = items.iter().map(|i| i.drop_rate.max(0.0)).sum();
    if total <= 0.0 {
        return None;
    }
    let mut remaining = roll.clamp(0.0, 1.0) * total;
    let mut last_weighted = None;
    for item in items {
        let weight = item.drop_rate.max(0.0);
        if weight <= 0.0 {
            continue;
        }
        last_weighted = Some(item);
        if remaining < weight {
            return Some(item);
        }
        remaining -= weight;
    }
    // roll == 1.0 lands past the final bucket after float accumulation.
    last_weighted
}
