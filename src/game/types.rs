use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const PLAYER_SCHEMA_VERSION: u8 = 1;
pub const ITEM_SCHEMA_VERSION: u8 = 1;
pub const DUNGEON_SCHEMA_VERSION: u8 = 1;
pub const LISTING_SCHEMA_VERSION: u8 = 1;
pub const SHOP_SCHEMA_VERSION: u8 = 1;

/// Item rarity bands, ordered from most to least common.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl std::fmt::Display for Rarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Rarity::Common => "common",
            Rarity::Uncommon => "uncommon",
            Rarity::Rare => "rare",
            Rarity::Epic => "epic",
            Rarity::Legendary => "legendary",
        };
        write!(f, "{}", label)
    }
}

/// Progression tier label derived from level.
///
/// Breakpoints are upper-exclusive and checked in ascending order; the first
/// match wins.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Beginner,
    Apprentice,
    Journeyman,
    Adept,
    Expert,
    Master,
    Grandmaster,
}

impl Tier {
    pub fn for_level(level: u32) -> Self {
        if level < 5 {
            Tier::Beginner
        } else if level < 10 {
            Tier::Apprentice
        } else if level < 20 {
            Tier::Journeyman
        } else if level < 30 {
            Tier::Adept
        } else if level < 40 {
            Tier::Expert
        } else if level < 50 {
            Tier::Master
        } else {
            Tier::Grandmaster
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Tier::Beginner => "beginner",
            Tier::Apprentice => "apprentice",
            Tier::Journeyman => "journeyman",
            Tier::Adept => "adept",
            Tier::Expert => "expert",
            Tier::Master => "master",
            Tier::Grandmaster => "grandmaster",
        };
        write!(f, "{}", label)
    }
}

/// Lifecycle state of a dungeon run. `Success` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DungeonStatus {
    Active,
    Success,
    Failed,
}

/// Denormalized pointer on the player record so surrounding UI can show
/// "expedition in progress" without scanning the run table. The run record
/// stays the source of truth during resolution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActiveDungeon {
    pub run_id: u64,
    pub ends_at: DateTime<Utc>,
    pub stamina_committed: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerRecord {
    pub id: u64,
    pub display_name: String,
    pub xp: u64,
    /// Stored copy of the derived level. May lag until the next XP grant;
    /// gating logic recomputes from xp instead of trusting this field.
    pub level: u32,
    pub tier: Tier,
    pub coins: u64,
    pub stamina: u32,
    pub max_stamina: u32,
    /// Timestamp of the last regeneration credit. `None` until stamina is
    /// first spent; the regeneration sweep skips uninitialized players.
    #[serde(default)]
    pub last_stamina_time: Option<DateTime<Utc>>,
    pub wins: u32,
    pub losses: u32,
    #[serde(default)]
    pub active_dungeon: Option<ActiveDungeon>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub schema_version: u8,
}

impl PlayerRecord {
    pub fn new(id: u64, display_name: &str, max_stamina: u32, now: DateTime<Utc>) -> Self {
        Self {
            id,
            display_name: sanitize_display_name(display_name),
            xp: 0,
            level: 1,
            tier: Tier::Beginner,
            coins: 0,
            stamina: max_stamina,
            max_stamina,
            last_stamina_time: None,
            wins: 0,
            losses: 0,
            active_dungeon: None,
            created_at: now,
            updated_at: now,
            schema_version: PLAYER_SCHEMA_VERSION,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

/// An item definition in the global catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemRecord {
    pub id: u64,
    pub name: String,
    pub description: String,
    /// Base coin value.
    pub value: u64,
    pub image_url: String,
    pub rarity: Rarity,
    /// Probability weight in (0, 1] for the passive message drop. Dungeon
    /// loot draws uniformly and ignores this.
    pub drop_rate: f64,
    /// Minimum player level for passive drops of this item.
    pub min_level: u32,
    pub created_at: DateTime<Utc>,
    pub schema_version: u8,
}

/// Fields for creating a new item definition (admin surface).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewItem {
    pub name: String,
    pub description: String,
    pub value: u64,
    pub image_url: String,
    pub rarity: Rarity,
    pub drop_rate: f64,
    pub min_level: u32,
}

impl NewItem {
    pub fn into_record(self, id: u64, now: DateTime<Utc>) -> ItemRecord {
        ItemRecord {
            id,
            name: self.name,
            description: self.description,
            value: self.value,
            image_url: self.image_url,
            rarity: self.rarity,
            drop_rate: self.drop_rate,
            min_level: self.min_level,
            created_at: now,
            schema_version: ITEM_SCHEMA_VERSION,
        }
    }
}

/// Rewards granted by a resolved dungeon run. Frozen on the run record once
/// resolution commits.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reward {
    pub xp: u64,
    pub coins: u64,
    /// Item definition ids granted (duplicates allowed, one entry per drop).
    pub items: Vec<u64>,
}

/// A timed dungeon expedition owned by one player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DungeonRecord {
    pub id: u64,
    pub player_id: u64,
    /// Difficulty tier, 1..=5. Duration is `tier` hours.
    pub tier: u8,
    pub started_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub stamina_committed: u32,
    pub status: DungeonStatus,
    /// Recorded once resolved; immutable after.
    #[serde(default)]
    pub reward: Option<Reward>,
    pub schema_version: u8,
}

/// A player marketplace listing. The listed items are escrowed out of the
/// seller's inventory while the listing exists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingRecord {
    pub id: u64,
    pub seller_id: u64,
    pub item_id: u64,
    pub quantity: u32,
    /// Total price for the whole lot.
    pub price: u64,
    pub created_at: DateTime<Utc>,
    pub schema_version: u8,
}

/// Outcome of one dungeon resolution, returned to the adapter so it can
/// notify the player. Notification is best-effort and never rolls back the
/// committed rewards.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRun {
    pub player_id: u64,
    pub run: DungeonRecord,
    pub stamina_refunded: u32,
}

/// XP credited by a grant, with any level-up coin bonus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XpGain {
    pub amount: u64,
    pub new_level: u32,
    pub coins_awarded: u64,
}

/// What a chat message earned the player, if anything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageReward {
    pub xp: Option<XpGain>,
    pub item: Option<ItemRecord>,
}

/// Collapse a chat-sourced display name to a single trimmed line.
///
/// Chat platforms allow control characters and absurd lengths in nicknames;
/// stored names must stay log- and UI-safe.
pub fn sanitize_display_name(name: &str) -> String {
    const MAX_LEN: usize = 64;
    let cleaned: String = name
        .chars()
        .map(|ch| if ch.is_control() { ' ' } else { ch })
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        return "adventurer".to_string();
    }
    trimmed.chars().take(MAX_LEN).collect()
}
