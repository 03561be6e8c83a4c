//! Sled-backed persistence for player, item, dungeon, and economy state.
//!
//! `GameStore` is the single serialization point of the engine: every
//! mutation is one unit of work that holds the store's exclusive lock for
//! the duration of its read-modify-write, then flushes. Periodic sweeps
//! (stamina regeneration, dungeon resolution, shop restock) funnel through
//! the same lock, one entity per unit of work, so one corrupt record never
//! aborts a whole sweep and interactive operations never wait on more than
//! one short critical section.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use rand::Rng;
use sled::IVec;

use crate::config::GameConfig;
use crate::game::catalog;
use crate::game::dungeon::{self, MAX_TIER, MIN_TIER};
use crate::game::errors::GameError;
use crate::game::inventory;
use crate::game::leveling;
use crate::game::shop::ShopEntry;
use crate::game::stamina;
use crate::game::types::{
    ActiveDungeon, DungeonRecord, DungeonStatus, ItemRecord, ListingRecord, MessageReward,
    NewItem, PlayerRecord, ResolvedRun, Reward, Tier, XpGain, DUNGEON_SCHEMA_VERSION,
    ITEM_SCHEMA_VERSION, LISTING_SCHEMA_VERSION, PLAYER_SCHEMA_VERSION, SHOP_SCHEMA_VERSION,
};

const TREE_PLAYERS: &str = "players";
const TREE_ITEMS: &str = "items";
const TREE_INVENTORY: &str = "inventory";
const TREE_DUNGEONS: &str = "dungeons";
const TREE_MARKET: &str = "market";
const TREE_SHOP: &str = "shop";

/// Aggregate counts for status displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub players: usize,
    pub items: usize,
    pub active_dungeons: usize,
    pub listings: usize,
}

/// Helper builder so tests can easily create throwaway stores with custom
/// configs and paths.
pub struct GameStoreBuilder {
    path: PathBuf,
    config: GameConfig,
    seed_catalog: bool,
}

impl GameStoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            config: GameConfig::default(),
            seed_catalog: true,
        }
    }

    pub fn with_config(mut self, config: GameConfig) -> Self {
        self.config = config;
        self
    }

    /// Opt out of seeding the default item catalog during initialization
    /// (useful for targeted tests).
    pub fn without_catalog_seed(mut self) -> Self {
        self.seed_catalog = false;
        self
    }

    pub fn open(self) -> Result<GameStore, GameError> {
        GameStore::open_with_options(self.path, self.config, self.seed_catalog)
    }
}

/// Sled-backed store for all game state. See the module docs for the
/// locking discipline.
pub struct GameStore {
    db: sled::Db,
    players: sled::Tree,
    items: sled::Tree,
    inventory: sled::Tree,
    dungeons: sled::Tree,
    market: sled::Tree,
    shop: sled::Tree,
    config: GameConfig,
    write_lock: Mutex<()>,
}

impl GameStore {
    /// Open (or create) the store rooted at `path` with default config and
    /// catalog seeding.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, GameError> {
        GameStoreBuilder::new(path).open()
    }

    fn open_with_options(
        path: PathBuf,
        config: GameConfig,
        seed_catalog: bool,
    ) -> Result<Self, GameError> {
        std::fs::create_dir_all(&path)?;
        let db = sled::open(&path)?;
        let players = db.open_tree(TREE_PLAYERS)?;
        let items = db.open_tree(TREE_ITEMS)?;
        let inventory = db.open_tree(TREE_INVENTORY)?;
        let dungeons = db.open_tree(TREE_DUNGEONS)?;
        let market = db.open_tree(TREE_MARKET)?;
        let shop = db.open_tree(TREE_SHOP)?;
        let store = Self {
            db,
            players,
            items,
            inventory,
            dungeons,
            market,
            shop,
            config,
            write_lock: Mutex::new(()),
        };

        if seed_catalog {
            store.seed_catalog_if_needed(Utc::now())?;
        }

        Ok(store)
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Serialization plumbing
    // ------------------------------------------------------------------

    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, GameError> {
        Ok(bincode::serialize(value)?)
    }

    fn deserialize<T: serde::de::DeserializeOwned>(bytes: IVec) -> Result<T, GameError> {
        Ok(bincode::deserialize::<T>(&bytes)?)
    }

    fn id_key(id: u64) -> [u8; 8] {
        id.to_be_bytes()
    }

    fn key_to_id(key: &[u8]) -> Option<u64> {
        Some(u64::from_be_bytes(key.try_into().ok()?))
    }

    /// Acquire the exclusive lock for one unit of work. A poisoned lock only
    /// means a previous holder panicked; every write flushes, so the store
    /// itself is still consistent and the guard is safe to reuse.
    fn unit_of_work(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn flush(&self) -> Result<(), GameError> {
        self.db.flush()?;
        Ok(())
    }

    fn check_schema(
        entity: &'static str,
        expected: u8,
        found: u8,
    ) -> Result<(), GameError> {
        if expected != found {
            return Err(GameError::SchemaMismatch {
                entity,
                expected,
                found,
            });
        }
        Ok(())
    }

    fn read_player(&self, id: u64) -> Result<Option<PlayerRecord>, GameError> {
        let Some(bytes) = self.players.get(Self::id_key(id))? else {
            return Ok(None);
        };
        let record: PlayerRecord = Self::deserialize(bytes)?;
        Self::check_schema("player", PLAYER_SCHEMA_VERSION, record.schema_version)?;
        Ok(Some(record))
    }

    fn require_player(&self, id: u64) -> Result<PlayerRecord, GameError> {
        self.read_player(id)?
            .ok_or_else(|| GameError::NotFound(format!("player: {}", id)))
    }

    fn put_player_raw(&self, player: &PlayerRecord) -> Result<(), GameError> {
        let bytes = Self::serialize(player)?;
        self.players.insert(Self::id_key(player.id), bytes)?;
        Ok(())
    }

    fn read_item(&self, id: u64) -> Result<Option<ItemRecord>, GameError> {
        let Some(bytes) = self.items.get(Self::id_key(id))? else {
            return Ok(None);
        };
        let record: ItemRecord = Self::deserialize(bytes)?;
        Self::check_schema("item", ITEM_SCHEMA_VERSION, record.schema_version)?;
        Ok(Some(record))
    }

    fn require_item(&self, id: u64) -> Result<ItemRecord, GameError> {
        self.read_item(id)?
            .ok_or_else(|| GameError::NotFound(format!("item: {}", id)))
    }

    fn put_item_raw(&self, item: &ItemRecord) -> Result<(), GameError> {
        let bytes = Self::serialize(item)?;
        self.items.insert(Self::id_key(item.id), bytes)?;
        Ok(())
    }

    fn read_run(&self, id: u64) -> Result<Option<DungeonRecord>, GameError> {
        let Some(bytes) = self.dungeons.get(Self::id_key(id))? else {
            return Ok(None);
        };
        let record: DungeonRecord = Self::deserialize(bytes)?;
        Self::check_schema("dungeon", DUNGEON_SCHEMA_VERSION, record.schema_version)?;
        Ok(Some(record))
    }

    fn put_run_raw(&self, run: &DungeonRecord) -> Result<(), GameError> {
        let bytes = Self::serialize(run)?;
        self.dungeons.insert(Self::id_key(run.id), bytes)?;
        Ok(())
    }

    fn read_listing(&self, id: u64) -> Result<Option<ListingRecord>, GameError> {
        let Some(bytes) = self.market.get(Self::id_key(id))? else {
            return Ok(None);
        };
        let record: ListingRecord = Self::deserialize(bytes)?;
        Self::check_schema("listing", LISTING_SCHEMA_VERSION, record.schema_version)?;
        Ok(Some(record))
    }

    fn read_shop_entry(&self, item_id: u64) -> Result<Option<ShopEntry>, GameError> {
        let Some(bytes) = self.shop.get(Self::id_key(item_id))? else {
            return Ok(None);
        };
        let record: ShopEntry = Self::deserialize(bytes)?;
        Self::check_schema("shop entry", SHOP_SCHEMA_VERSION, record.schema_version)?;
        Ok(Some(record))
    }

    fn put_shop_entry_raw(&self, entry: &ShopEntry) -> Result<(), GameError> {
        let bytes = Self::serialize(entry)?;
        self.shop.insert(Self::id_key(entry.item_id), bytes)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Players
    // ------------------------------------------------------------------

    /// Idempotent player creation. A pre-existing record is left untouched;
    /// in particular the stored display name is not refreshed.
    pub fn ensure_player(
        &self,
        id: u64,
        display_name: &str,
        now: DateTime<Utc>,
    ) -> Result<(), GameError> {
        let _guard = self.unit_of_work();
        if self.read_player(id)?.is_some() {
            return Ok(());
        }
        let player = PlayerRecord::new(id, display_name, self.config.max_stamina, now);
        info!("created player {} ({})", id, player.display_name);
        self.put_player_raw(&player)?;
        self.flush()
    }

    /// Ensure the player exists and hand out the starter kit exactly once.
    /// Returns true when the player was newly created.
    pub fn register_player(
        &self,
        id: u64,
        display_name: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, GameError> {
        let _guard = self.unit_of_work();
        if self.read_player(id)?.is_some() {
            return Ok(false);
        }
        let player = PlayerRecord::new(id, display_name, self.config.max_stamina, now);
        self.put_player_raw(&player)?;
        for name in catalog::STARTER_ITEMS {
            match self.find_item_by_name(name)? {
                Some(item) => {
                    self.add_item_raw(id, item.id, 1)?;
                }
                None => warn!("starter item {:?} missing from the catalog", name),
            }
        }
        info!("registered player {} ({})", id, player.display_name);
        self.flush()?;
        Ok(true)
    }

    /// Fetch the full player record, or `None` for an unknown id.
    pub fn get_player(&self, id: u64) -> Result<Option<PlayerRecord>, GameError> {
        self.read_player(id)
    }

    /// Add XP and apply level-up side effects. Returns the (possibly
    /// unchanged) level and the coins awarded for levels gained.
    pub fn grant_xp(
        &self,
        id: u64,
        amount: u64,
        now: DateTime<Utc>,
    ) -> Result<(u32, u64), GameError> {
        let _guard = self.unit_of_work();
        let mut player = self.require_player(id)?;
        let gain = self.apply_xp(&mut player, amount);
        player.touch(now);
        self.put_player_raw(&player)?;
        self.flush()?;
        Ok((gain.new_level, gain.coins_awarded))
    }

    /// Credit coins. Returns the new balance.
    pub fn grant_coins(&self, id: u64, amount: u64) -> Result<u64, GameError> {
        let _guard = self.unit_of_work();
        let mut player = self.require_player(id)?;
        player.coins = player.coins.saturating_add(amount);
        self.put_player_raw(&player)?;
        self.flush()?;
        Ok(player.coins)
    }

    /// Apply an XP grant to a loaded record: bump xp, recompute the level
    /// from xp (the stored level is never trusted), and credit level-up
    /// coins. The caller persists the record.
    fn apply_xp(&self, player: &mut PlayerRecord, amount: u64) -> XpGain {
        player.xp = player.xp.saturating_add(amount);
        let new_level = leveling::level_for(
            player.xp,
            self.config.base_xp,
            self.config.xp_multiplier,
        );
        let mut coins_awarded = 0u64;
        if new_level > player.level {
            let levels_gained = (new_level - player.level) as u64;
            coins_awarded = levels_gained * self.config.level_coin_reward;
            player.coins = player.coins.saturating_add(coins_awarded);
            debug!(
                "player {} reached level {} (+{} coins)",
                player.id, new_level, coins_awarded
            );
        }
        player.level = new_level;
        player.tier = Tier::for_level(new_level);
        XpGain {
            amount,
            new_level,
            coins_awarded,
        }
    }

    // ------------------------------------------------------------------
    // Stamina
    // ------------------------------------------------------------------

    /// Credit regeneration ticks across all players. Returns how many
    /// players received stamina. Each credit is its own unit of work;
    /// players that fail to load are logged and skipped.
    pub fn run_stamina_sweep(&self, now: DateTime<Utc>) -> Result<usize, GameError> {
        let mut credited = 0usize;
        for entry in self.players.iter() {
            let (key, _) = entry?;
            let Some(id) = Self::key_to_id(&key) else {
                warn!("stamina sweep: malformed player key, skipping");
                continue;
            };
            match self.credit_stamina(id, now) {
                Ok(true) => credited += 1,
                Ok(false) => {}
                Err(err) => warn!("stamina sweep: skipping player {}: {}", id, err),
            }
        }
        Ok(credited)
    }

    fn credit_stamina(&self, id: u64, now: DateTime<Utc>) -> Result<bool, GameError> {
        let _guard = self.unit_of_work();
        let Some(mut player) = self.read_player(id)? else {
            return Ok(false);
        };
        // Players whose regeneration clock was never started are skipped.
        let Some(last) = player.last_stamina_time else {
            return Ok(false);
        };
        let Some((added, new_last)) = stamina::regen_ticks(
            player.stamina,
            player.max_stamina,
            last,
            now,
            self.config.stamina_regen_minutes,
        ) else {
            return Ok(false);
        };
        player.stamina += added;
        player.last_stamina_time = Some(new_last);
        player.touch(now);
        self.put_player_raw(&player)?;
        self.flush()?;
        debug!("player {} regenerated {} stamina", id, added);
        Ok(true)
    }

    /// Consume one stamina potion from the inventory and restore one point.
    pub fn use_stamina_potion(&self, id: u64) -> Result<u32, GameError> {
        let _guard = self.unit_of_work();
        let mut player = self.require_player(id)?;
        if player.stamina >= player.max_stamina {
            return Err(GameError::StaminaFull);
        }
        let potion = self
            .find_item_by_name(catalog::STAMINA_POTION)?
            .ok_or_else(|| GameError::NotFound(format!("item: {}", catalog::STAMINA_POTION)))?;
        if self.item_quantity_raw(id, potion.id)? < 1 {
            return Err(GameError::InsufficientItems);
        }
        self.remove_item_raw(id, potion.id, 1)?;
        player.stamina = (player.stamina + 1).min(player.max_stamina);
        self.put_player_raw(&player)?;
        self.flush()?;
        Ok(player.stamina)
    }

    // ------------------------------------------------------------------
    // Dungeons
    // ------------------------------------------------------------------

    /// Launch an expedition at a uniformly random tier.
    pub fn commit_dungeon(
        &self,
        id: u64,
        stamina_amount: u32,
        now: DateTime<Utc>,
    ) -> Result<DungeonRecord, GameError> {
        let tier = rand::thread_rng().gen_range(MIN_TIER..=MAX_TIER);
        self.commit_dungeon_at_tier(id, stamina_amount, tier, now)
    }

    /// Launch an expedition at an explicit tier (admin tooling and tests).
    pub fn commit_dungeon_at_tier(
        &self,
        id: u64,
        stamina_amount: u32,
        tier: u8,
        now: DateTime<Utc>,
    ) -> Result<DungeonRecord, GameError> {
        if !(MIN_TIER..=MAX_TIER).contains(&tier) {
            return Err(GameError::InvalidTier(tier));
        }
        if stamina_amount == 0 {
            return Err(GameError::EmptyCommit);
        }
        let _guard = self.unit_of_work();
        let mut player = self.require_player(id)?;
        if let Some(active) = player.active_dungeon {
            match self.read_run(active.run_id)? {
                Some(run) if run.status == DungeonStatus::Active => {
                    return Err(GameError::DungeonActive);
                }
                _ => {
                    // Stale pointer left by an interrupted resolution; the
                    // run table is the source of truth.
                    player.active_dungeon = None;
                }
            }
        }
        if stamina_amount > player.stamina {
            return Err(GameError::InsufficientStamina {
                have: player.stamina,
                need: stamina_amount,
            });
        }
        player.stamina -= stamina_amount;
        // Spending stamina starts the regeneration clock.
        if player.last_stamina_time.is_none() {
            player.last_stamina_time = Some(now);
        }
        let run_id = self.db.generate_id()?;
        let run = DungeonRecord {
            id: run_id,
            player_id: id,
            tier,
            started_at: now,
            ends_at: now + Duration::hours(tier as i64),
            stamina_committed: stamina_amount,
            status: DungeonStatus::Active,
            reward: None,
            schema_version: DUNGEON_SCHEMA_VERSION,
        };
        player.active_dungeon = Some(ActiveDungeon {
            run_id,
            ends_at: run.ends_at,
            stamina_committed: stamina_amount,
        });
        player.touch(now);
        self.put_run_raw(&run)?;
        self.put_player_raw(&player)?;
        self.flush()?;
        info!(
            "player {} launched a tier {} expedition ({} stamina, due {})",
            id, tier, stamina_amount, run.ends_at
        );
        Ok(run)
    }

    /// Resolve every active run whose end time has passed. Each run is its
    /// own unit of work; a failing run is logged and retried on the next
    /// sweep. The returned summaries are for best-effort notification only.
    pub fn run_dungeon_sweep(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ResolvedRun>, GameError> {
        let mut due = Vec::new();
        for entry in self.dungeons.iter() {
            let (_, value) = entry?;
            let run: DungeonRecord = match Self::deserialize(value) {
                Ok(run) => run,
                Err(err) => {
                    warn!("dungeon sweep: skipping undecodable run: {}", err);
                    continue;
                }
            };
            if run.status == DungeonStatus::Active && run.ends_at <= now {
                due.push(run.id);
            }
        }

        let mut resolved = Vec::new();
        for run_id in due {
            match self.resolve_run(run_id, now) {
                Ok(Some(outcome)) => resolved.push(outcome),
                Ok(None) => {}
                Err(err) => {
                    warn!("dungeon sweep: run {} left for next sweep: {}", run_id, err)
                }
            }
        }
        Ok(resolved)
    }

    fn resolve_run(
        &self,
        run_id: u64,
        now: DateTime<Utc>,
    ) -> Result<Option<ResolvedRun>, GameError> {
        let _guard = self.unit_of_work();
        let Some(mut run) = self.read_run(run_id)? else {
            return Ok(None);
        };
        // Claim step: only a still-active run past its end time resolves.
        // Anything else was already handled (or is not yet due) and must
        // not be granted twice.
        if run.status != DungeonStatus::Active || run.ends_at > now {
            return Ok(None);
        }
        let mut player = self.require_player(run.player_id)?;

        let outcome = dungeon::outcome(run.tier, run.stamina_committed);
        let mut reward = Reward {
            xp: outcome.xp,
            coins: outcome.coins,
            items: Vec::new(),
        };
        for _ in 0..outcome.item_draws {
            match self.random_item_id()? {
                Some(item_id) => {
                    self.add_item_raw(player.id, item_id, 1)?;
                    reward.items.push(item_id);
                }
                None => warn!("dungeon loot draw skipped: item catalog is empty"),
            }
        }

        self.apply_xp(&mut player, reward.xp);
        player.coins = player.coins.saturating_add(reward.coins);
        let mut refunded = 0u32;
        if outcome.status == DungeonStatus::Success {
            player.wins += 1;
        } else {
            player.losses += 1;
            refunded = outcome
                .stamina_refund
                .min(player.max_stamina.saturating_sub(player.stamina));
            player.stamina += refunded;
        }
        player.touch(now);

        // Grants land first, then the run freezes, then the pointer clears:
        // a crash before the run write re-runs this resolution on the next
        // sweep, and the claim above keeps a frozen run from paying twice.
        self.put_player_raw(&player)?;
        run.status = outcome.status;
        run.reward = Some(reward);
        self.put_run_raw(&run)?;
        player.active_dungeon = None;
        self.put_player_raw(&player)?;
        self.flush()?;

        info!(
            "resolved run {} for player {}: tier {} with {} stamina -> {:?}",
            run.id, run.player_id, run.tier, run.stamina_committed, run.status
        );
        Ok(Some(ResolvedRun {
            player_id: run.player_id,
            run,
            stamina_refunded: refunded,
        }))
    }

    fn random_item_id(&self) -> Result<Option<u64>, GameError> {
        let mut ids = Vec::new();
        for entry in self.items.iter() {
            let (key, _) = entry?;
            if let Some(id) = Self::key_to_id(&key) {
                ids.push(id);
            }
        }
        if ids.is_empty() {
            return Ok(None);
        }
        let index = rand::thread_rng().gen_range(0..ids.len());
        Ok(Some(ids[index]))
    }

    // ------------------------------------------------------------------
    // Items & inventory
    // ------------------------------------------------------------------

    /// Create a new item definition. Names are unique across the catalog.
    pub fn create_item(&self, item: NewItem, now: DateTime<Utc>) -> Result<u64, GameError> {
        let _guard = self.unit_of_work();
        if self.find_item_by_name(&item.name)?.is_some() {
            return Err(GameError::DuplicateItem(item.name));
        }
        let id = self.db.generate_id()?;
        let record = item.into_record(id, now);
        self.put_item_raw(&record)?;
        self.flush()?;
        info!("created item {} ({:?}, {})", record.name, record.rarity, id);
        Ok(id)
    }

    pub fn get_item(&self, item_id: u64) -> Result<Option<ItemRecord>, GameError> {
        self.read_item(item_id)
    }

    /// All item definitions in id order.
    pub fn list_items(&self) -> Result<Vec<ItemRecord>, GameError> {
        let mut items = Vec::new();
        for entry in self.items.iter() {
            let (_, value) = entry?;
            items.push(Self::deserialize(value)?);
        }
        Ok(items)
    }

    pub fn find_item_by_name(&self, name: &str) -> Result<Option<ItemRecord>, GameError> {
        for entry in self.items.iter() {
            let (_, value) = entry?;
            let item: ItemRecord = Self::deserialize(value)?;
            if item.name == name {
                return Ok(Some(item));
            }
        }
        Ok(None)
    }

    /// Add `qty` of an item to a player's inventory, creating or stacking
    /// the entry as needed.
    pub fn add_item(&self, player_id: u64, item_id: u64, qty: u32) -> Result<u32, GameError> {
        let _guard = self.unit_of_work();
        self.require_player(player_id)?;
        self.require_item(item_id)?;
        let total = self.add_item_raw(player_id, item_id, qty)?;
        self.flush()?;
        Ok(total)
    }

    /// Remove up to `qty` of an item, clamping at zero. Returns the
    /// quantity actually removed; the entry is deleted when it hits zero.
    pub fn remove_item(
        &self,
        player_id: u64,
        item_id: u64,
        qty: u32,
    ) -> Result<u32, GameError> {
        let _guard = self.unit_of_work();
        self.require_player(player_id)?;
        let removed = self.remove_item_raw(player_id, item_id, qty)?;
        self.flush()?;
        Ok(removed)
    }

    pub fn item_quantity(&self, player_id: u64, item_id: u64) -> Result<u32, GameError> {
        self.item_quantity_raw(player_id, item_id)
    }

    /// Item definitions joined with owned quantities, in item-id order.
    pub fn list_inventory(
        &self,
        player_id: u64,
    ) -> Result<Vec<(ItemRecord, u32)>, GameError> {
        let mut entries = Vec::new();
        for entry in self.inventory.scan_prefix(inventory::player_prefix(player_id)) {
            let (key, value) = entry?;
            let Some((_, item_id)) = inventory::split_entry_key(&key) else {
                warn!("inventory: malformed entry key for player {}", player_id);
                continue;
            };
            let qty: u32 = Self::deserialize(value)?;
            match self.read_item(item_id)? {
                Some(item) => entries.push((item, qty)),
                None => warn!(
                    "inventory: player {} owns unknown item {}",
                    player_id, item_id
                ),
            }
        }
        Ok(entries)
    }

    fn item_quantity_raw(&self, player_id: u64, item_id: u64) -> Result<u32, GameError> {
        let key = inventory::entry_key(player_id, item_id);
        match self.inventory.get(key)? {
            Some(bytes) => Self::deserialize(bytes),
            None => Ok(0),
        }
    }

    fn add_item_raw(&self, player_id: u64, item_id: u64, qty: u32) -> Result<u32, GameError> {
        let key = inventory::entry_key(player_id, item_id);
        let current = self.item_quantity_raw(player_id, item_id)?;
        let total = current.saturating_add(qty);
        self.inventory.insert(key, Self::serialize(&total)?)?;
        Ok(total)
    }

    fn remove_item_raw(
        &self,
        player_id: u64,
        item_id: u64,
        qty: u32,
    ) -> Result<u32, GameError> {
        let key = inventory::entry_key(player_id, item_id);
        let current = self.item_quantity_raw(player_id, item_id)?;
        let removed = qty.min(current);
        let remaining = current - removed;
        if remaining == 0 {
            self.inventory.remove(key)?;
        } else {
            self.inventory.insert(key, Self::serialize(&remaining)?)?;
        }
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Global shop
    // ------------------------------------------------------------------

    /// Shop entries joined with their item definitions, in item-id order.
    pub fn list_global_shop(&self) -> Result<Vec<(ItemRecord, ShopEntry)>, GameError> {
        let mut entries = Vec::new();
        for entry in self.shop.iter() {
            let (_, value) = entry?;
            let shop_entry: ShopEntry = Self::deserialize(value)?;
            match self.read_item(shop_entry.item_id)? {
                Some(item) => entries.push((item, shop_entry)),
                None => warn!("shop references unknown item {}", shop_entry.item_id),
            }
        }
        Ok(entries)
    }

    /// Buy one unit from the global shop.
    pub fn buy_global(
        &self,
        player_id: u64,
        item_id: u64,
        now: DateTime<Utc>,
    ) -> Result<(), GameError> {
        let _guard = self.unit_of_work();
        let mut player = self.require_player(player_id)?;
        let mut entry = self
            .read_shop_entry(item_id)?
            .ok_or_else(|| GameError::NotFound(format!("shop entry: {}", item_id)))?;
        if !entry.in_stock() {
            return Err(GameError::OutOfStock);
        }
        if player.coins < entry.price {
            return Err(GameError::InsufficientFunds {
                have: player.coins,
                need: entry.price,
            });
        }
        player.coins -= entry.price;
        entry.take_one();
        self.add_item_raw(player_id, item_id, 1)?;
        player.touch(now);
        self.put_player_raw(&player)?;
        self.put_shop_entry_raw(&entry)?;
        self.flush()?;
        debug!("player {} bought item {} for {}", player_id, item_id, entry.price);
        Ok(())
    }

    /// Reset depleted limited-stock entries to their baselines once their
    /// restock interval has elapsed. Returns the number restocked.
    pub fn run_restock_sweep(&self, now: DateTime<Utc>) -> Result<usize, GameError> {
        let mut restocked = 0usize;
        for entry in self.shop.iter() {
            let (key, _) = entry?;
            let Some(item_id) = Self::key_to_id(&key) else {
                continue;
            };
            match self.restock_entry(item_id, now) {
                Ok(true) => restocked += 1,
                Ok(false) => {}
                Err(err) => warn!("restock sweep: skipping item {}: {}", item_id, err),
            }
        }
        if restocked > 0 {
            info!("restocked {} global shop entries", restocked);
        }
        Ok(restocked)
    }

    fn restock_entry(&self, item_id: u64, now: DateTime<Utc>) -> Result<bool, GameError> {
        let _guard = self.unit_of_work();
        let Some(mut entry) = self.read_shop_entry(item_id)? else {
            return Ok(false);
        };
        if !entry.restock(now, self.config.restock_interval_minutes) {
            return Ok(false);
        }
        self.put_shop_entry_raw(&entry)?;
        self.flush()?;
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Player marketplace
    // ------------------------------------------------------------------

    /// Post a listing. The listed items are escrowed out of the seller's
    /// inventory until the listing is bought or cancelled.
    pub fn create_listing(
        &self,
        seller_id: u64,
        item_id: u64,
        quantity: u32,
        price: u64,
        now: DateTime<Utc>,
    ) -> Result<ListingRecord, GameError> {
        if quantity == 0 {
            return Err(GameError::InvalidListing(
                "quantity must be positive".to_string(),
            ));
        }
        let _guard = self.unit_of_work();
        self.require_player(seller_id)?;
        self.require_item(item_id)?;
        if self.item_quantity_raw(seller_id, item_id)? < quantity {
            return Err(GameError::InsufficientItems);
        }
        self.remove_item_raw(seller_id, item_id, quantity)?;
        let id = self.db.generate_id()?;
        let listing = ListingRecord {
            id,
            seller_id,
            item_id,
            quantity,
            price,
            created_at: now,
            schema_version: LISTING_SCHEMA_VERSION,
        };
        self.market.insert(Self::id_key(id), Self::serialize(&listing)?)?;
        self.flush()?;
        info!(
            "player {} listed {}x item {} for {}",
            seller_id, quantity, item_id, price
        );
        Ok(listing)
    }

    /// Purchase a listing: coins move buyer -> seller, items move
    /// seller -> buyer, and the listing is deleted, atomically.
    pub fn buy_listing(
        &self,
        buyer_id: u64,
        listing_id: u64,
        now: DateTime<Utc>,
    ) -> Result<ListingRecord, GameError> {
        let _guard = self.unit_of_work();
        let listing = self
            .read_listing(listing_id)?
            .ok_or_else(|| GameError::NotFound(format!("listing: {}", listing_id)))?;
        if listing.seller_id == buyer_id {
            return Err(GameError::InvalidListing(
                "cannot buy your own listing".to_string(),
            ));
        }
        let mut buyer = self.require_player(buyer_id)?;
        if buyer.coins < listing.price {
            return Err(GameError::InsufficientFunds {
                have: buyer.coins,
                need: listing.price,
            });
        }
        let mut seller = self.require_player(listing.seller_id)?;
        buyer.coins -= listing.price;
        seller.coins = seller.coins.saturating_add(listing.price);
        self.add_item_raw(buyer_id, listing.item_id, listing.quantity)?;
        self.market.remove(Self::id_key(listing_id))?;
        buyer.touch(now);
        seller.touch(now);
        self.put_player_raw(&buyer)?;
        self.put_player_raw(&seller)?;
        self.flush()?;
        info!(
            "player {} bought listing {} from player {} for {}",
            buyer_id, listing_id, listing.seller_id, listing.price
        );
        Ok(listing)
    }

    /// Cancel a listing and return the escrowed items to the seller.
    pub fn cancel_listing(&self, seller_id: u64, listing_id: u64) -> Result<(), GameError> {
        let _guard = self.unit_of_work();
        let listing = self
            .read_listing(listing_id)?
            .ok_or_else(|| GameError::NotFound(format!("listing: {}", listing_id)))?;
        if listing.seller_id != seller_id {
            return Err(GameError::InvalidListing(
                "only the seller may cancel a listing".to_string(),
            ));
        }
        self.add_item_raw(seller_id, listing.item_id, listing.quantity)?;
        self.market.remove(Self::id_key(listing_id))?;
        self.flush()?;
        Ok(())
    }

    /// All open listings in id order.
    pub fn list_listings(&self) -> Result<Vec<ListingRecord>, GameError> {
        let mut listings = Vec::new();
        for entry in self.market.iter() {
            let (_, value) = entry?;
            listings.push(Self::deserialize(value)?);
        }
        Ok(listings)
    }

    // ------------------------------------------------------------------
    // Message rewards
    // ------------------------------------------------------------------

    /// Roll the passive per-message reward: a chance of XP, and on an XP
    /// hit a further chance of an item drop weighted by drop_rate and
    /// gated by min_level against the recomputed level.
    pub fn message_reward(
        &self,
        id: u64,
        now: DateTime<Utc>,
    ) -> Result<MessageReward, GameError> {
        let _guard = self.unit_of_work();
        let mut player = self.require_player(id)?;
        let mut rng = rand::thread_rng();
        let mut result = MessageReward::default();

        if rng.gen::<f64>() >= self.config.message_xp_chance {
            return Ok(result);
        }
        let amount = rng.gen_range(self.config.message_xp_min..=self.config.message_xp_max);
        let gain = self.apply_xp(&mut player, amount);
        result.xp = Some(gain);

        if rng.gen::<f64>() < self.config.item_drop_chance {
            let level = leveling::level_for(
                player.xp,
                self.config.base_xp,
                self.config.xp_multiplier,
            );
            let eligible: Vec<ItemRecord> = self
                .list_items()?
                .into_iter()
                .filter(|item| item.min_level <= level)
                .collect();
            if let Some(item) = catalog::pick_weighted(&eligible, rng.gen::<f64>()) {
                self.add_item_raw(id, item.id, 1)?;
                result.item = Some(item.clone());
            }
        }

        player.touch(now);
        self.put_player_raw(&player)?;
        self.flush()?;
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Seeding & stats
    // ------------------------------------------------------------------

    /// Insert the default item catalog and global shop stock when the items
    /// tree is empty. Returns the number of items inserted.
    pub fn seed_catalog_if_needed(&self, now: DateTime<Utc>) -> Result<usize, GameError> {
        let _guard = self.unit_of_work();
        if self.items.iter().next().is_some() {
            return Ok(0);
        }
        let mut by_name: HashMap<String, u64> = HashMap::new();
        let mut inserted = 0usize;
        for item in catalog::default_items() {
            let id = self.db.generate_id()?;
            let record = item.into_record(id, now);
            by_name.insert(record.name.clone(), id);
            self.put_item_raw(&record)?;
            inserted += 1;
        }
        let mut shop_entries = 0usize;
        for seed in catalog::default_shop() {
            let Some(&item_id) = by_name.get(seed.item_name) else {
                continue;
            };
            let entry = ShopEntry::limited(item_id, seed.price, seed.stock, now);
            self.put_shop_entry_raw(&entry)?;
            shop_entries += 1;
        }
        self.flush()?;
        info!(
            "seeded {} catalog items and {} shop entries",
            inserted, shop_entries
        );
        Ok(inserted)
    }

    pub fn stats(&self) -> Result<StoreStats, GameError> {
        let mut active_dungeons = 0usize;
        for entry in self.dungeons.iter() {
            let (_, value) = entry?;
            let run: DungeonRecord = Self::deserialize(value)?;
            if run.status == DungeonStatus::Active {
                active_dungeons += 1;
            }
        }
        Ok(StoreStats {
            players: self.players.len(),
            items: self.items.len(),
            active_dungeons,
            listings: self.market.len(),
        })
    }
}
