use thiserror::Error;

/// Errors that can arise while interacting with the game storage layer.
#[derive(Debug, Error)]
pub enum GameError {
    /// Wrapper around sled's error type.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Wrapper around bincode serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Wrapper around IO errors (directory creation, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Returned when fetching a record that is not present.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Returned when deserializing a record with an unexpected schema version.
    #[error("schema mismatch for {entity}: expected {expected}, got {found}")]
    SchemaMismatch {
        entity: &'static str,
        expected: u8,
        found: u8,
    },

    /// Dungeon commit asked for more stamina than the player holds.
    #[error("insufficient stamina: have {have}, need {need}")]
    InsufficientStamina { have: u32, need: u32 },

    /// A dungeon run is already in progress for this player.
    #[error("a dungeon expedition is already active")]
    DungeonActive,

    /// Dungeon tier outside the supported range.
    #[error("invalid dungeon tier: {0}")]
    InvalidTier(u8),

    /// Dungeon commit with no stamina behind it.
    #[error("stamina commitment must be positive")]
    EmptyCommit,

    /// Purchase or transfer exceeds the player's coin balance.
    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: u64, need: u64 },

    /// Global shop entry has no remaining stock.
    #[error("item is out of stock")]
    OutOfStock,

    /// Player does not own enough of the item for this operation.
    #[error("insufficient items in inventory")]
    InsufficientItems,

    /// Marketplace listing operation rejected.
    #[error("invalid listing: {0}")]
    InvalidListing(String),

    /// Item definition names are unique; creation would collide.
    #[error("item name already exists: {0}")]
    DuplicateItem(String),

    /// Stamina is already at the player's cap.
    #[error("stamina is already full")]
    StaminaFull,

    /// Internal error (unexpected conditions).
    #[error("internal error: {0}")]
    Internal(String),
}
