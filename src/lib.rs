//! # pixelrpg - Progression & Economy Engine for Chat-Platform RPG Bots
//!
//! pixelrpg is the state-and-rules core of a chat-platform RPG bot: players
//! accrue experience, stamina, coins, and items by sending messages and
//! running timed dungeon expeditions, with a player marketplace and a
//! restocking global shop on top. The chat-platform adapter (slash commands,
//! embeds, buttons) lives outside this crate and talks to the engine through
//! [`game::GameStore`].
//!
//! ## Features
//!
//! - **Leveling Curve**: Exponential XP thresholds with tier labels and
//!   level-up coin rewards.
//! - **Stamina Clock**: Lazy whole-interval regeneration that never loses
//!   fractional progress to sweep jitter.
//! - **Dungeon Expeditions**: Time-boxed runs resolved exactly once by a
//!   periodic sweep, with success/failure payouts and uniform loot draws.
//! - **Inventory & Economy**: Quantity-counted inventories, a seeded item
//!   catalog, a restocking global shop, and escrow-backed player listings.
//! - **Single-Writer Store**: All state in an embedded sled database behind
//!   one exclusive lock per unit of work.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use pixelrpg::game::GameStore;
//!
//! fn main() -> Result<(), pixelrpg::game::GameError> {
//!     let store = GameStore::open("data/game")?;
//!
//!     // A chat event handler ensures the player and rolls message rewards.
//!     let now = Utc::now();
//!     store.ensure_player(1001, "Alice", now)?;
//!     store.commit_dungeon(1001, 3, now)?;
//!
//!     // An external scheduler drives the sweeps every minute.
//!     for resolved in store.run_dungeon_sweep(Utc::now())? {
//!         println!("run {} finished: {:?}", resolved.run.id, resolved.run.status);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`game`] - Engine rules, record types, and the sled-backed store
//! - [`config`] - Configuration loading and validation
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  Chat Adapter       │ ← commands, embeds, notifications (external)
//! └─────────────────────┘
//!           │
//! ┌─────────────────────┐
//! │  GameStore          │ ← unit-of-work serialization, sweeps
//! └─────────────────────┘
//!           │
//! ┌─────────────────────┐
//! │  Rules Modules      │ ← leveling, stamina, dungeon, catalog, shop
//! └─────────────────────┘
//! ```
//!
//! The `pixelrpg` binary (`src/main.rs`) is a headless harness that runs the
//! three periodic sweeps against a store; an embedding adapter replaces it
//! with its own scheduler.

pub mod config;
pub mod game;
