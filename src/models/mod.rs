//! Data models for mmo-pilot.
//!
//! This module contains the core data structures shared across the crate:
//! - [`BotState`]: The shared runtime state (mode flags, run flag, action history)
//! - [`BotConfiguration`]: Snapshot of the flags the dispatcher reads every tick
//! - [`Settings`]: The settings document loaded from `mmo-pilot.yaml`
//! - [`GatherConfig`], [`CombatConfig`], [`DispatchConfig`]: Read-only timing tunables
//!
//! # Architecture Note
//!
//! - **Serializable**: All settings structs derive `Serialize`/`Deserialize` for YAML persistence
//! - **Cloneable**: BotState is wrapped in `Arc<RwLock<>>` by [`StateManager`](crate::state::StateManager) for thread-safe access
//! - **Immutable settings**: Tunables are loaded once and shared behind `Arc`

pub mod bot_state;
pub mod config;

pub use bot_state::{ACTION_HISTORY_LIMIT, ActionRecord, BotConfiguration, BotFlag, BotState};
pub use config::{
    BotSettings, BrowserSettings, CombatConfig, DispatchConfig, GatherConfig, Jitter,
    SecondsRange, Settings, SiteConfig, secs,
};
