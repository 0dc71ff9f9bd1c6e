// mmo-pilot - Browser automation bot for a browser-based MMO
//
// This is the library crate containing the decision loop, the game actions and
// the shared state. The binary crate (main.rs) provides the console entry point.

pub mod config;
pub mod context;
pub mod dispatcher;
pub mod events;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod notify;
pub mod services;
pub mod state;
pub mod surface;
pub mod timing;
pub mod ui;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use context::BotContext;
pub use dispatcher::{BotError, Dispatcher, TickOutcome};
pub use models::{BotConfiguration, BotFlag, BotState, Settings};
pub use state::{StateChange, StateManager};
pub use surface::{AutomationSurface, ChromeSurface, Selector, SurfaceError};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
