//! Game actions.
//!
//! Each service performs one kind of action on an [`AutomationSurface`]
//! and reports an [`ActionOutcome`]; none of them decides what to do next.
//! That is the dispatcher's job.
//!
//! # Components
//!
//! - [`signals`]: selectors and page checks shared by all services
//! - [`combat`]: attack entry, attack loop and combat exit
//! - [`gather`]: the gather session state machine
//! - [`movement`]: stepping and returning to the travel page
//! - [`healing`]: recovery after a defeat
//! - [`challenge`]: holding while a human solves a verification
//! - [`player_data`]: the player stats monitor
//!
//! [`AutomationSurface`]: crate::surface::AutomationSurface

pub mod challenge;
pub mod combat;
pub mod gather;
pub mod healing;
pub mod movement;
pub mod player_data;
pub mod signals;

pub use combat::{CombatExit, CombatReport};
pub use gather::{
    GatherError, GatherReport, GatherSession, GatherState, GatherStatus, GatherTermination, Gatherer,
    WaitOutcome,
};
pub use player_data::{PlayerMonitor, PlayerStats};

/// Result of one action attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Succeeded,
    /// Nothing was done; the next action may be tried.
    Retryable(String),
    /// The action ran into a condition that retrying will not fix.
    Terminal(String),
}

impl ActionOutcome {
    /// Whether the attempt used up the current tick.
    pub fn is_handled(&self) -> bool {
        !matches!(self, Self::Retryable(_))
    }
}
