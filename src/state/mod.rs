// State management module
//
// This module provides the StateManager which wraps BotState with thread-safe access
// using Arc<RwLock<T>> and emits change events for the control surface.

use crate::events::{ActionEvent, ActionSubscriber, SubscriberRegistry};
use crate::models::{ActionRecord, BotConfiguration, BotFlag, BotSettings, BotState};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

/// Change events emitted when state is modified
///
/// These events notify interested parties (the console controller and the
/// logging task) about state changes without requiring them to poll.
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// Attack or gather mode was toggled
    ModesChanged { attack_mode: bool, gather_mode: bool },

    /// The dispatcher loop started or stopped
    RunStateChanged { running: bool },

    /// Termination was requested
    TerminationRequested,

    /// The dispatcher moved on to a new activity
    ActivityChanged { activity: String },

    /// An action was recorded in the history
    ActionPerformed { action: String, total: u64 },
}

/// Thread-safe state manager with event emission
///
/// This is the shared store between the dispatcher worker and the control
/// surface. It:
/// - Provides thread-safe access to [`BotState`] via `Arc<RwLock<T>>`
/// - Detects state changes and emits [`StateChange`] events
/// - Publishes recorded actions to registered [`ActionSubscriber`]s
///
/// # Usage
///
/// - [`read()`](Self::read) for short read-copy-return access
/// - [`update()`](Self::update) for mutations with automatic event emission
/// - [`record_action()`](Self::record_action) to log a performed action
/// - [`subscribe()`](Self::subscribe) for listening to state changes
///
/// # Related Types
///
/// - [`crate::models::BotState`]: The underlying state structure
/// - [`crate::ui::controller::ConsoleController`]: Primary consumer of state events
pub struct StateManager {
    /// The bot state protected by RwLock for thread-safe access
    state: Arc<RwLock<BotState>>,

    /// Broadcast channel for emitting state change events
    state_tx: broadcast::Sender<StateChange>,

    /// Listeners notified on every recorded action
    subscribers: SubscriberRegistry,
}

impl StateManager {
    /// Create a new StateManager with default state
    ///
    /// # Returns
    /// A new StateManager with a broadcast channel buffer of 100 events
    pub fn new() -> Self {
        Self::with_state(BotState::default())
    }

    /// Create a StateManager seeded with the startup flags from the settings file
    pub fn from_settings(settings: &BotSettings) -> Self {
        Self::with_state(BotState {
            attack_mode: settings.attack_mode,
            gather_mode: settings.gather_mode,
            ..BotState::default()
        })
    }

    fn with_state(state: BotState) -> Self {
        let (state_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(state)),
            state_tx,
            subscribers: SubscriberRegistry::new(),
        }
    }

    /// Get a copy of the current state
    pub fn snapshot(&self) -> BotState {
        self.read(Clone::clone)
    }

    /// Execute a function with read access to the state
    ///
    /// # Example
    /// ```ignore
    /// let attack = state_manager.read(|state| state.attack_mode);
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&BotState) -> R,
    {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Update the state and emit change events
    ///
    /// This is the primary way to modify state. It:
    /// 1. Captures the old state
    /// 2. Applies the update function
    /// 3. Detects what changed
    /// 4. Emits appropriate events
    ///
    /// # Returns
    /// A vector of StateChange events that were emitted
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut BotState),
    {
        let changes = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let old_state = state.clone();

            update_fn(&mut state);

            Self::detect_changes(&old_state, &state)
        };

        for change in &changes {
            // Ignore send errors - it's OK if no one is listening
            let _ = self.state_tx.send(change.clone());
        }

        changes
    }

    /// Subscribe to state change events
    ///
    /// Returns a receiver that will get notified of all future state changes.
    /// Multiple subscribers can listen simultaneously.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    /// Register a listener that is called for every recorded action
    pub fn subscribe_actions(&self, subscriber: Arc<dyn ActionSubscriber>) {
        self.subscribers.register(subscriber);
    }

    pub fn unsubscribe_actions(&self, subscriber: &Arc<dyn ActionSubscriber>) -> bool {
        self.subscribers.unregister(subscriber)
    }

    fn detect_changes(old: &BotState, new: &BotState) -> Vec<StateChange> {
        let mut changes = Vec::new();

        if old.attack_mode != new.attack_mode || old.gather_mode != new.gather_mode {
            changes.push(StateChange::ModesChanged {
                attack_mode: new.attack_mode,
                gather_mode: new.gather_mode,
            });
        }

        if old.running != new.running {
            changes.push(StateChange::RunStateChanged {
                running: new.running,
            });
        }

        if !old.should_terminate && new.should_terminate {
            changes.push(StateChange::TerminationRequested);
        }

        if old.current_activity != new.current_activity {
            changes.push(StateChange::ActivityChanged {
                activity: new.current_activity.clone(),
            });
        }

        changes
    }

    // Convenience methods for common state updates

    /// Current values of the three configuration flags
    pub fn configuration(&self) -> BotConfiguration {
        self.read(BotState::configuration)
    }

    pub fn flag(&self, flag: BotFlag) -> bool {
        self.read(|state| state.flag(flag))
    }

    pub fn set_flag(&self, flag: BotFlag, value: bool) -> Vec<StateChange> {
        self.update(|state| state.set_flag(flag, value))
    }

    pub fn set_running(&self, running: bool) -> Vec<StateChange> {
        self.update(|state| state.running = running)
    }

    pub fn is_running(&self) -> bool {
        self.read(|state| state.running)
    }

    /// Ask the dispatcher and every pending wait to unwind
    pub fn request_stop(&self) -> Vec<StateChange> {
        self.update(|state| state.should_terminate = true)
    }

    /// True once termination was requested or the dispatcher is not running
    pub fn should_stop(&self) -> bool {
        self.read(BotState::should_stop)
    }

    pub fn set_activity(&self, activity: impl Into<String>) -> Vec<StateChange> {
        let activity = activity.into();
        self.update(|state| state.current_activity = activity)
    }

    /// Record a performed action
    ///
    /// Appends to the bounded history, bumps the per-action counter, emits
    /// [`StateChange::ActionPerformed`] and then notifies the action
    /// subscribers outside the state lock.
    pub fn record_action(&self, action: &str) -> u64 {
        let timestamp = chrono::Local::now().format("%H:%M:%S").to_string();

        let total = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.push_action(timestamp.clone(), action)
        };

        tracing::debug!("Action recorded: {} (total {})", action, total);

        let _ = self.state_tx.send(StateChange::ActionPerformed {
            action: action.to_string(),
            total,
        });

        self.subscribers.publish(&ActionEvent {
            action: action.to_string(),
            timestamp,
        });

        total
    }

    /// The most recent actions, oldest first
    pub fn recent_actions(&self, limit: usize) -> Vec<ActionRecord> {
        self.read(|state| {
            let skip = state.history.len().saturating_sub(limit);
            state.history.iter().skip(skip).cloned().collect()
        })
    }

    pub fn action_summary(&self) -> String {
        self.read(BotState::action_summary)
    }

    pub fn action_count(&self, action: &str) -> u64 {
        self.read(|state| state.action_counts.get(action).copied().unwrap_or(0))
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

// Make StateManager cloneable for sharing across tasks
impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            state_tx: self.state_tx.clone(),
            subscribers: self.subscribers.clone(),
        }
    }
}
