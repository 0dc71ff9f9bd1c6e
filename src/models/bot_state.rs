use indexmap::IndexMap;
use std::collections::VecDeque;

/// Maximum number of entries kept in the action history.
///
/// Older entries are dropped first. The control surface only ever shows the
/// most recent actions, so the history is a ring rather than a log.
pub const ACTION_HISTORY_LIMIT: usize = 50;

/// One performed action, as shown by the control surface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionRecord {
    /// Local wall-clock time formatted as `HH:MM:SS`
    pub timestamp: String,
    pub action: String,
}

/// Named boolean flags of the shared configuration store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BotFlag {
    AttackMode,
    GatherMode,
    Terminate,
}

impl BotFlag {
    /// Parse a configuration key as used by the control surface.
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "attack" | "attack_mode" | "attack_mode_enabled" => Some(Self::AttackMode),
            "gather" | "gather_mode" | "gather_mode_enabled" => Some(Self::GatherMode),
            "terminate" | "should_terminate" => Some(Self::Terminate),
            _ => None,
        }
    }
}

/// Copy of the three flags the dispatcher consults every tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BotConfiguration {
    pub attack_mode_enabled: bool,
    pub gather_mode_enabled: bool,
    pub should_terminate: bool,
}

impl Default for BotConfiguration {
    fn default() -> Self {
        Self {
            attack_mode_enabled: true,
            gather_mode_enabled: true,
            should_terminate: false,
        }
    }
}

/// Single source of truth for everything shared between the dispatcher
/// worker and the control surface.
///
/// # Thread Safety
///
/// `BotState` is wrapped in `Arc<RwLock<BotState>>` by
/// [`crate::state::StateManager`]. Never hold a reference to it across an
/// await point; use [`read()`](crate::state::StateManager::read) for short
/// read-copy-return access and [`update()`](crate::state::StateManager::update)
/// for mutations so change events are emitted.
#[derive(Clone, Debug)]
pub struct BotState {
    // Configuration flags
    pub attack_mode: bool,
    pub gather_mode: bool,
    pub should_terminate: bool,

    // Runtime state
    pub running: bool,
    pub current_activity: String,

    // History
    pub history: VecDeque<ActionRecord>,
    pub action_counts: IndexMap<String, u64>,
}

impl Default for BotState {
    fn default() -> Self {
        let defaults = BotConfiguration::default();
        Self {
            attack_mode: defaults.attack_mode_enabled,
            gather_mode: defaults.gather_mode_enabled,
            should_terminate: defaults.should_terminate,

            running: false,
            current_activity: String::new(),

            history: VecDeque::with_capacity(ACTION_HISTORY_LIMIT),
            action_counts: IndexMap::new(),
        }
    }
}

impl BotState {
    /// Current configuration flags.
    pub fn configuration(&self) -> BotConfiguration {
        BotConfiguration {
            attack_mode_enabled: self.attack_mode,
            gather_mode_enabled: self.gather_mode,
            should_terminate: self.should_terminate,
        }
    }

    /// Read a flag by name.
    pub fn flag(&self, flag: BotFlag) -> bool {
        match flag {
            BotFlag::AttackMode => self.attack_mode,
            BotFlag::GatherMode => self.gather_mode,
            BotFlag::Terminate => self.should_terminate,
        }
    }

    /// Write a flag by name.
    pub fn set_flag(&mut self, flag: BotFlag, value: bool) {
        match flag {
            BotFlag::AttackMode => self.attack_mode = value,
            BotFlag::GatherMode => self.gather_mode = value,
            BotFlag::Terminate => self.should_terminate = value,
        }
    }

    /// True when every wait should unwind as soon as possible.
    pub fn should_stop(&self) -> bool {
        self.should_terminate || !self.running
    }

    /// Append an action to the bounded history and bump its counter.
    ///
    /// Returns the new total for that action name.
    pub fn push_action(&mut self, timestamp: String, action: &str) -> u64 {
        if self.history.len() == ACTION_HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(ActionRecord {
            timestamp,
            action: action.to_string(),
        });

        let count = self.action_counts.entry(action.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Human-readable summary of the per-action counters, in first-seen order.
    pub fn action_summary(&self) -> String {
        if self.action_counts.is_empty() {
            return "No actions yet".to_string();
        }

        self.action_counts
            .iter()
            .map(|(action, count)| format!("{action}: {count}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
