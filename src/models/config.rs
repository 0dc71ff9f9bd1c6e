use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Randomized wait: `base ± variance` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Jitter {
    pub base: f64,
    pub variance: f64,
}

impl Jitter {
    pub const fn new(base: f64, variance: f64) -> Self {
        Self { base, variance }
    }
}

/// Uniformly random wait between `min` and `max` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SecondsRange {
    pub min: f64,
    pub max: f64,
}

impl SecondsRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

/// Convert a seconds value from the settings file into a [`Duration`].
///
/// Negative and non-finite values clamp to zero.
pub fn secs(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f64(value)
    } else {
        Duration::ZERO
    }
}

/// Settings document from `mmo-pilot.yaml`
///
/// Every section is optional in the file; missing keys fall back to the
/// defaults below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub browser: BrowserSettings,
    pub site: SiteConfig,
    pub bot: BotSettings,
    pub gather: GatherConfig,
    pub combat: CombatConfig,
    pub dispatch: DispatchConfig,
}

/// How to reach the already-running browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// `host:port` of the browser's remote debugging endpoint
    pub debug_address: String,

    /// Page opened when no tab is on the game site yet
    pub start_url: String,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            debug_address: "127.0.0.1:9222".to_string(),
            start_url: "https://web.simple-mmo.com/travel".to_string(),
        }
    }
}

/// Fixed URL locations of the target site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub base_url: String,
    pub travel_path: String,
    pub gather_path: String,
    pub attack_path: String,
    pub healer_path: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://web.simple-mmo.com".to_string(),
            travel_path: "/travel".to_string(),
            gather_path: "/crafting/material/gather/".to_string(),
            attack_path: "/npcs/attack/".to_string(),
            healer_path: "/healer?new_page_refresh=true".to_string(),
        }
    }
}

impl SiteConfig {
    fn join(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// The base page every tick expects to start from.
    pub fn travel_url(&self) -> String {
        self.join(&self.travel_path)
    }

    /// Location prefix of an open collection interface.
    pub fn gather_prefix(&self) -> String {
        self.join(&self.gather_path)
    }

    /// Location prefix of an open combat interface.
    pub fn attack_prefix(&self) -> String {
        self.join(&self.attack_path)
    }

    pub fn healer_url(&self) -> String {
        self.join(&self.healer_path)
    }
}

/// Startup values for the shared flags plus logging options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotSettings {
    pub attack_mode: bool,
    pub gather_mode: bool,
    pub debug_mode: bool,
    pub log_dir: String,

    /// Run the passive player monitor on a second browser connection
    pub monitor_enabled: bool,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            attack_mode: true,
            gather_mode: true,
            debug_mode: false,
            log_dir: "logs".to_string(),
            monitor_enabled: true,
        }
    }
}

/// Tunables of the gather state machine.
///
/// The defaults were tuned against the live site's timing; they are
/// operational values, not invariants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatherConfig {
    /// Minimum interval between two collect clicks
    pub cooldown_secs: f64,
    /// Budget of one WaitingForReady phase inside a session
    pub ready_timeout_secs: f64,
    pub max_consecutive_failures: u32,
    /// Poll interval while waiting for the collect control
    pub check_interval_secs: f64,
    /// Wait after a collect click for the page to update
    pub settle: SecondsRange,
    /// Extra pause after a counted success
    pub post_collect_pause: SecondsRange,
    /// Added to the detected available count to form the safety ceiling
    pub safety_margin: u32,
    /// Ceiling used when the available count could not be read
    pub fallback_ceiling: u32,
    /// Polls before the remaining-quantity field is consulted
    pub exhaustion_check_after: u32,
    /// 1s checks for the close control once the quantity reads zero
    pub exhausted_grace_checks: u32,
    /// 1s checks for the close control after a "no materials" result
    pub no_material_grace_checks: u32,
    pub max_no_material_rounds: u32,
    /// 1s checks for the close control once the ceiling is reached
    pub ceiling_grace_checks: u32,
    /// Check the close control after every N successes
    pub periodic_close_check_every: u32,
    /// 1.5s checks for the close control after repeated readiness failures
    pub failure_close_checks: u32,
    pub retry_pause_secs: f64,
    pub failure_pause_secs: f64,
    /// 1s checks for the close control before closing the interface
    pub final_close_checks: u32,
    pub close_attempts: u32,
    /// Wait after clicking close before confirming the interface left
    pub close_settle_secs: f64,
    /// Pause between two close attempts
    pub close_retry_pause_secs: f64,
    /// Wait for the collection interface to open after clicking an entry
    pub entry_timeout_secs: f64,
    pub entry_settle_secs: f64,
    pub entry_poll_secs: f64,
}

impl Default for GatherConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 0.5,
            ready_timeout_secs: 15.0,
            max_consecutive_failures: 3,
            check_interval_secs: 0.3,
            settle: SecondsRange::new(1.5, 2.5),
            post_collect_pause: SecondsRange::new(1.0, 1.5),
            safety_margin: 5,
            fallback_ceiling: 100,
            exhaustion_check_after: 10,
            exhausted_grace_checks: 5,
            no_material_grace_checks: 6,
            max_no_material_rounds: 5,
            ceiling_grace_checks: 8,
            periodic_close_check_every: 5,
            failure_close_checks: 3,
            retry_pause_secs: 2.0,
            failure_pause_secs: 1.5,
            final_close_checks: 5,
            close_attempts: 3,
            close_settle_secs: 2.0,
            close_retry_pause_secs: 1.5,
            entry_timeout_secs: 7.0,
            entry_settle_secs: 1.5,
            entry_poll_secs: 0.5,
        }
    }
}

/// Tunables of the combat retry loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Hard ceiling of attack clicks per combat
    pub max_attacks: u32,
    pub max_consecutive_timeouts: u32,
    /// Explicit wait for the attack control to become clickable
    pub attack_wait_secs: f64,
    pub pacing: SecondsRange,
    pub timeout_pause_secs: f64,
    pub leave_settle_secs: f64,
    /// Wait for the exit control once the loop has ended
    pub exit_wait_secs: f64,
    pub exit_settle_secs: f64,
    /// Wait for the combat interface to open after clicking an attack entry
    pub entry_timeout_secs: f64,
    pub entry_poll_secs: f64,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            max_attacks: 100,
            max_consecutive_timeouts: 8,
            attack_wait_secs: 5.0,
            pacing: SecondsRange::new(1.0, 1.8),
            timeout_pause_secs: 0.5,
            leave_settle_secs: 2.0,
            exit_wait_secs: 3.0,
            exit_settle_secs: 1.5,
            entry_timeout_secs: 10.0,
            entry_poll_secs: 0.5,
        }
    }
}

/// Tunables of the top-level dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub tick_pause: Jitter,
    /// Pause instead of acting while energy is at or below this value
    pub energy_floor: u32,
    pub low_energy_pause: Jitter,
    pub reconnect_failure_pause_secs: f64,
    pub post_reconnect_pause_secs: f64,
    pub idle_backoff: Jitter,
    pub post_action_pause: Jitter,
    pub post_step_pause: Jitter,
    pub heal_failure_pause: Jitter,
    /// Wait around each page change of the heal sequence
    pub heal_settle_secs: f64,
    /// Wait for the heal control to become clickable
    pub heal_wait_secs: f64,
    /// Consecutive tick errors tolerated before the surface is rebuilt
    pub error_budget: u32,
    pub error_pause: Jitter,
    pub challenge_poll_secs: f64,
    pub navigate_settle_secs: f64,
    pub step_delay: SecondsRange,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            tick_pause: Jitter::new(1.0, 0.5),
            energy_floor: 10,
            low_energy_pause: Jitter::new(10.0, 5.0),
            reconnect_failure_pause_secs: 10.0,
            post_reconnect_pause_secs: 3.0,
            idle_backoff: Jitter::new(3.0, 2.0),
            post_action_pause: Jitter::new(2.0, 1.0),
            post_step_pause: Jitter::new(1.0, 0.5),
            heal_failure_pause: Jitter::new(10.0, 5.0),
            heal_settle_secs: 3.0,
            heal_wait_secs: 10.0,
            error_budget: 10,
            error_pause: Jitter::new(5.0, 3.0),
            challenge_poll_secs: 1.0,
            navigate_settle_secs: 2.0,
            step_delay: SecondsRange::new(0.2, 0.5),
        }
    }
}
