//! Player statistics read from the profile popup.
//!
//! The monitor drives its own surface so reading stats never competes with
//! the dispatcher for the game page. Reads are cached for a short while and
//! refreshed shortly after actions that change the numbers.

use crate::events::{ActionEvent, ActionSubscriber};
use crate::state::StateManager;
use crate::surface::{AutomationSurface, Selector, SurfaceError};
use regex::Regex;
use serde::Serialize;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// How long a read stays fresh.
pub const CACHE_TTL: Duration = Duration::from_secs(10);

/// Delay between a triggering action and the refresh it causes.
pub const REFRESH_DELAY: Duration = Duration::from_secs(2);

/// Actions after which the stats are re-read.
pub const REFRESH_KEYWORDS: [&str; 6] = ["attack", "gather", "fight", "heal", "travel", "step"];

const POPUP_SELECTORS: [Selector; 3] = [
    Selector::css("div.rounded-lg.ring-1.ring-black.ring-opacity-5"),
    Selector::css("div[class*='ring-1'][class*='ring-black']"),
    Selector::css("div[class*='popup']"),
];

static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("Invalid digits regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stat {
    Health,
    MaxHealth,
    Energy,
    MaxEnergy,
    Gold,
    Bank,
    Diamonds,
    QuestPoints,
    MaxQuestPoints,
    Steps,
    Level,
    ExpRemaining,
}

const STAT_SELECTORS: [(Stat, Selector); 12] = [
    (Stat::Health, Selector::css("[x-text*='user.current_hp']")),
    (Stat::MaxHealth, Selector::css("[x-text='user.max_hp']")),
    (Stat::Energy, Selector::css("[x-text='user.energy']")),
    (Stat::MaxEnergy, Selector::css("[x-text='user.max_energy']")),
    (Stat::Gold, Selector::css("[x-text='user.gold']")),
    (Stat::Bank, Selector::css("[x-text='user.bank']")),
    (Stat::Diamonds, Selector::css("[x-text='user.diamonds']")),
    (Stat::QuestPoints, Selector::css("[x-text='user.quest_points']")),
    (Stat::MaxQuestPoints, Selector::css("[x-text='user.max_quest_points']")),
    (Stat::Steps, Selector::css("[x-text='user.total_steps']")),
    (Stat::Level, Selector::css("[x-text='user.level']")),
    (Stat::ExpRemaining, Selector::css("[x-text='user.exp_remaining']")),
];

/// Snapshot of the character's numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlayerStats {
    pub health: u64,
    pub max_health: u64,
    pub energy: u64,
    pub max_energy: u64,
    pub gold: u64,
    pub bank: u64,
    pub diamonds: u64,
    pub quest_points: u64,
    pub max_quest_points: u64,
    pub steps: u64,
    pub level: u64,
    pub exp_remaining: u64,
}

impl PlayerStats {
    fn set(&mut self, stat: Stat, value: u64) {
        let slot = match stat {
            Stat::Health => &mut self.health,
            Stat::MaxHealth => &mut self.max_health,
            Stat::Energy => &mut self.energy,
            Stat::MaxEnergy => &mut self.max_energy,
            Stat::Gold => &mut self.gold,
            Stat::Bank => &mut self.bank,
            Stat::Diamonds => &mut self.diamonds,
            Stat::QuestPoints => &mut self.quest_points,
            Stat::MaxQuestPoints => &mut self.max_quest_points,
            Stat::Steps => &mut self.steps,
            Stat::Level => &mut self.level,
            Stat::ExpRemaining => &mut self.exp_remaining,
        };
        *slot = value;
    }

    pub fn summary_line(&self) -> String {
        format!(
            "Level {} | HP {}/{} | Energy {}/{} | Gold {} (bank {}) | Diamonds {} | QP {}/{} | Steps {} | {} exp to next level",
            self.level,
            self.health,
            self.max_health,
            self.energy,
            self.max_energy,
            self.gold,
            self.bank,
            self.diamonds,
            self.quest_points,
            self.max_quest_points,
            self.steps,
            self.exp_remaining
        )
    }
}

/// Parse a displayed number, ignoring thousands separators.
pub fn parse_stat(text: &str) -> Option<u64> {
    let cleaned: String = text.chars().filter(|c| *c != ',' && *c != '.').collect();
    DIGITS.find(&cleaned).and_then(|m| m.as_str().parse().ok())
}

#[derive(Default)]
struct Cache {
    stats: Option<PlayerStats>,
    fetched_at: Option<Instant>,
    needs_reconnect: bool,
}

/// Reads [`PlayerStats`] through a dedicated surface.
pub struct PlayerMonitor<S: AutomationSurface> {
    surface: S,
    cache: Mutex<Cache>,
    latest: watch::Sender<Option<PlayerStats>>,
}

impl<S: AutomationSurface> PlayerMonitor<S> {
    /// The surface may start unconnected; the first refresh connects it.
    pub fn new(surface: S) -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            surface,
            cache: Mutex::new(Cache {
                needs_reconnect: true,
                ..Cache::default()
            }),
            latest,
        }
    }

    /// Receiver of every successful read.
    pub fn watch(&self) -> watch::Receiver<Option<PlayerStats>> {
        self.latest.subscribe()
    }

    /// Cached stats when fresh, a new read otherwise.
    pub async fn stats(&self) -> Option<PlayerStats> {
        {
            let cache = self.cache.lock().await;
            if let (Some(stats), Some(at)) = (&cache.stats, cache.fetched_at) {
                if at.elapsed() < CACHE_TTL {
                    return Some(stats.clone());
                }
            }
        }

        match self.refresh().await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!("Failed to read player stats: {}", e);
                None
            }
        }
    }

    /// Read the stats now.
    ///
    /// `Ok(None)` when the profile popup is not open. A failed read marks
    /// the connection for rebuilding before the next attempt.
    pub async fn refresh(&self) -> Result<Option<PlayerStats>, SurfaceError> {
        let mut cache = self.cache.lock().await;

        if cache.needs_reconnect || !self.surface.is_valid().await {
            self.surface.reconnect().await?;
            cache.needs_reconnect = false;
        }

        match self.read().await {
            Ok(Some(stats)) => {
                cache.stats = Some(stats.clone());
                cache.fetched_at = Some(Instant::now());
                self.latest.send_replace(Some(stats.clone()));
                Ok(Some(stats))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                cache.needs_reconnect = true;
                Err(e)
            }
        }
    }

    async fn read(&self) -> Result<Option<PlayerStats>, SurfaceError> {
        if !self.popup_open().await? {
            tracing::debug!("Profile popup not open, skipping stats read");
            return Ok(None);
        }

        let mut stats = PlayerStats::default();
        for (stat, selector) in &STAT_SELECTORS {
            let Some(element) = self.surface.find_all(selector).await?.into_iter().next() else {
                continue;
            };
            if let Some(value) = self
                .surface
                .read_text(&element)
                .await
                .as_deref()
                .and_then(parse_stat)
            {
                stats.set(*stat, value);
            }
        }
        Ok(Some(stats))
    }

    async fn popup_open(&self) -> Result<bool, SurfaceError> {
        for selector in &POPUP_SELECTORS {
            for element in self.surface.find_all(selector).await? {
                let visible = self
                    .surface
                    .element_state(&element)
                    .await
                    .map(|state| state.visible)
                    .unwrap_or(false);
                if !visible {
                    continue;
                }
                if let Some(text) = self.surface.read_text(&element).await {
                    if text.contains("Health") || text.contains("HP") {
                        return Ok(true);
                    }
                }
            }
        }
        Ok(false)
    }
}

/// Forwards stat-changing actions to the refresh task.
pub struct RefreshTrigger {
    tx: mpsc::UnboundedSender<String>,
}

impl RefreshTrigger {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }

    pub fn triggers_refresh(action: &str) -> bool {
        let action = action.to_lowercase();
        REFRESH_KEYWORDS.iter().any(|keyword| action.contains(keyword))
    }
}

impl ActionSubscriber for RefreshTrigger {
    fn name(&self) -> &str {
        "player-monitor"
    }

    fn on_action(&self, event: &ActionEvent) -> anyhow::Result<()> {
        if Self::triggers_refresh(&event.action) {
            self.tx.send(event.action.clone())?;
        }
        Ok(())
    }
}

/// Spawn the refresh task and subscribe it to `state`'s actions.
///
/// The returned handle runs until aborted.
pub fn spawn_monitor<S>(monitor: Arc<PlayerMonitor<S>>, state: &StateManager) -> JoinHandle<()>
where
    S: AutomationSurface + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel();
    state.subscribe_actions(Arc::new(RefreshTrigger::new(tx)));

    tokio::spawn(async move {
        if let Some(stats) = monitor.stats().await {
            tracing::info!("{}", stats.summary_line());
        }

        while let Some(action) = rx.recv().await {
            tokio::time::sleep(REFRESH_DELAY).await;
            // Collapse triggers that arrived during the delay
            while rx.try_recv().is_ok() {}

            match monitor.refresh().await {
                Ok(Some(stats)) => tracing::debug!("After {}: {}", action, stats.summary_line()),
                Ok(None) => {}
                Err(e) => tracing::warn!("Player stats refresh failed: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stat() {
        assert_eq!(parse_stat("1,234"), Some(1234));
        assert_eq!(parse_stat("12.500.000"), Some(12_500_000));
        assert_eq!(parse_stat(" 85 "), Some(85));
        assert_eq!(parse_stat("n/a"), None);
    }

    #[test]
    fn test_refresh_keywords() {
        assert!(RefreshTrigger::triggers_refresh("Attack"));
        assert!(RefreshTrigger::triggers_refresh("Gather"));
        assert!(RefreshTrigger::triggers_refresh("Step"));
        assert!(!RefreshTrigger::triggers_refresh("Idle"));
    }

    #[test]
    fn test_trigger_forwards_matching_actions() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let trigger = RefreshTrigger::new(tx);

        trigger
            .on_action(&ActionEvent {
                action: "Heal".to_string(),
                timestamp: "12:00:00".to_string(),
            })
            .unwrap();
        trigger
            .on_action(&ActionEvent {
                action: "Idle".to_string(),
                timestamp: "12:00:01".to_string(),
            })
            .unwrap();

        assert_eq!(rx.try_recv().unwrap(), "Heal");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_trigger_reports_closed_channel() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let trigger = RefreshTrigger::new(tx);

        let result = trigger.on_action(&ActionEvent {
            action: "Attack".to_string(),
            timestamp: "12:00:00".to_string(),
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_summary_line() {
        let stats = PlayerStats {
            level: 12,
            health: 80,
            max_health: 100,
            ..PlayerStats::default()
        };
        assert!(stats.summary_line().starts_with("Level 12 | HP 80/100"));
    }
}
