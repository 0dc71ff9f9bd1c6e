use crate::metrics::BotMetrics;
use crate::models::Settings;
use crate::notify::{LogNotifier, Notifier};
use crate::state::StateManager;
use std::sync::Arc;

/// Everything the dispatcher and its components share.
///
/// Passed down explicitly; nothing in the crate reaches for ambient globals.
#[derive(Clone)]
pub struct BotContext {
    pub state: StateManager,
    pub settings: Arc<Settings>,
    pub notifier: Arc<dyn Notifier>,
    pub metrics: Arc<BotMetrics>,
}

impl BotContext {
    pub fn new(state: StateManager, settings: Settings, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            state,
            settings: Arc::new(settings),
            notifier,
            metrics: Arc::new(BotMetrics::new()),
        }
    }

    /// Context whose notifications only go to the log.
    pub fn headless(settings: Settings) -> Self {
        let state = StateManager::from_settings(&settings.bot);
        Self::new(state, settings, Arc::new(LogNotifier))
    }
}

impl std::fmt::Debug for BotContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotContext")
            .field("settings", &self.settings)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}
