//! The main loop.
//!
//! Each tick reads the page once from the top of the priority list and does
//! at most one thing:
//!
//! 1. stop when termination was requested
//! 2. rebuild a dead browser connection
//! 3. wait out low energy
//! 4. hold for a verification challenge
//! 5. heal after a defeat
//! 6. return to the travel page
//! 7. combat, then gathering, then a step; the first that acts ends the tick
//!
//! Errors escaping a tick are counted; a run of them forces a reconnect.

use crate::context::BotContext;
use crate::logging::RepeatFilter;
use crate::models::BotFlag;
use crate::services::gather::{self, Gatherer};
use crate::services::{challenge, combat, healing, movement, signals};
use crate::surface::{AutomationSurface, SurfaceError};
use crate::timing::{jittered, pause, pause_secs};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BotError {
    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

/// Action categories of the last priority step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Combat,
    Gather,
    Step,
}

/// What a tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Terminated,
    /// Stopped while pausing.
    Stopped,
    Reconnected,
    ReconnectFailed,
    LowEnergy(u32),
    ChallengeCleared,
    Recovered,
    RecoveryFailed,
    Navigated,
    Acted(ActionKind),
    Idle,
    /// The tick raised an error; the message is kept for the caller.
    Failed(String),
}

pub struct Dispatcher<S: AutomationSurface> {
    surface: Arc<S>,
    ctx: BotContext,
    gatherer: Gatherer,
    consecutive_errors: u32,
    repeats: RepeatFilter,
}

impl<S: AutomationSurface> Dispatcher<S> {
    pub fn new(surface: Arc<S>, ctx: BotContext) -> Self {
        Self {
            surface,
            ctx,
            gatherer: Gatherer::new(),
            consecutive_errors: 0,
            repeats: RepeatFilter::default(),
        }
    }

    /// Errors recorded since the last successful tick.
    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn context(&self) -> &BotContext {
        &self.ctx
    }

    /// Run ticks until termination is requested.
    pub async fn run(&mut self) {
        tracing::info!("Bot started");
        self.ctx.state.set_running(true);

        loop {
            if self.ctx.state.flag(BotFlag::Terminate) {
                break;
            }
            if self.tick().await == TickOutcome::Terminated {
                break;
            }
        }

        self.ctx.state.set_running(false);
        self.ctx.state.set_activity("Stopped");
        tracing::info!("Bot stopped");
    }

    /// One pass over the priority list, with error accounting.
    pub async fn tick(&mut self) -> TickOutcome {
        self.ctx.metrics.record_tick();

        match self.try_tick().await {
            Ok(outcome) => {
                self.consecutive_errors = 0;
                tracing::trace!("Tick finished: {:?}", outcome);
                outcome
            }
            Err(e) => {
                let message = e.to_string();
                self.handle_error(e).await;
                TickOutcome::Failed(message)
            }
        }
    }

    async fn try_tick(&mut self) -> Result<TickOutcome, BotError> {
        let cfg = &self.ctx.settings.dispatch;
        let state = &self.ctx.state;
        let surface = self.surface.as_ref();

        if state.flag(BotFlag::Terminate) {
            return Ok(TickOutcome::Terminated);
        }

        if !pause(jittered(cfg.tick_pause), state).await {
            return Ok(TickOutcome::Stopped);
        }

        if !surface.is_valid().await {
            tracing::warn!("Browser connection lost, reconnecting");
            self.ctx.metrics.record_reconnect();
            return match surface.reconnect().await {
                Ok(()) => {
                    pause_secs(cfg.post_reconnect_pause_secs, state).await;
                    Ok(TickOutcome::Reconnected)
                }
                Err(e) => {
                    tracing::error!("Reconnect failed: {}", e);
                    pause_secs(cfg.reconnect_failure_pause_secs, state).await;
                    Ok(TickOutcome::ReconnectFailed)
                }
            };
        }

        if let Some(energy) = signals::energy(surface).await {
            if energy <= cfg.energy_floor {
                let message = format!("Low energy ({energy}), waiting");
                if self.repeats.should_emit(&message) {
                    tracing::info!("{}", message);
                }
                state.set_activity("Resting");
                pause(jittered(cfg.low_energy_pause), state).await;
                return Ok(TickOutcome::LowEnergy(energy));
            }
        }

        if signals::challenge_present(surface).await {
            tracing::warn!("Verification challenge on the page");
            if !challenge::wait_for_clear(surface, &self.ctx, &signals::CHALLENGE).await {
                return Ok(TickOutcome::Stopped);
            }
            return Ok(TickOutcome::ChallengeCleared);
        }

        if signals::defeated(surface).await {
            let outcome = healing::recover(surface, &self.ctx).await;
            if outcome.is_handled() {
                return Ok(TickOutcome::Recovered);
            }
            tracing::warn!("Healing failed: {:?}", outcome);
            pause(jittered(cfg.heal_failure_pause), state).await;
            return Ok(TickOutcome::RecoveryFailed);
        }

        let travel_url = self.ctx.settings.site.travel_url();
        let location = surface.current_location().await?;
        if !location.starts_with(&travel_url) {
            tracing::debug!("Off the travel page at {}", location);
            movement::navigate_to_travel(surface, &self.ctx).await?;
            return Ok(TickOutcome::Navigated);
        }

        let modes = state.configuration();

        if modes.attack_mode_enabled {
            state.set_activity("Looking for a fight");
            let outcome = combat::process_attack(surface, &self.ctx).await;
            if outcome.is_handled() {
                pause(jittered(cfg.post_action_pause), state).await;
                return Ok(TickOutcome::Acted(ActionKind::Combat));
            }
            tracing::debug!("Combat skipped: {:?}", outcome);
        }

        if modes.gather_mode_enabled {
            state.set_activity("Looking for resources");
            let outcome = gather::process_gather(surface, &self.ctx, &self.gatherer).await;
            if outcome.is_handled() {
                pause(jittered(cfg.post_action_pause), state).await;
                return Ok(TickOutcome::Acted(ActionKind::Gather));
            }
            tracing::debug!("Gathering skipped: {:?}", outcome);
        }

        let outcome = movement::take_step(surface, &self.ctx).await;
        if outcome.is_handled() {
            pause(jittered(cfg.post_step_pause), state).await;
            return Ok(TickOutcome::Acted(ActionKind::Step));
        }

        if self.repeats.should_emit("Nothing to do, backing off") {
            tracing::info!("Nothing to do, backing off");
        }
        state.set_activity("Idle");
        pause(jittered(cfg.idle_backoff), state).await;
        Ok(TickOutcome::Idle)
    }

    async fn handle_error(&mut self, error: BotError) {
        let cfg = &self.ctx.settings.dispatch;
        self.consecutive_errors += 1;
        self.ctx.metrics.record_tick_error();
        tracing::error!(
            "Tick failed ({}/{}): {}",
            self.consecutive_errors,
            cfg.error_budget,
            error
        );

        if self.consecutive_errors >= cfg.error_budget {
            tracing::error!("Too many consecutive errors, rebuilding the browser connection");
            self.ctx.metrics.record_reconnect();
            if let Err(e) = self.surface.reconnect().await {
                tracing::error!("Forced reconnect failed: {}", e);
            }
            self.consecutive_errors = 0;
        }

        pause(jittered(cfg.error_pause), &self.ctx.state).await;
    }
}

impl<S: AutomationSurface> std::fmt::Debug for Dispatcher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("consecutive_errors", &self.consecutive_errors)
            .field("gathering", &self.gatherer.is_gathering())
            .finish_non_exhaustive()
    }
}
