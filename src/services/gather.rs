//! Resource gathering.
//!
//! A session drives one open collection interface: it waits for the collect
//! control, clicks it until the node is spent or the interface closes on its
//! own, and finally makes sure the interface is closed.
//!
//! # Session flow
//!
//! 1. Read the available amount. The collect ceiling is that amount plus a
//!    safety margin, or a fixed fallback when the amount is not shown.
//! 2. Loop while the consecutive-failure budget holds:
//!    - stop at the ceiling, giving the interface a grace period to close;
//!    - wait for the collect control ([`GatherSession::wait_until_ready`]);
//!    - collect once ([`GatherSession::collect_once`]) and react to the status.
//! 3. Watch for the close control, then close the interface
//!    ([`GatherSession::close_interface`]), navigating away as a last resort.
//!
//! Only one session runs at a time; [`Gatherer::begin`] rejects a second one.

use super::signals::{self, CollectButton};
use super::ActionOutcome;
use crate::context::BotContext;
use crate::models::{GatherConfig, secs};
use crate::surface::AutomationSurface;
use crate::timing::{between, pause, pause_secs};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::time::Instant;

/// Name recorded in the action history for every successful collect.
pub const GATHER_ACTION: &str = "Gather";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatherError {
    #[error("a gather session is already in progress")]
    AlreadyGathering,
}

/// Result of a single collect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatherStatus {
    Success,
    /// The character's skill is too low for this node.
    InsufficientLevel,
    /// The node reports nothing left to collect.
    NoMaterials,
    /// The interface offers to close; the node is done.
    Completed,
    Error,
    /// The attempt came too soon after the previous collect.
    Timeout,
}

/// Result of waiting for the collect control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Ready,
    Completed,
    /// The node asks for a higher skill level.
    InsufficientLevel,
    Exhausted,
    Cancelled,
    Timeout(String),
}

/// Why a session stopped collecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatherTermination {
    Completed,
    Exhausted,
    InsufficientLevel,
    Ceiling,
    FailureBudget,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatherReport {
    pub success: bool,
    pub materials_collected: u32,
    pub materials_available: Option<u32>,
    pub interface_closed: bool,
    pub termination: GatherTermination,
}

/// Mutable state of one session.
#[derive(Debug, Clone, Default)]
pub struct GatherState {
    pub materials_available: Option<u32>,
    pub materials_collected: u32,
    pub last_collect: Option<Instant>,
}

/// Grants gather sessions, at most one at a time.
#[derive(Debug, Clone, Default)]
pub struct Gatherer {
    active: Arc<AtomicBool>,
}

impl Gatherer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_gathering(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Start a session on the interface currently open on `surface`.
    ///
    /// Fails instead of waiting while another session is in progress.
    pub fn begin<'a, S: AutomationSurface>(
        &self,
        surface: &'a S,
        ctx: &'a BotContext,
    ) -> Result<GatherSession<'a, S>, GatherError> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| GatherError::AlreadyGathering)?;

        Ok(GatherSession {
            surface,
            ctx,
            state: GatherState::default(),
            report: None,
            _active: ActiveGuard(Arc::clone(&self.active)),
        })
    }
}

/// Releases the session slot when the session is dropped.
#[derive(Debug)]
struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct GatherSession<'a, S: AutomationSurface> {
    surface: &'a S,
    ctx: &'a BotContext,
    state: GatherState,
    report: Option<GatherReport>,
    _active: ActiveGuard,
}

impl<'a, S: AutomationSurface> GatherSession<'a, S> {
    fn config(&self) -> &'a GatherConfig {
        &self.ctx.settings.gather
    }

    pub fn state(&self) -> &GatherState {
        &self.state
    }

    /// Run the session to its end.
    ///
    /// A finished session keeps its report; running it again returns the
    /// same report without touching the page.
    pub async fn run(&mut self) -> GatherReport {
        if let Some(report) = &self.report {
            return report.clone();
        }

        let report = self.execute().await;
        self.ctx.metrics.record_gather(report.materials_collected);
        tracing::info!(
            "Gather session finished: {} collected, termination {:?}, interface closed: {}",
            report.materials_collected,
            report.termination,
            report.interface_closed
        );

        self.report = Some(report.clone());
        report
    }

    async fn execute(&mut self) -> GatherReport {
        let cfg = self.config();
        self.ctx.state.set_activity("Gathering");

        self.state.materials_collected = 0;
        self.state.materials_available = signals::available_amount(self.surface).await;

        let ceiling = match self.state.materials_available {
            Some(available) => {
                tracing::info!("{} materials available", available);
                available + cfg.safety_margin
            }
            None => {
                tracing::warn!(
                    "Available amount not shown, capping the session at {} collects",
                    cfg.fallback_ceiling
                );
                cfg.fallback_ceiling
            }
        };

        let mut failures = 0;
        let mut no_material_rounds = 0;
        let mut termination = GatherTermination::FailureBudget;

        while failures < cfg.max_consecutive_failures {
            if self.ctx.state.should_stop() {
                termination = GatherTermination::Cancelled;
                break;
            }

            if self.state.materials_collected >= ceiling {
                tracing::info!("Reached the collect ceiling of {}", ceiling);
                self.watch_for_close(cfg.ceiling_grace_checks, 1.0).await;
                termination = GatherTermination::Ceiling;
                break;
            }

            match self.wait_until_ready().await {
                WaitOutcome::Ready => {}
                WaitOutcome::Completed => {
                    tracing::info!("Collection interface finished on its own");
                    termination = GatherTermination::Completed;
                    break;
                }
                WaitOutcome::InsufficientLevel => {
                    tracing::warn!("Skill level too low for this node");
                    termination = GatherTermination::InsufficientLevel;
                    break;
                }
                WaitOutcome::Exhausted => {
                    tracing::info!("Node exhausted");
                    termination = GatherTermination::Exhausted;
                    break;
                }
                WaitOutcome::Cancelled => {
                    termination = GatherTermination::Cancelled;
                    break;
                }
                WaitOutcome::Timeout(reason) => {
                    failures += 1;
                    tracing::warn!(
                        "Collect control not ready ({}/{}): {}",
                        failures,
                        cfg.max_consecutive_failures,
                        reason
                    );

                    if failures >= 2 && self.watch_for_close(cfg.failure_close_checks, 1.5).await {
                        termination = GatherTermination::Completed;
                        break;
                    }
                    if failures < cfg.max_consecutive_failures
                        && !pause_secs(cfg.retry_pause_secs, &self.ctx.state).await
                    {
                        termination = GatherTermination::Cancelled;
                        break;
                    }
                    continue;
                }
            }

            match self.collect_once().await {
                GatherStatus::Success => {
                    self.state.materials_collected += 1;
                    failures = 0;
                    no_material_rounds = 0;
                    tracing::info!("Collected ({}/{})", self.state.materials_collected, ceiling);

                    if !pause(between(cfg.post_collect_pause), &self.ctx.state).await {
                        termination = GatherTermination::Cancelled;
                        break;
                    }

                    let every = cfg.periodic_close_check_every.max(1);
                    if self.state.materials_collected % every == 0
                        && signals::close_available(self.surface).await
                    {
                        termination = GatherTermination::Completed;
                        break;
                    }
                }
                GatherStatus::InsufficientLevel => {
                    tracing::warn!("Skill level too low for this node");
                    termination = GatherTermination::InsufficientLevel;
                    break;
                }
                GatherStatus::Completed => {
                    termination = GatherTermination::Completed;
                    break;
                }
                GatherStatus::NoMaterials => {
                    failures += 1;
                    no_material_rounds += 1;
                    tracing::info!(
                        "No materials left ({}/{})",
                        no_material_rounds,
                        cfg.max_no_material_rounds
                    );

                    if self.watch_for_close(cfg.no_material_grace_checks, 1.0).await {
                        termination = GatherTermination::Completed;
                        break;
                    }
                    if no_material_rounds >= cfg.max_no_material_rounds {
                        termination = GatherTermination::Exhausted;
                        break;
                    }
                    if !pause_secs(cfg.failure_pause_secs, &self.ctx.state).await {
                        termination = GatherTermination::Cancelled;
                        break;
                    }
                }
                status @ (GatherStatus::Error | GatherStatus::Timeout) => {
                    failures += 1;
                    tracing::warn!(
                        "Collect failed with {:?} ({}/{})",
                        status,
                        failures,
                        cfg.max_consecutive_failures
                    );
                    if !pause_secs(cfg.failure_pause_secs, &self.ctx.state).await {
                        termination = GatherTermination::Cancelled;
                        break;
                    }
                }
            }
        }

        if termination == GatherTermination::FailureBudget {
            tracing::warn!("Giving up on this node after {} consecutive failures", failures);
        }

        let interface_closed = if termination == GatherTermination::Cancelled {
            false
        } else {
            self.watch_for_close(cfg.final_close_checks, 1.0).await;
            self.close_interface().await
        };

        GatherReport {
            success: self.state.materials_collected > 0,
            materials_collected: self.state.materials_collected,
            materials_available: self.state.materials_available,
            interface_closed,
            termination,
        }
    }

    /// Poll until the collect control is clickable, the interface finishes,
    /// the node turns out to be exhausted or above the character's level, or
    /// the ready timeout passes.
    pub async fn wait_until_ready(&self) -> WaitOutcome {
        let cfg = self.config();
        let deadline = Instant::now() + secs(cfg.ready_timeout_secs);
        let mut polls = 0;
        let mut last_seen = CollectButton::Missing;

        while Instant::now() < deadline {
            if self.ctx.state.should_stop() {
                return WaitOutcome::Cancelled;
            }
            polls += 1;

            if signals::insufficient_level(self.surface).await {
                return WaitOutcome::InsufficientLevel;
            }

            last_seen = signals::collect_button(self.surface).await;
            if last_seen == CollectButton::Ready {
                return WaitOutcome::Ready;
            }

            if signals::close_available(self.surface).await {
                return WaitOutcome::Completed;
            }

            if last_seen == CollectButton::Missing {
                if !pause_secs(1.0, &self.ctx.state).await {
                    return WaitOutcome::Cancelled;
                }
                continue;
            }

            if polls > cfg.exhaustion_check_after
                && signals::available_amount(self.surface).await == Some(0)
            {
                tracing::debug!("Node shows zero materials, waiting for the interface to close");
                for _ in 0..cfg.exhausted_grace_checks {
                    if !pause_secs(1.0, &self.ctx.state).await {
                        return WaitOutcome::Cancelled;
                    }
                    if signals::close_available(self.surface).await {
                        return WaitOutcome::Exhausted;
                    }
                }
            }

            if !pause_secs(cfg.check_interval_secs, &self.ctx.state).await {
                return WaitOutcome::Cancelled;
            }
        }

        WaitOutcome::Timeout(format!(
            "collect control still {:?} after {}s",
            last_seen, cfg.ready_timeout_secs
        ))
    }

    /// Click the collect control once and let the page settle.
    pub async fn collect_once(&mut self) -> GatherStatus {
        let cfg = self.config();

        if let Some(last) = self.state.last_collect {
            if last.elapsed() < secs(cfg.cooldown_secs) {
                return GatherStatus::Timeout;
            }
        }

        if signals::insufficient_level(self.surface).await {
            return GatherStatus::InsufficientLevel;
        }

        let Some(button) = self
            .surface
            .find_visible_clickable(&signals::COLLECT_BUTTON)
            .await
        else {
            if signals::close_available(self.surface).await {
                return GatherStatus::Completed;
            }
            if signals::available_amount(self.surface).await == Some(0) {
                return GatherStatus::NoMaterials;
            }
            return GatherStatus::Error;
        };

        if !self.surface.click(&button).await {
            return GatherStatus::Error;
        }

        self.state.last_collect = Some(Instant::now());
        self.ctx.state.record_action(GATHER_ACTION);
        pause(between(cfg.settle), &self.ctx.state).await;
        GatherStatus::Success
    }

    /// Check up to `checks` times, `interval` seconds apart, whether the
    /// close control appeared.
    async fn watch_for_close(&self, checks: u32, interval: f64) -> bool {
        for _ in 0..checks {
            if signals::close_available(self.surface).await {
                return true;
            }
            if !pause_secs(interval, &self.ctx.state).await {
                return false;
            }
        }
        false
    }

    /// Close the collection interface.
    ///
    /// Clicks the close control and confirms the page left the gather
    /// area, retrying a few times; falls back to navigating to the travel
    /// page. Returns whether the interface ended up closed.
    pub async fn close_interface(&self) -> bool {
        let cfg = self.config();
        let site = &self.ctx.settings.site;
        let gather_prefix = site.gather_prefix();

        for attempt in 1..=cfg.close_attempts {
            match self.surface.find_visible_clickable(&signals::CLOSE_BUTTON).await {
                Some(button) if self.surface.click(&button).await => {
                    pause_secs(cfg.close_settle_secs, &self.ctx.state).await;
                    if !self.surface.location_starts_with(&gather_prefix).await {
                        tracing::info!("Collection interface closed");
                        return true;
                    }
                    tracing::debug!("Still on the gather page after close attempt {}", attempt);
                    pause_secs(1.0, &self.ctx.state).await;
                    continue;
                }
                Some(_) => tracing::debug!("Close click failed on attempt {}", attempt),
                None => tracing::debug!("Close control not clickable on attempt {}", attempt),
            }

            if attempt < cfg.close_attempts {
                pause_secs(cfg.close_retry_pause_secs, &self.ctx.state).await;
            }
        }

        tracing::warn!("Could not close the collection interface, leaving through the travel page");
        match self.surface.navigate(&site.travel_url()).await {
            Ok(()) => {
                pause_secs(self.ctx.settings.dispatch.navigate_settle_secs, &self.ctx.state).await;
                true
            }
            Err(e) => {
                tracing::error!("Failed to leave the collection interface: {}", e);
                false
            }
        }
    }
}

/// Gather step of the dispatch loop.
///
/// Resumes an interface that is already open, otherwise opens the first
/// available gather entry on the travel page and runs a session on it.
pub async fn process_gather<S: AutomationSurface>(
    surface: &S,
    ctx: &BotContext,
    gatherer: &Gatherer,
) -> ActionOutcome {
    let gather_prefix = ctx.settings.site.gather_prefix();

    if surface.location_starts_with(&gather_prefix).await {
        tracing::info!("Resuming an open collection interface");
        return run_session(surface, ctx, gatherer, true).await;
    }

    for label in signals::GATHER_ENTRIES {
        let Some(entry) = signals::find_labelled(surface, label).await else {
            continue;
        };

        tracing::info!("Opening gather entry '{}'", label);
        if !surface.click(&entry).await {
            return ActionOutcome::Retryable(format!("click on '{label}' failed"));
        }

        if !wait_for_location(surface, ctx, &gather_prefix).await {
            return ActionOutcome::Retryable(format!("'{label}' did not open a collection interface"));
        }
        pause_secs(ctx.settings.gather.entry_settle_secs, &ctx.state).await;

        if signals::insufficient_level(surface).await {
            tracing::warn!("Skill level too low for '{}', closing the interface", label);
            let closed = match gatherer.begin(surface, ctx) {
                Ok(session) => session.close_interface().await,
                Err(e) => return ActionOutcome::Retryable(e.to_string()),
            };
            return ActionOutcome::Terminal(format!(
                "skill level too low for '{label}' (interface closed: {closed})"
            ));
        }

        return run_session(surface, ctx, gatherer, false).await;
    }

    ActionOutcome::Retryable("no gather entry on the page".to_string())
}

/// Run a session on the open interface.
///
/// A resumed session that collected nothing leaves the tick to the next
/// action; a freshly entered node counts as handled either way.
async fn run_session<S: AutomationSurface>(
    surface: &S,
    ctx: &BotContext,
    gatherer: &Gatherer,
    resumed: bool,
) -> ActionOutcome {
    let mut session = match gatherer.begin(surface, ctx) {
        Ok(session) => session,
        Err(e) => return ActionOutcome::Retryable(e.to_string()),
    };

    let report = session.run().await;
    match report.termination {
        GatherTermination::InsufficientLevel => {
            ActionOutcome::Terminal("skill level too low for this node".to_string())
        }
        GatherTermination::Cancelled => ActionOutcome::Retryable("stopped".to_string()),
        termination if resumed && !report.success => ActionOutcome::Retryable(format!(
            "resumed session collected nothing ({termination:?})"
        )),
        _ => ActionOutcome::Succeeded,
    }
}

/// Poll the page URL until it starts with `prefix` or the entry timeout passes.
async fn wait_for_location<S: AutomationSurface>(surface: &S, ctx: &BotContext, prefix: &str) -> bool {
    let cfg = &ctx.settings.gather;
    let deadline = Instant::now() + secs(cfg.entry_timeout_secs);

    loop {
        if surface.location_starts_with(prefix).await {
            return true;
        }
        if Instant::now() >= deadline || !pause_secs(cfg.entry_poll_secs, &ctx.state).await {
            return false;
        }
    }
}
