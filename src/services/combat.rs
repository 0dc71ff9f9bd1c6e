//! Combat against a monster.
//!
//! The attack loop is bounded by an attack ceiling and a budget of
//! consecutive waits without an attack control. Leaving the combat page or
//! a visible "Leave" control ends the fight as a victory.

use super::ActionOutcome;
use super::challenge;
use super::signals;
use crate::context::BotContext;
use crate::models::secs;
use crate::surface::AutomationSurface;
use crate::timing::{between, pause, pause_secs};
use tokio::time::Instant;

pub const ATTACK_ACTION: &str = "Attack";

/// How a combat ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombatExit {
    /// The fight ended through the game's own flow.
    Victory,
    /// The bot left by navigating back to the travel page.
    Forced,
    /// Neither the leave control nor the fallback navigation worked.
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombatReport {
    pub attacks: u32,
    pub exit: CombatExit,
}

impl CombatReport {
    pub fn victory(&self) -> bool {
        self.exit == CombatExit::Victory
    }
}

/// Fight the combat currently open on `surface`.
pub async fn fight<S: AutomationSurface>(surface: &S, ctx: &BotContext) -> CombatReport {
    let cfg = &ctx.settings.combat;
    let attack_prefix = ctx.settings.site.attack_prefix();
    let mut attacks = 0;
    let mut timeouts = 0;

    ctx.state.set_activity("Fighting");

    while attacks < cfg.max_attacks && timeouts < cfg.max_consecutive_timeouts {
        if ctx.state.should_stop() {
            return CombatReport {
                attacks,
                exit: CombatExit::Cancelled,
            };
        }

        if signals::combat_challenge_present(surface).await {
            if !challenge::wait_for_clear(surface, ctx, &signals::COMBAT_CHALLENGE).await {
                return CombatReport {
                    attacks,
                    exit: CombatExit::Cancelled,
                };
            }
            continue;
        }

        if !surface.location_starts_with(&attack_prefix).await {
            tracing::info!("Combat page closed after {} attacks", attacks);
            return CombatReport {
                attacks,
                exit: CombatExit::Victory,
            };
        }

        if let Some(leave) = surface.find_visible_clickable(&signals::LEAVE_BUTTON).await {
            if surface.click(&leave).await {
                tracing::info!("Combat won after {} attacks", attacks);
                pause_secs(cfg.leave_settle_secs, &ctx.state).await;
                return CombatReport {
                    attacks,
                    exit: CombatExit::Victory,
                };
            }
        }

        let button = surface
            .wait_for_clickable(&signals::ATTACK_BUTTON, secs(cfg.attack_wait_secs))
            .await;

        match button {
            Some(button) if surface.click(&button).await => {
                timeouts = 0;
                attacks += 1;
                ctx.state.record_action(ATTACK_ACTION);
                tracing::debug!("Attack {}/{}", attacks, cfg.max_attacks);
                pause(between(cfg.pacing), &ctx.state).await;
            }
            _ => {
                timeouts += 1;
                tracing::debug!(
                    "No attack control ({}/{})",
                    timeouts,
                    cfg.max_consecutive_timeouts
                );
                if !surface.location_starts_with(&attack_prefix).await {
                    return CombatReport {
                        attacks,
                        exit: CombatExit::Victory,
                    };
                }
                pause_secs(cfg.timeout_pause_secs, &ctx.state).await;
            }
        }
    }

    tracing::info!("Attack loop ended after {} attacks, leaving the combat", attacks);
    CombatReport {
        attacks,
        exit: leave_combat(surface, ctx).await,
    }
}

/// Leave through the game's control, or navigate to the travel page.
async fn leave_combat<S: AutomationSurface>(surface: &S, ctx: &BotContext) -> CombatExit {
    let cfg = &ctx.settings.combat;

    if let Some(leave) = surface
        .wait_for_clickable(&signals::LEAVE_BUTTON, secs(cfg.exit_wait_secs))
        .await
    {
        if surface.click(&leave).await {
            pause_secs(cfg.exit_settle_secs, &ctx.state).await;
            return CombatExit::Victory;
        }
    }

    tracing::warn!("No way out of the combat, returning to the travel page");
    match surface.navigate(&ctx.settings.site.travel_url()).await {
        Ok(()) => {
            pause_secs(ctx.settings.dispatch.navigate_settle_secs, &ctx.state).await;
            CombatExit::Forced
        }
        Err(e) => {
            tracing::error!("Failed to leave the combat: {}", e);
            CombatExit::Failed
        }
    }
}

/// Combat step of the dispatch loop: open an attack entry and fight.
pub async fn process_attack<S: AutomationSurface>(surface: &S, ctx: &BotContext) -> ActionOutcome {
    let cfg = &ctx.settings.combat;

    let Some(entry) = surface.find_visible_clickable(&signals::ATTACK_ENTRY).await else {
        return ActionOutcome::Retryable("no attack entry on the page".to_string());
    };

    tracing::info!("Starting a combat");
    if !surface.click(&entry).await {
        return ActionOutcome::Retryable("click on the attack entry failed".to_string());
    }

    let attack_prefix = ctx.settings.site.attack_prefix();
    let deadline = Instant::now() + secs(cfg.entry_timeout_secs);
    while !surface.location_starts_with(&attack_prefix).await {
        if Instant::now() >= deadline {
            return ActionOutcome::Retryable("combat page did not load".to_string());
        }
        if !pause_secs(cfg.entry_poll_secs, &ctx.state).await {
            return ActionOutcome::Retryable("stopped".to_string());
        }
    }

    let report = fight(surface, ctx).await;
    ctx.metrics.record_combat(report.attacks);

    match report.exit {
        CombatExit::Victory => ActionOutcome::Succeeded,
        // Back on the travel page, so the next action can still run
        CombatExit::Forced => ActionOutcome::Retryable(format!(
            "combat abandoned after {} attacks",
            report.attacks
        )),
        exit @ (CombatExit::Failed | CombatExit::Cancelled) => ActionOutcome::Terminal(format!(
            "combat ended {exit:?} after {} attacks",
            report.attacks
        )),
    }
}
