//! Recovery after the character was defeated.

use super::ActionOutcome;
use super::signals;
use crate::context::BotContext;
use crate::models::secs;
use crate::surface::AutomationSurface;
use crate::timing::pause_secs;

pub const HEAL_ACTION: &str = "Heal";

/// Visit the healer, heal, and return to the travel page.
pub async fn recover<S: AutomationSurface>(surface: &S, ctx: &BotContext) -> ActionOutcome {
    let cfg = &ctx.settings.dispatch;
    let site = &ctx.settings.site;

    tracing::error!("Character defeated, visiting the healer");
    ctx.state.set_activity("Healing");
    ctx.notifier.notify(
        "Character defeated",
        "Your character was defeated. The bot is trying to heal automatically.",
    );

    if let Err(e) = surface.navigate(&site.healer_url()).await {
        return ActionOutcome::Retryable(format!("healer page unreachable: {e}"));
    }
    pause_secs(cfg.heal_settle_secs, &ctx.state).await;

    let Some(button) = surface
        .wait_for_clickable(&signals::HEAL_BUTTON, secs(cfg.heal_wait_secs))
        .await
    else {
        return ActionOutcome::Retryable("heal control did not appear".to_string());
    };

    if !surface.click(&button).await {
        return ActionOutcome::Retryable("heal click failed".to_string());
    }
    ctx.state.record_action(HEAL_ACTION);
    ctx.metrics.record_heal();
    tracing::info!("Character healed");
    pause_secs(cfg.heal_settle_secs, &ctx.state).await;

    if let Err(e) = surface.navigate(&site.travel_url()).await {
        return ActionOutcome::Retryable(format!("travel page unreachable after healing: {e}"));
    }
    pause_secs(cfg.heal_settle_secs, &ctx.state).await;

    ActionOutcome::Succeeded
}
