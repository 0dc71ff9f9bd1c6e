//! Travel: stepping forward and returning to the travel page.

use super::ActionOutcome;
use super::signals;
use crate::context::BotContext;
use crate::surface::{AutomationSurface, SurfaceError};
use crate::timing::{between, pause, pause_secs};

pub const STEP_ACTION: &str = "Step";
pub const TRAVEL_ACTION: &str = "Travel";

/// Take one step, preferring the step button over the step link.
pub async fn take_step<S: AutomationSurface>(surface: &S, ctx: &BotContext) -> ActionOutcome {
    let control = match surface.find_visible_clickable(&signals::STEP_BUTTON).await {
        Some(control) => control,
        None => match surface.find_visible_clickable(&signals::STEP_LINK).await {
            Some(control) => control,
            None => return ActionOutcome::Retryable("no step control on the page".to_string()),
        },
    };

    if !pause(between(ctx.settings.dispatch.step_delay), &ctx.state).await {
        return ActionOutcome::Retryable("stopped".to_string());
    }

    if !surface.click(&control).await {
        return ActionOutcome::Retryable("step click failed".to_string());
    }

    ctx.state.set_activity("Travelling");
    ctx.state.record_action(STEP_ACTION);
    ctx.metrics.record_step();
    ActionOutcome::Succeeded
}

/// Navigate to the travel page and let it settle.
pub async fn navigate_to_travel<S: AutomationSurface>(surface: &S, ctx: &BotContext) -> Result<(), SurfaceError> {
    let url = ctx.settings.site.travel_url();
    tracing::info!("Returning to {}", url);

    surface.navigate(&url).await?;
    ctx.state.record_action(TRAVEL_ACTION);
    pause_secs(ctx.settings.dispatch.navigate_settle_secs, &ctx.state).await;
    Ok(())
}
