//! Anti-bot verification.
//!
//! Challenges are never answered automatically: the user is alerted and the
//! bot holds until the challenge is gone.

use crate::context::BotContext;
use crate::surface::{AutomationSurface, Selector};
use crate::timing::pause_secs;

/// Alert the user and block until `selector` is no longer visible.
///
/// Returns `false` when the bot was stopped while waiting.
pub async fn wait_for_clear<S: AutomationSurface>(surface: &S, ctx: &BotContext, selector: &Selector) -> bool {
    ctx.metrics.record_challenge();
    ctx.state.set_activity("Waiting for verification");
    ctx.notifier.notify(
        "Verification required",
        "The game is asking for a human check. Solve it in the browser; the bot resumes afterwards.",
    );

    let poll = ctx.settings.dispatch.challenge_poll_secs;
    loop {
        if !surface.is_visible(selector).await {
            tracing::info!("Verification cleared, resuming");
            return true;
        }
        if !pause_secs(poll, &ctx.state).await {
            return false;
        }
    }
}
