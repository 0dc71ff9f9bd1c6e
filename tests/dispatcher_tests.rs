//! Integration tests for the dispatch loop
//!
//! These tests verify that a tick:
//! - Honors the priority order and stops at the first action that acts
//! - Waits out low energy and challenges before doing anything else
//! - Rebuilds the connection after a lost surface or a run of errors
//! - Stops when termination is requested

mod common;

use common::{FakeNode, FakeSurface, attack_url, context, gather_url, shared, travel_url};
use mmo_pilot::dispatcher::{ActionKind, Dispatcher, TickOutcome};
use mmo_pilot::models::BotFlag;
use mmo_pilot::services::gather::GATHER_ACTION;
use mmo_pilot::services::movement::STEP_ACTION;
use mmo_pilot::services::signals;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_successful_combat_skips_gather_and_movement() {
    let surface = shared(FakeSurface::at(&travel_url()));
    surface.show(&signals::ATTACK_ENTRY);
    surface.show(&signals::button_with_text("Chop"));
    surface.show(&signals::STEP_BUTTON);

    let attack = attack_url();
    surface.on_click(&signals::ATTACK_ENTRY, move |page| {
        page.location = attack.clone();
        page.show(&signals::LEAVE_BUTTON);
        true
    });
    let travel = travel_url();
    surface.on_click(&signals::LEAVE_BUTTON, move |page| {
        page.location = travel.clone();
        page.remove(&signals::LEAVE_BUTTON);
        true
    });

    let mut dispatcher = Dispatcher::new(Arc::clone(&surface), context());
    let outcome = dispatcher.tick().await;

    assert_eq!(outcome, TickOutcome::Acted(ActionKind::Combat));
    assert!(!surface.queried(&signals::button_with_text("Chop")));
    assert!(!surface.queried(&signals::COLLECT_BUTTON));
    assert!(!surface.queried(&signals::STEP_BUTTON));
    assert!(!surface.queried(&signals::STEP_LINK));
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_combat_falls_through_to_gathering() {
    let surface = shared(FakeSurface::at(&travel_url()));
    surface.show(&signals::ATTACK_ENTRY);
    let chop = signals::button_with_text("Chop");
    surface.show(&chop);

    // A combat without attack or leave controls ends with a forced exit
    let attack = attack_url();
    surface.on_click(&signals::ATTACK_ENTRY, move |page| {
        page.location = attack.clone();
        true
    });

    let gather = gather_url();
    surface.on_click(&chop, move |page| {
        page.location = gather.clone();
        page.show(&signals::COLLECT_BUTTON);
        true
    });
    surface.on_click(&signals::COLLECT_BUTTON, |page| {
        page.remove(&signals::COLLECT_BUTTON);
        page.show(&signals::CLOSE_BUTTON);
        true
    });
    let travel = travel_url();
    surface.on_click(&signals::CLOSE_BUTTON, move |page| {
        page.remove(&signals::CLOSE_BUTTON);
        page.location = travel.clone();
        true
    });

    let ctx = context();
    let mut dispatcher = Dispatcher::new(Arc::clone(&surface), ctx.clone());

    assert_eq!(dispatcher.tick().await, TickOutcome::Acted(ActionKind::Gather));
    assert_eq!(surface.navigations(), vec![travel_url()]);
    assert_eq!(surface.clicks_on(&chop), 1);
    assert_eq!(ctx.metrics.combats.load(Ordering::Relaxed), 1);
    assert_eq!(ctx.state.action_count(GATHER_ACTION), 1);
}

#[tokio::test(start_paused = true)]
async fn test_step_when_both_modes_are_off() {
    let surface = shared(FakeSurface::at(&travel_url()));
    surface.show(&signals::ATTACK_ENTRY);
    surface.show(&signals::STEP_BUTTON);

    let ctx = context();
    ctx.state.set_flag(BotFlag::AttackMode, false);
    ctx.state.set_flag(BotFlag::GatherMode, false);

    let mut dispatcher = Dispatcher::new(Arc::clone(&surface), ctx.clone());
    let outcome = dispatcher.tick().await;

    assert_eq!(outcome, TickOutcome::Acted(ActionKind::Step));
    assert!(!surface.queried(&signals::ATTACK_ENTRY));
    assert_eq!(ctx.state.action_count(STEP_ACTION), 1);
    assert_eq!(ctx.metrics.steps.load(Ordering::Relaxed), 1);
}

#[tokio::test(start_paused = true)]
async fn test_step_link_is_the_fallback() {
    let surface = shared(FakeSurface::at(&travel_url()));
    surface.show(&signals::STEP_LINK);

    let ctx = context();
    ctx.state.set_flag(BotFlag::AttackMode, false);
    ctx.state.set_flag(BotFlag::GatherMode, false);

    let mut dispatcher = Dispatcher::new(Arc::clone(&surface), ctx);
    assert_eq!(dispatcher.tick().await, TickOutcome::Acted(ActionKind::Step));
    assert_eq!(surface.clicks_on(&signals::STEP_LINK), 1);
}

#[tokio::test(start_paused = true)]
async fn test_idle_when_nothing_is_available() {
    let surface = shared(FakeSurface::at(&travel_url()));
    let mut dispatcher = Dispatcher::new(Arc::clone(&surface), context());

    assert_eq!(dispatcher.tick().await, TickOutcome::Idle);
    assert_eq!(surface.total_clicks(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_low_energy_waits_before_anything_else() {
    let surface = shared(FakeSurface::at(&travel_url()));
    surface.put(&signals::ENERGY, FakeNode::text("5"));
    surface.show(&signals::ATTACK_ENTRY);

    let mut dispatcher = Dispatcher::new(Arc::clone(&surface), context());

    assert_eq!(dispatcher.tick().await, TickOutcome::LowEnergy(5));
    assert!(!surface.queried(&signals::CHALLENGE));
    assert!(!surface.queried(&signals::ATTACK_ENTRY));
}

#[tokio::test(start_paused = true)]
async fn test_energy_above_floor_does_not_wait() {
    let surface = shared(FakeSurface::at(&travel_url()));
    surface.put(&signals::ENERGY, FakeNode::text("11"));

    let mut dispatcher = Dispatcher::new(Arc::clone(&surface), context());
    assert_eq!(dispatcher.tick().await, TickOutcome::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_challenge_blocks_until_cleared() {
    let surface = shared(FakeSurface::at(&travel_url()));
    surface.show(&signals::CHALLENGE);
    surface.show(&signals::ATTACK_ENTRY);

    let solver = Arc::clone(&surface);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(30)).await;
        solver.edit(|page| page.remove(&signals::CHALLENGE));
    });

    let ctx = context();
    let mut dispatcher = Dispatcher::new(Arc::clone(&surface), ctx.clone());

    assert_eq!(dispatcher.tick().await, TickOutcome::ChallengeCleared);
    assert_eq!(ctx.metrics.challenges.load(Ordering::Relaxed), 1);
    // The challenge is never answered by the bot
    assert_eq!(surface.total_clicks(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_defeat_triggers_healing() {
    let surface = shared(FakeSurface::at(&travel_url()));
    surface.show(&signals::DEFEATED);
    surface.show(&signals::HEAL_BUTTON);
    surface.on_click(&signals::HEAL_BUTTON, |page| {
        page.remove(&signals::DEFEATED);
        true
    });

    let ctx = context();
    let mut dispatcher = Dispatcher::new(Arc::clone(&surface), ctx.clone());

    assert_eq!(dispatcher.tick().await, TickOutcome::Recovered);
    assert_eq!(
        surface.navigations(),
        vec![ctx.settings.site.healer_url(), travel_url()]
    );
    assert_eq!(ctx.metrics.heals.load(Ordering::Relaxed), 1);
}

#[tokio::test(start_paused = true)]
async fn test_off_travel_page_navigates_back() {
    let surface = shared(FakeSurface::at("https://web.simple-mmo.com/inventory"));
    surface.show(&signals::ATTACK_ENTRY);

    let mut dispatcher = Dispatcher::new(Arc::clone(&surface), context());

    assert_eq!(dispatcher.tick().await, TickOutcome::Navigated);
    assert_eq!(surface.location(), travel_url());
    assert_eq!(surface.total_clicks(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_lost_surface_is_rebuilt() {
    let surface = shared(FakeSurface::at(&travel_url()));
    surface.set_valid(false);

    let ctx = context();
    let mut dispatcher = Dispatcher::new(Arc::clone(&surface), ctx.clone());

    assert_eq!(dispatcher.tick().await, TickOutcome::Reconnected);
    assert_eq!(surface.reconnects(), 1);
    assert_eq!(ctx.metrics.reconnects.load(Ordering::Relaxed), 1);
}

#[tokio::test(start_paused = true)]
async fn test_error_budget_forces_one_reconnect() {
    let surface = shared(FakeSurface::at(&travel_url()));
    let ctx = context();
    let budget = ctx.settings.dispatch.error_budget;
    surface.fail_locations(budget as usize);

    let mut dispatcher = Dispatcher::new(Arc::clone(&surface), ctx);

    for expected in 1..budget {
        assert!(matches!(dispatcher.tick().await, TickOutcome::Failed(_)));
        assert_eq!(dispatcher.consecutive_errors(), expected);
    }
    assert_eq!(surface.reconnects(), 0);

    assert!(matches!(dispatcher.tick().await, TickOutcome::Failed(_)));
    assert_eq!(surface.reconnects(), 1);
    assert_eq!(dispatcher.consecutive_errors(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_errors_below_budget_do_not_reconnect() {
    let surface = shared(FakeSurface::at(&travel_url()));
    let ctx = context();
    let below = ctx.settings.dispatch.error_budget - 1;
    surface.fail_locations(below as usize);

    let mut dispatcher = Dispatcher::new(Arc::clone(&surface), ctx.clone());

    for _ in 0..below {
        dispatcher.tick().await;
    }
    assert_eq!(dispatcher.consecutive_errors(), below);
    assert_eq!(surface.reconnects(), 0);

    // A clean tick resets the count
    assert_eq!(dispatcher.tick().await, TickOutcome::Idle);
    assert_eq!(dispatcher.consecutive_errors(), 0);
    assert_eq!(ctx.metrics.tick_errors.load(Ordering::Relaxed), u64::from(below));
}

#[tokio::test(start_paused = true)]
async fn test_terminate_flag_ends_tick_immediately() {
    let surface = shared(FakeSurface::at(&travel_url()));
    surface.show(&signals::STEP_BUTTON);

    let ctx = context();
    ctx.state.request_stop();
    let mut dispatcher = Dispatcher::new(Arc::clone(&surface), ctx);

    assert_eq!(dispatcher.tick().await, TickOutcome::Terminated);
    assert_eq!(surface.total_clicks(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_run_stops_on_request() {
    let surface = shared(FakeSurface::at(&travel_url()));
    let ctx = context();

    let stopper = ctx.state.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(60)).await;
        stopper.request_stop();
    });

    let mut dispatcher = Dispatcher::new(Arc::clone(&surface), ctx.clone());
    dispatcher.run().await;

    assert!(!ctx.state.is_running());
    assert!(ctx.metrics.ticks.load(Ordering::Relaxed) > 0);
}
