//! Integration tests for combat
//!
//! These tests verify that the attack loop:
//! - Stops at the attack ceiling and forces its way out
//! - Treats the leave control or leaving the combat page as a victory
//! - Gives up after consecutive waits without an attack control

mod common;

use common::{FakeSurface, attack_url, context, travel_url};
use mmo_pilot::services::combat::{self, ATTACK_ACTION, CombatExit};
use mmo_pilot::services::{ActionOutcome, signals};
use std::sync::atomic::Ordering;

#[tokio::test(start_paused = true)]
async fn test_attack_ceiling_forces_exit() {
    let surface = FakeSurface::at(&attack_url());
    surface.show(&signals::ATTACK_BUTTON);
    let ctx = context();

    let report = combat::fight(&surface, &ctx).await;

    assert_eq!(report.attacks, ctx.settings.combat.max_attacks);
    assert_eq!(report.exit, CombatExit::Forced);
    assert_eq!(surface.clicks_on(&signals::ATTACK_BUTTON), 100);
    assert_eq!(surface.navigations(), vec![travel_url()]);
    assert_eq!(ctx.state.action_count(ATTACK_ACTION), 100);
}

#[tokio::test(start_paused = true)]
async fn test_leave_control_ends_combat_as_victory() {
    let surface = FakeSurface::at(&attack_url());
    surface.show(&signals::ATTACK_BUTTON);

    let mut attacks = 0;
    surface.on_click(&signals::ATTACK_BUTTON, move |page| {
        attacks += 1;
        if attacks == 3 {
            page.remove(&signals::ATTACK_BUTTON);
            page.show(&signals::LEAVE_BUTTON);
        }
        true
    });

    let ctx = context();
    let report = combat::fight(&surface, &ctx).await;

    assert!(report.victory());
    assert_eq!(report.attacks, 3);
    assert_eq!(surface.clicks_on(&signals::LEAVE_BUTTON), 1);
    assert!(surface.navigations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_leaving_the_combat_page_is_a_victory() {
    let surface = FakeSurface::at(&attack_url());
    surface.show(&signals::ATTACK_BUTTON);

    let travel = travel_url();
    let mut attacks = 0;
    surface.on_click(&signals::ATTACK_BUTTON, move |page| {
        attacks += 1;
        if attacks == 2 {
            page.location = travel.clone();
        }
        true
    });

    let ctx = context();
    let report = combat::fight(&surface, &ctx).await;

    assert_eq!(report.exit, CombatExit::Victory);
    assert_eq!(report.attacks, 2);
}

#[tokio::test(start_paused = true)]
async fn test_missing_attack_control_exhausts_timeout_budget() {
    let surface = FakeSurface::at(&attack_url());
    let ctx = context();

    let report = combat::fight(&surface, &ctx).await;

    assert_eq!(report.attacks, 0);
    assert_eq!(report.exit, CombatExit::Forced);
    assert_eq!(surface.location(), travel_url());
}

#[tokio::test(start_paused = true)]
async fn test_process_attack_enters_and_fights() {
    let surface = FakeSurface::at(&travel_url());
    surface.show(&signals::ATTACK_ENTRY);

    let attack = attack_url();
    surface.on_click(&signals::ATTACK_ENTRY, move |page| {
        page.location = attack.clone();
        page.remove(&signals::ATTACK_ENTRY);
        page.show(&signals::LEAVE_BUTTON);
        true
    });

    let ctx = context();
    let outcome = combat::process_attack(&surface, &ctx).await;

    assert_eq!(outcome, ActionOutcome::Succeeded);
    assert_eq!(ctx.metrics.combats.load(Ordering::Relaxed), 1);
}

#[tokio::test(start_paused = true)]
async fn test_process_attack_without_entry_is_retryable() {
    let surface = FakeSurface::at(&travel_url());
    let ctx = context();

    let outcome = combat::process_attack(&surface, &ctx).await;

    assert!(matches!(outcome, ActionOutcome::Retryable(_)));
    assert_eq!(surface.total_clicks(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_entry_that_never_loads_is_retryable() {
    let surface = FakeSurface::at(&travel_url());
    surface.show(&signals::ATTACK_ENTRY);
    let ctx = context();

    let outcome = combat::process_attack(&surface, &ctx).await;

    assert!(matches!(outcome, ActionOutcome::Retryable(_)));
    assert_eq!(ctx.metrics.combats.load(Ordering::Relaxed), 0);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_combat_leaves_tick_open() {
    let surface = FakeSurface::at(&travel_url());
    surface.show(&signals::ATTACK_ENTRY);

    // The combat page never offers an attack or leave control
    let attack = attack_url();
    surface.on_click(&signals::ATTACK_ENTRY, move |page| {
        page.location = attack.clone();
        true
    });

    let ctx = context();
    let outcome = combat::process_attack(&surface, &ctx).await;

    assert!(matches!(outcome, ActionOutcome::Retryable(_)));
    assert_eq!(surface.location(), travel_url());
    assert_eq!(ctx.metrics.combats.load(Ordering::Relaxed), 1);
}
