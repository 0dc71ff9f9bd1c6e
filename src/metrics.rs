// Runtime counters
//
// Lightweight counters for what the bot did during a run, logged on shutdown

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counters collected by the dispatcher and its components.
///
/// Uses atomic operations so the dispatcher, the monitor and the console
/// controller can read and write without locks.
#[derive(Debug)]
pub struct BotMetrics {
    /// Dispatcher ticks started
    pub ticks: AtomicU64,

    /// Ticks that ended in an unhandled error
    pub tick_errors: AtomicU64,

    /// Surface rebuilds, forced or after a lost connection
    pub reconnects: AtomicU64,

    /// Verification challenges waited out
    pub challenges: AtomicU64,

    /// Combats entered
    pub combats: AtomicU64,

    /// Attack clicks across all combats
    pub attacks: AtomicU64,

    /// Gather sessions run
    pub gather_sessions: AtomicU64,

    /// Materials counted across all gather sessions
    pub materials: AtomicU64,

    /// Movement steps taken
    pub steps: AtomicU64,

    /// Successful heals
    pub heals: AtomicU64,

    start_time: Instant,
}

impl BotMetrics {
    pub fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            tick_errors: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            challenges: AtomicU64::new(0),
            combats: AtomicU64::new(0),
            attacks: AtomicU64::new(0),
            gather_sessions: AtomicU64::new(0),
            materials: AtomicU64::new(0),
            steps: AtomicU64::new(0),
            heals: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tick_error(&self) {
        self.tick_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_challenge(&self) {
        self.challenges.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_combat(&self, attacks: u32) {
        self.combats.fetch_add(1, Ordering::Relaxed);
        self.attacks.fetch_add(u64::from(attacks), Ordering::Relaxed);
    }

    pub fn record_gather(&self, materials: u32) {
        self.gather_sessions.fetch_add(1, Ordering::Relaxed);
        self.materials.fetch_add(u64::from(materials), Ordering::Relaxed);
    }

    pub fn record_step(&self) {
        self.steps.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_heal(&self) {
        self.heals.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// One-line summary for the console `stats` command
    pub fn summary_line(&self) -> String {
        format!(
            "uptime {:.0}s, ticks {}, steps {}, combats {} ({} attacks), gathers {} ({} materials), heals {}, errors {}, reconnects {}, challenges {}",
            self.uptime().as_secs_f64(),
            self.ticks.load(Ordering::Relaxed),
            self.steps.load(Ordering::Relaxed),
            self.combats.load(Ordering::Relaxed),
            self.attacks.load(Ordering::Relaxed),
            self.gather_sessions.load(Ordering::Relaxed),
            self.materials.load(Ordering::Relaxed),
            self.heals.load(Ordering::Relaxed),
            self.tick_errors.load(Ordering::Relaxed),
            self.reconnects.load(Ordering::Relaxed),
            self.challenges.load(Ordering::Relaxed)
        )
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Run Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Ticks: {}, errors: {}, reconnects: {}, challenges: {}",
            self.ticks.load(Ordering::Relaxed),
            self.tick_errors.load(Ordering::Relaxed),
            self.reconnects.load(Ordering::Relaxed),
            self.challenges.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Steps: {}, combats: {} ({} attacks), gathers: {} ({} materials), heals: {}",
            self.steps.load(Ordering::Relaxed),
            self.combats.load(Ordering::Relaxed),
            self.attacks.load(Ordering::Relaxed),
            self.gather_sessions.load(Ordering::Relaxed),
            self.materials.load(Ordering::Relaxed),
            self.heals.load(Ordering::Relaxed)
        );
    }
}

impl Default for BotMetrics {
    fn default() -> Self {
        Self::new()
    }
}
