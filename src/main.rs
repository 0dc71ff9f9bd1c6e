//! mmo-pilot - Browser automation bot for a browser-based MMO
//!
//! Main entry point for the console application.
//!
//! # Overview
//!
//! The bot attaches to a browser the user already runs with remote debugging
//! enabled and drives the game tab. It initializes:
//! - Logging infrastructure (daily file rotation + console output)
//! - Tokio async runtime (dispatcher, player monitor, signal handling)
//! - State management ([`StateManager`])
//! - Configuration loading ([`ConfigManager`])
//! - Console controller (operator commands on stdin)
//!
//! The application uses a hybrid threading model:
//! - **Main thread**: blocks on the runtime until the dispatcher stops
//! - **Tokio workers**: dispatcher loop, player monitor, Ctrl-C handler
//! - **Console threads**: blocking stdin reader and state change reporter
//!
//! # Execution Flow
//!
//! 1. Load `mmo-pilot.yaml` from the config directory, apply flag overrides
//! 2. Initialize logging → `<log_dir>/mmo-pilot.<date>`
//! 3. Create the tokio runtime
//! 4. Attach to the browser and start the dispatcher
//! 5. Stop on `stop` or Ctrl-C, then log the run summary

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::Parser;
use mmo_pilot::logging::{self, LogOptions};
use mmo_pilot::notify::{DesktopNotifier, LogNotifier, Notifier};
use mmo_pilot::services::player_data::{self, PlayerMonitor};
use mmo_pilot::ui::ConsoleController;
use mmo_pilot::{
    APP_NAME, BotContext, ChromeSurface, ConfigManager, Dispatcher, Settings, StateManager, VERSION,
};
use std::sync::Arc;
use std::time::Duration;

/// Command line of the bot. Flags override the settings file.
#[derive(Parser, Debug)]
#[command(name = "mmo-pilot", version, about = "Browser automation bot for a browser-based MMO")]
struct Args {
    /// Directory holding mmo-pilot.yaml
    #[arg(long, env = "MMO_PILOT_CONFIG_DIR", default_value = "config")]
    config_dir: Utf8PathBuf,

    /// Log at debug level
    #[arg(long)]
    debug: bool,

    /// Start with combat disabled
    #[arg(long)]
    no_attack: bool,

    /// Start with gathering disabled
    #[arg(long)]
    no_gather: bool,

    /// Do not run the player stats monitor
    #[arg(long)]
    no_monitor: bool,

    /// Only log alerts instead of opening dialogs
    #[arg(long)]
    headless: bool,

    /// Write the log file as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl Args {
    fn apply(&self, settings: &mut Settings) {
        if self.debug {
            settings.bot.debug_mode = true;
        }
        if self.no_attack {
            settings.bot.attack_mode = false;
        }
        if self.no_gather {
            settings.bot.gather_mode = false;
        }
        if self.no_monitor {
            settings.bot.monitor_enabled = false;
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config_manager = ConfigManager::new(&args.config_dir)?;
    let mut settings = config_manager.load_settings()?;
    args.apply(&mut settings);

    let _log_guard = logging::setup_logging(&LogOptions {
        log_dir: &settings.bot.log_dir,
        log_prefix: "mmo-pilot",
        debug_mode: settings.bot.debug_mode,
        console_output: true,
        json_file: args.log_json,
    })?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);
    tracing::info!(
        "Attack mode: {}, gather mode: {}, site: {}",
        settings.bot.attack_mode,
        settings.bot.gather_mode,
        settings.site.base_url
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("mmo-pilot-worker")
        .build()?;

    let state = StateManager::from_settings(&settings.bot);
    let notifier: Arc<dyn Notifier> = if args.headless {
        Arc::new(LogNotifier)
    } else {
        Arc::new(DesktopNotifier)
    };
    let ctx = BotContext::new(state, settings, notifier);

    let result = runtime.block_on(run(ctx.clone()));

    runtime.shutdown_timeout(Duration::from_secs(5));
    ctx.metrics.log_summary();
    tracing::info!("Actions: {}", ctx.state.action_summary());
    tracing::info!("Shutdown complete");

    result
}

async fn run(ctx: BotContext) -> Result<()> {
    let settings = Arc::clone(&ctx.settings);

    let surface = ChromeSurface::connect(&settings.browser, &settings.site)
        .await
        .with_context(|| {
            format!(
                "Failed to attach to the browser at {}; start it with --remote-debugging-port",
                settings.browser.debug_address
            )
        })?;

    let mut controller = ConsoleController::new(ctx.state.clone(), Arc::clone(&ctx.metrics));

    let monitor_task = if settings.bot.monitor_enabled {
        let monitor = Arc::new(PlayerMonitor::new(ChromeSurface::new(
            &settings.browser,
            &settings.site,
        )));
        controller = controller.with_player_stats(monitor.watch());
        Some(player_data::spawn_monitor(monitor, &ctx.state))
    } else {
        None
    };

    controller.spawn_state_reporter()?;
    controller.spawn_input()?;
    println!("Type 'help' for commands.");

    let stop_state = ctx.state.clone();
    let signal_task = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Ctrl-C received, stopping");
                stop_state.request_stop();
            }
            Err(e) => tracing::error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    let mut dispatcher = Dispatcher::new(Arc::new(surface), ctx);
    dispatcher.run().await;

    signal_task.abort();
    if let Some(task) = monitor_task {
        task.abort();
    }
    Ok(())
}
