// Console Controller - Operator commands and state reporting
//
// This module contains the ConsoleController which coordinates between:
// - stdin (operator commands)
// - StateManager (mode flags, history, termination)
// - BotMetrics and the player monitor (status output)
//
// It handles:
// - Parsing and executing commands on a dedicated reader thread
// - Subscribing to state changes → console messages

use crate::metrics::BotMetrics;
use crate::models::BotFlag;
use crate::services::PlayerStats;
use crate::state::{StateChange, StateManager};
use std::io::{self, BufRead, Write};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

/// Entries printed by the `history` command.
const HISTORY_LINES: usize = 10;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command '{0}', type 'help' for the list")]
    Unknown(String),

    #[error("'{0}' needs 'on' or 'off'")]
    MissingSwitch(String),
}

/// Operator command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetFlag(BotFlag, bool),
    Status,
    History,
    Stats,
    Stop,
    Help,
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Err(CommandError::Unknown(String::new()));
        };
        let name = name.to_lowercase();

        let flag = match name.as_str() {
            "attack" => BotFlag::AttackMode,
            "gather" => BotFlag::GatherMode,
            "status" => return Ok(Self::Status),
            "history" => return Ok(Self::History),
            "stats" => return Ok(Self::Stats),
            "stop" | "quit" | "exit" => return Ok(Self::Stop),
            "help" | "?" => return Ok(Self::Help),
            _ => return Err(CommandError::Unknown(name)),
        };

        match words.next().map(str::to_lowercase).as_deref() {
            Some("on") => Ok(Self::SetFlag(flag, true)),
            Some("off") => Ok(Self::SetFlag(flag, false)),
            _ => Err(CommandError::MissingSwitch(name)),
        }
    }
}

const HELP: &str = "\
Commands:
  attack on|off   enable or disable combat
  gather on|off   enable or disable gathering
  status          current modes and activity
  history         last actions
  stats           counters and player stats
  stop            stop the bot";

/// Console front end of the bot.
///
/// Commands are read on their own thread so the runtime never blocks on
/// stdin.
#[derive(Clone)]
pub struct ConsoleController {
    state: StateManager,
    metrics: Arc<BotMetrics>,
    player_stats: Option<watch::Receiver<Option<PlayerStats>>>,
}

impl ConsoleController {
    pub fn new(state: StateManager, metrics: Arc<BotMetrics>) -> Self {
        Self {
            state,
            metrics,
            player_stats: None,
        }
    }

    /// Include the monitor's latest read in the `stats` output.
    pub fn with_player_stats(mut self, player_stats: watch::Receiver<Option<PlayerStats>>) -> Self {
        self.player_stats = Some(player_stats);
        self
    }

    /// Parse and execute one input line, returning the text to print.
    pub fn handle_line(&self, line: &str) -> String {
        match line.parse::<Command>() {
            Ok(command) => self.execute(command),
            Err(e) => e.to_string(),
        }
    }

    pub fn execute(&self, command: Command) -> String {
        match command {
            Command::SetFlag(flag, value) => {
                self.state.set_flag(flag, value);
                let name = match flag {
                    BotFlag::AttackMode => "Attack mode",
                    BotFlag::GatherMode => "Gather mode",
                    BotFlag::Terminate => "Termination",
                };
                format!("{} {}", name, if value { "enabled" } else { "disabled" })
            }
            Command::Status => {
                let snapshot = self.state.snapshot();
                format!(
                    "Running: {} | Attack: {} | Gather: {} | Activity: {}",
                    snapshot.running,
                    on_off(snapshot.attack_mode),
                    on_off(snapshot.gather_mode),
                    if snapshot.current_activity.is_empty() {
                        "-"
                    } else {
                        snapshot.current_activity.as_str()
                    }
                )
            }
            Command::History => {
                let actions = self.state.recent_actions(HISTORY_LINES);
                if actions.is_empty() {
                    return "No actions yet".to_string();
                }
                actions
                    .iter()
                    .map(|record| format!("{} {}", record.timestamp, record.action))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
            Command::Stats => {
                let mut lines = vec![self.metrics.summary_line(), self.state.action_summary()];
                if let Some(stats) = self.player_stats.as_ref().and_then(|rx| rx.borrow().clone()) {
                    lines.push(stats.summary_line());
                }
                lines.join("\n")
            }
            Command::Stop => {
                self.state.request_stop();
                "Stopping after the current action".to_string()
            }
            Command::Help => HELP.to_string(),
        }
    }

    /// Read commands from stdin until EOF or `stop`.
    pub fn spawn_input(&self) -> io::Result<std::thread::JoinHandle<()>> {
        let controller = self.clone();
        std::thread::Builder::new()
            .name("mmo-pilot-console".to_string())
            .spawn(move || {
                tracing::debug!("Console input thread started");
                let stdin = io::stdin();
                for line in stdin.lock().lines() {
                    let line = match line {
                        Ok(line) => line,
                        Err(e) => {
                            tracing::warn!("Failed to read console input: {}", e);
                            break;
                        }
                    };
                    if line.trim().is_empty() {
                        continue;
                    }

                    let reply = controller.handle_line(&line);
                    let mut stdout = io::stdout().lock();
                    let _ = writeln!(stdout, "{reply}");

                    if controller.state.flag(BotFlag::Terminate) {
                        break;
                    }
                }
                tracing::debug!("Console input thread terminated");
            })
    }

    /// Subscribe to state changes and report them on the log.
    pub fn spawn_state_reporter(&self) -> io::Result<std::thread::JoinHandle<()>> {
        let mut rx = self.state.subscribe();
        std::thread::Builder::new()
            .name("mmo-pilot-state".to_string())
            .spawn(move || {
                tracing::debug!("State subscription thread started");

                loop {
                    match rx.blocking_recv() {
                        Ok(StateChange::ModesChanged {
                            attack_mode,
                            gather_mode,
                        }) => {
                            tracing::info!(
                                "Modes changed: attack {}, gather {}",
                                on_off(attack_mode),
                                on_off(gather_mode)
                            );
                        }
                        Ok(StateChange::TerminationRequested) => {
                            tracing::info!("Termination requested");
                        }
                        Ok(StateChange::RunStateChanged { running: false }) => {
                            tracing::debug!("Dispatcher stopped, shutting down subscription thread");
                            break;
                        }
                        Ok(change) => {
                            tracing::trace!("State change received: {:?}", change);
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                            tracing::info!("State broadcast channel closed - shutting down subscription thread");
                            break;
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!("State subscription lagged - {} events were skipped", skipped);
                        }
                    }
                }

                tracing::debug!("State subscription thread terminated gracefully");
            })
    }
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}
