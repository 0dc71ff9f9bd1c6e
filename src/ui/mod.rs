// UI module - console front end
//
// This module contains:
// - ConsoleController: operator commands on stdin and state change reporting

pub mod controller;

pub use controller::{Command, CommandError, ConsoleController};
