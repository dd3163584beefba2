//! tabshell: Command-line front end for tabbed remote shells
//!
//! Manages stored connection profiles and runs interactive SSH sessions
//! through the tab workspace.

pub mod commands;
pub mod output;
pub mod terminal;
