//! Core trait definitions

mod backend;
mod terminal;
mod transport;

pub use backend::{DisconnectOutcome, SessionBackend};
pub use terminal::TerminalSurface;
pub use transport::{RemoteShellTransport, ShellStream};
