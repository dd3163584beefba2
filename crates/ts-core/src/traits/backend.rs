//! Session backend trait
//!
//! The seam between the UI domain and the session registry. The tab
//! reconciler only needs these three calls, which keeps it testable
//! without a network. None of them block: outcomes arrive later as
//! lifecycle events.

use bytes::Bytes;

use crate::error::SessionError;
use crate::profile::ConnectionProfile;
use crate::types::SessionId;

/// Result of a disconnect request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectOutcome {
    /// The session was live; a `Closed` event will follow
    Closing,
    /// The session had already closed or was already closing
    AlreadyClosed,
}

/// Operations the UI domain issues against live sessions
pub trait SessionBackend: Send + Sync {
    /// Start a connection attempt and return its session ID immediately
    fn connect(&self, profile: &ConnectionProfile) -> Result<SessionId, SessionError>;

    /// Ask a session to close
    fn disconnect(&self, id: SessionId) -> Result<DisconnectOutcome, SessionError>;

    /// Forward keystrokes; returns `false` when the bytes were dropped
    fn send(&self, id: SessionId, data: Bytes) -> bool;
}
