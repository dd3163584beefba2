//! Core error types for tabshell

use std::path::PathBuf;
use thiserror::Error;

use crate::types::{ProfileId, SessionId};

/// Top-level error type for the tabshell workspace
#[derive(Error, Debug)]
pub enum TsError {
    /// Transport error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Session error
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Profile store error
    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of the remote shell transport.
///
/// The three handshake failure modes stay distinct so the UI can show
/// the user what actually went wrong.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The handshake did not finish within the configured timeout
    #[error("Handshake timed out")]
    HandshakeTimeout,

    /// The server rejected our credentials
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// The host could not be reached at the network level
    #[error("Network unreachable: {0}")]
    NetworkUnreachable(String),

    /// Anything else the transport reported
    #[error("{0}")]
    Internal(String),
}

impl TransportError {
    /// Whether this failure happened before the shell was ever usable
    pub fn is_handshake_failure(&self) -> bool {
        matches!(
            self,
            TransportError::HandshakeTimeout
                | TransportError::AuthenticationFailed
                | TransportError::NetworkUnreachable(_)
        )
    }
}

/// Session registry errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No session with this ID was ever allocated
    #[error("Session not found: {0}")]
    NotFound(SessionId),

    /// A non-closed session already exists for the profile
    #[error("Profile {0} already has an active session")]
    AlreadyActive(ProfileId),

    /// Transport failure surfaced through the registry
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Profile store errors
#[derive(Error, Debug)]
pub enum ProfileError {
    /// No profile with this ID
    #[error("Profile not found: {0}")]
    NotFound(ProfileId),

    /// Profile failed validation
    #[error("Invalid profile: {0}")]
    Invalid(String),

    /// Reading or writing the backing file failed
    #[error("Profile store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backing TOML file could not be parsed
    #[error("Profile store parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Profiles could not be encoded to TOML
    #[error("Profile store encode error: {0}")]
    Encode(#[from] toml::ser::Error),

    /// JSON import/export failed
    #[error("Profile JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
