//! ts-core: Core abstractions and configuration for tabshell
//!
//! This crate provides the shared types, error taxonomy, lifecycle event
//! wire shape, configuration and collaborator traits used by the session
//! backend, the tab reconciler and the CLI.

pub mod config;
pub mod error;
pub mod events;
pub mod profile;
pub mod store;
pub mod traits;
pub mod types;

pub use error::{SessionError, TransportError, TsError};
pub use events::{EventPayload, LifecycleEvent};
pub use profile::{ConnectionProfile, Credentials};
pub use store::{FileProfileStore, MemoryProfileStore, ProfileStore};
pub use types::{ProfileId, SessionId, SessionStatus};
