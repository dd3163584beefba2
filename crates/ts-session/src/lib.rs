//! ts-session: Backend side of the tabshell session core
//!
//! Owns every live remote shell. The [`SessionRegistry`] opens one
//! [`TransportAdapter`] per connection attempt, tracks its status, and
//! publishes lifecycle events on the [`bus`]. On the UI side of the bus,
//! the [`StreamRouter`] hands each session's output to the terminal
//! surface bound to it.

pub mod adapter;
pub mod bus;
pub mod registry;
pub mod router;
pub mod scripted;
pub mod ssh;

pub use adapter::{AdapterEvent, AdapterEventKind, AdapterHandle, TransportAdapter};
pub use bus::{EventPublisher, EventStream};
pub use registry::{SessionInfo, SessionRegistry, ShutdownReport};
pub use router::{Delivery, StreamRouter};
pub use ssh::RusshTransport;
