//! ts-tabs: UI domain of the tabshell session core
//!
//! Everything here runs on one thread. The [`Reconciler`] decides, for
//! each connect request, whether to open a new tab or switch to an
//! existing one, and keeps its tab bindings in step with lifecycle
//! events. The [`Workspace`] ties the reconciler to a [`TabStrip`], the
//! session backend and the stream router.

pub mod reconciler;
pub mod tabs;
pub mod workspace;

pub use reconciler::{BindingStatus, ConnectDecision, Reconciler, TabBinding, Transition};
pub use tabs::{Tab, TabHost, TabStrip};
pub use workspace::Workspace;
