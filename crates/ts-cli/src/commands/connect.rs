//! Connect command implementation
//!
//! Drives one tab through the full workspace path: the reconciler opens
//! the tab, the registry starts an SSH session, and the local terminal is
//! attached as the tab's surface.

use anyhow::{Context, Result};
use bytes::Bytes;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use ts_core::config::ClientConfig;
use ts_core::{ProfileId, ProfileStore};
use ts_session::{bus, EventStream, RusshTransport, SessionRegistry};
use ts_tabs::{ConnectDecision, Transition, Workspace};

use crate::output::{print_error, print_info, print_success, print_warning};
use crate::terminal::{spawn_input_reader, LocalInput, RawModeGuard, StdoutSurface};

/// How an interactive session ended
#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionEnd {
    Detached,
    Closed,
    Failed(String),
    Interrupted,
}

/// Open a shell for a stored profile and attach the local terminal
pub async fn connect_command(
    config: &ClientConfig,
    store: &dyn ProfileStore,
    profile_id: &str,
    cancel: CancellationToken,
) -> Result<()> {
    let profile = store
        .get(&ProfileId::new(profile_id))
        .with_context(|| format!("Unknown profile '{}'", profile_id))?;

    let (publisher, mut events) = bus::channel(config.event_capacity);
    let transport = Arc::new(RusshTransport::new(config));
    let registry = SessionRegistry::new(config.clone(), transport, publisher);
    let mut workspace = Workspace::new(registry, config.inbound_buffer_limit);

    print_info(&format!(
        "Connecting to '{}' ({})... (Press Ctrl+] to detach)",
        profile.name,
        profile.address()
    ));

    let end = {
        let _raw = RawModeGuard::enable().context("Failed to enable raw mode")?;

        let tab = match workspace.connect(&profile) {
            ConnectDecision::Opened { tab, .. } | ConnectDecision::SwitchedTo(tab) => tab,
            ConnectDecision::Refused { message, .. } => {
                return Err(anyhow::anyhow!(message)).context("Connection refused");
            }
        };
        workspace.attach_terminal(tab, Box::new(StdoutSurface));

        run_session(&mut workspace, &mut events, tab, &cancel).await
    };
    println!();

    let report = workspace.shutdown().await;
    for (session, error) in &report.failures {
        print_warning(&format!("Error closing {}: {}", session, error));
    }
    if report.timed_out {
        print_warning("Timed out waiting for sessions to close");
    }

    match end {
        SessionEnd::Detached => print_success("Detached from session"),
        SessionEnd::Closed => print_info("Session closed"),
        SessionEnd::Interrupted => print_warning("Interrupted, session closed"),
        SessionEnd::Failed(message) => {
            print_error(&format!("Connection failed: {}", message));
            anyhow::bail!("Connection to '{}' failed", profile.name);
        }
    }
    Ok(())
}

async fn run_session(
    workspace: &mut Workspace<SessionRegistry>,
    events: &mut EventStream,
    tab: usize,
    cancel: &CancellationToken,
) -> SessionEnd {
    let (mut input, reader) = spawn_input_reader();

    let end = loop {
        tokio::select! {
            _ = cancel.cancelled() => break SessionEnd::Interrupted,

            event = events.next() => {
                let Some(event) = event else {
                    break SessionEnd::Closed;
                };
                match workspace.handle_event(event) {
                    Some(Transition::Released { .. }) => break SessionEnd::Closed,
                    Some(Transition::Failed { message, .. }) => break SessionEnd::Failed(message),
                    _ => {}
                }
            }

            Some(local) = input.recv() => match local {
                LocalInput::Detach => break SessionEnd::Detached,
                LocalInput::Bytes(data) => {
                    workspace.input(tab, Bytes::from(data));
                }
                LocalInput::Resize(cols, rows) => {
                    tracing::debug!("Local terminal resized to {}x{}", cols, rows);
                }
            },
        }
    };

    drop(input);
    if let Err(e) = reader.await {
        tracing::debug!("Terminal reader stopped with error: {}", e);
    }
    end
}
