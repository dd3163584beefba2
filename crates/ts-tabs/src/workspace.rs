//! Workspace controller
//!
//! Owns the UI-domain state (tab strip, reconciler, stream router) and
//! a handle to the session backend. User actions come in as method calls;
//! backend activity comes in as lifecycle events via
//! [`handle_event`](Workspace::handle_event) or [`pump`](Workspace::pump).
//!
//! Each tab's terminal also receives short status lines so the user can
//! see how the connection went:
//!
//! ```text
//! Connecting to db.internal:22...
//! Connection failed: Authentication failed
//! ```

use bytes::Bytes;

use ts_core::traits::{DisconnectOutcome, SessionBackend, TerminalSurface};
use ts_core::{ConnectionProfile, EventPayload, LifecycleEvent, SessionError, SessionId};
use ts_session::{EventStream, SessionRegistry, ShutdownReport, StreamRouter};

use crate::reconciler::{ConnectDecision, Reconciler, TabBinding, Transition};
use crate::tabs::{TabHost, TabStrip};

/// UI-domain controller over a session backend
pub struct Workspace<B: SessionBackend> {
    backend: B,
    reconciler: Reconciler,
    tabs: TabStrip,
    router: StreamRouter,
}

impl<B: SessionBackend> Workspace<B> {
    /// Create a workspace buffering up to `buffer_limit` bytes per
    /// session until its terminal is attached
    pub fn new(backend: B, buffer_limit: usize) -> Self {
        Self {
            backend,
            reconciler: Reconciler::new(),
            tabs: TabStrip::new(),
            router: StreamRouter::new(buffer_limit),
        }
    }

    /// Connect to `profile`, or switch to the tab it already has
    pub fn connect(&mut self, profile: &ConnectionProfile) -> ConnectDecision {
        let decision = self
            .reconciler
            .connect(profile, &self.backend, &mut self.tabs);

        if let ConnectDecision::Opened { tab, session } = decision {
            self.tabs.set_session(tab, session);
            self.router.open(session);
            self.status_line(session, &format!("Connecting to {}...", profile.address()));
        }
        decision
    }

    /// Attach the terminal surface for tab `tab`.
    ///
    /// Output received so far is flushed to it. Returns `false` if the tab
    /// has nothing to show.
    pub fn attach_terminal(&mut self, tab: usize, mut surface: Box<dyn TerminalSurface>) -> bool {
        if let Some(session) = self.tabs.session(tab) {
            if self.router.has_route(session) {
                let flushed = self.router.bind(session, surface);
                tracing::debug!("Tab {} attached to {}, {} bytes flushed", tab, session, flushed);
                return true;
            }
            return false;
        }

        // Refused before a session existed; show the reason directly
        if let Some((_, TabBinding::Failed { message, .. })) = self.reconciler.binding_for_tab(tab)
        {
            surface.write(failure_line(message).as_bytes());
            return true;
        }
        false
    }

    /// Keystrokes typed into tab `tab`
    pub fn input(&self, tab: usize, data: Bytes) -> bool {
        match self.tabs.session(tab) {
            Some(session) => self.router.forward(&self.backend, session, data),
            None => false,
        }
    }

    /// End the session shown in tab `tab` but keep the tab open
    pub fn disconnect_tab(&mut self, tab: usize) -> Result<Option<DisconnectOutcome>, SessionError> {
        let session = self
            .reconciler
            .binding_for_tab(tab)
            .and_then(|(_, binding)| binding.session());
        match session {
            Some(session) => self.backend.disconnect(session).map(Some),
            None => Ok(None),
        }
    }

    /// Close tab `tab`, ending any session it still tracks
    pub fn close_tab(&mut self, tab: usize) -> bool {
        if tab >= self.tabs.len() {
            return false;
        }

        if let Some((profile, binding)) = self.reconciler.on_tab_closed(tab) {
            if let Some(session) = binding.session() {
                tracing::info!("Tab {} closed, disconnecting {} ({})", tab, session, profile);
                if let Err(e) = self.backend.disconnect(session) {
                    tracing::warn!("Disconnect of {} on tab close failed: {}", session, e);
                }
            }
        }

        if let Some(closed) = self.tabs.remove(tab) {
            if let Some(session) = closed.session {
                self.router.discard(session);
            }
        }
        true
    }

    /// Make tab `tab` active
    pub fn switch_tab(&mut self, tab: usize) -> bool {
        if tab >= self.tabs.len() {
            return false;
        }
        self.tabs.switch_to(tab);
        true
    }

    /// Dispatch one lifecycle event to the router and reconciler
    pub fn handle_event(&mut self, event: LifecycleEvent) -> Option<Transition> {
        let session = event.session_id;

        match &event.payload {
            EventPayload::Data(data) => {
                self.router.deliver(session, data);
                return None;
            }
            EventPayload::Connected => self.status_line(session, "Connected"),
            EventPayload::Error(message) => {
                let line = failure_line(message);
                self.router.deliver(session, line.as_bytes());
            }
            EventPayload::Closed => {}
        }

        let transition = self.reconciler.apply(&event);

        if event.payload == EventPayload::Closed {
            if transition.is_some() {
                self.status_line(session, "Connection closed");
            }
            self.router.close(session);
        }
        transition
    }

    /// Handle every event that is ready on the bus; returns how many
    pub fn pump(&mut self, events: &mut EventStream) -> usize {
        let ready = events.drain();
        let count = ready.len();
        for event in ready {
            self.handle_event(event);
        }
        count
    }

    /// Tab strip
    pub fn tabs(&self) -> &TabStrip {
        &self.tabs
    }

    /// Reconciler state
    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Stream router
    pub fn router(&self) -> &StreamRouter {
        &self.router
    }

    /// Session backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn status_line(&mut self, session: SessionId, text: &str) {
        self.router.deliver(session, format!("{}\r\n", text).as_bytes());
    }
}

impl Workspace<SessionRegistry> {
    /// Close every live session before exit
    pub async fn shutdown(&mut self) -> ShutdownReport {
        let report = self.backend.shutdown_all().await;
        if !report.is_clean() {
            tracing::warn!(
                "Shutdown finished with {} failures (timed out: {})",
                report.failures.len(),
                report.timed_out
            );
        }
        report
    }
}

fn failure_line(message: &str) -> String {
    format!("Connection failed: {}\r\n", message)
}
