//! Session registry
//!
//! Owns every live session and its transport adapter. Connection
//! attempts return their [`SessionId`] immediately; everything that
//! happens afterwards reaches the UI domain as a [`LifecycleEvent`] on
//! the bus.
//!
//! Adapters report to a single pump task, which updates session status
//! and republishes on the bus. Because one task publishes everything,
//! per-session event order is preserved end to end.

use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use ts_core::config::ClientConfig;
use ts_core::traits::{DisconnectOutcome, RemoteShellTransport, SessionBackend};
use ts_core::{
    ConnectionProfile, EventPayload, LifecycleEvent, ProfileId, SessionError, SessionId,
    SessionStatus, TransportError,
};

use crate::adapter::{AdapterEvent, AdapterEventKind, AdapterHandle, TransportAdapter};
use crate::bus::EventPublisher;

/// First session ID handed out
const FIRST_SESSION_ID: u64 = 1;

struct SessionEntry {
    profile_id: ProfileId,
    status: SessionStatus,
    adapter: AdapterHandle,
    created_at: Instant,
}

/// Snapshot of one live session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub id: SessionId,
    pub profile_id: ProfileId,
    pub status: SessionStatus,
    pub age: Duration,
}

/// Outcome of [`SessionRegistry::shutdown_all`]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Sessions whose transport closed cleanly
    pub closed: usize,
    /// Sessions whose transport reported an error while closing
    pub failures: Vec<(SessionId, TransportError)>,
    /// The sweep hit its deadline before every close finished
    pub timed_out: bool,
}

impl ShutdownReport {
    /// Whether every session closed cleanly in time
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && !self.timed_out
    }
}

struct RegistryInner {
    config: ClientConfig,
    transport: Arc<dyn RemoteShellTransport>,
    sessions: DashMap<SessionId, SessionEntry>,
    by_profile: DashMap<ProfileId, SessionId>,
    next_id: AtomicU64,
    adapter_tx: mpsc::Sender<AdapterEvent>,
}

/// Registry of live sessions
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

impl SessionRegistry {
    /// Create a registry publishing on `publisher`.
    ///
    /// Must be called inside a Tokio runtime: it spawns the task that
    /// forwards adapter notifications to the bus.
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn RemoteShellTransport>,
        publisher: EventPublisher,
    ) -> Self {
        let (adapter_tx, adapter_rx) = mpsc::channel(config.event_capacity.max(1));
        let inner = Arc::new(RegistryInner {
            config,
            transport,
            sessions: DashMap::new(),
            by_profile: DashMap::new(),
            next_id: AtomicU64::new(FIRST_SESSION_ID),
            adapter_tx,
        });

        tokio::spawn(run_event_pump(
            Arc::downgrade(&inner),
            adapter_rx,
            publisher,
        ));

        Self { inner }
    }

    /// Start connecting to `profile`.
    ///
    /// Fails with [`SessionError::AlreadyActive`] if the profile already
    /// has a live session; the UI domain is expected to prevent that.
    pub fn connect(&self, profile: &ConnectionProfile) -> Result<SessionId, SessionError> {
        let id = match self.inner.by_profile.entry(profile.id.clone()) {
            Entry::Occupied(existing) => {
                tracing::error!(
                    "Connect requested for profile {} while {} is still live",
                    profile.id,
                    existing.get()
                );
                return Err(SessionError::AlreadyActive(profile.id.clone()));
            }
            Entry::Vacant(slot) => {
                let id = SessionId::new(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
                slot.insert(id);
                id
            }
        };

        let timeout = profile.effective_timeout(self.inner.config.handshake_timeout);
        let (handle, adapter) = TransportAdapter::new(
            id,
            profile.clone(),
            Arc::clone(&self.inner.transport),
            timeout,
            self.inner.adapter_tx.clone(),
        );

        self.inner.sessions.insert(
            id,
            SessionEntry {
                profile_id: profile.id.clone(),
                status: SessionStatus::Connecting,
                adapter: handle,
                created_at: Instant::now(),
            },
        );
        tokio::spawn(adapter.run());

        tracing::info!(
            "Created {} for profile {} ({})",
            id,
            profile.id,
            profile.address()
        );
        Ok(id)
    }

    /// Ask a session to close.
    ///
    /// Safe to call more than once and safe to call on a session that is
    /// still handshaking. Returns before the transport has finished
    /// closing; the `Closed` event marks completion. The profile is free
    /// for a new connect as soon as this returns.
    pub fn disconnect(&self, id: SessionId) -> Result<DisconnectOutcome, SessionError> {
        let (adapter, profile_id) = match self.inner.sessions.get_mut(&id) {
            Some(mut entry) => {
                if entry.status == SessionStatus::Closing {
                    return Ok(DisconnectOutcome::AlreadyClosed);
                }
                entry.status = SessionStatus::Closing;
                (entry.adapter.clone(), entry.profile_id.clone())
            }
            None if self.was_issued(id) => {
                tracing::debug!("Disconnect for {} which has already closed", id);
                return Ok(DisconnectOutcome::AlreadyClosed);
            }
            None => {
                tracing::warn!("Disconnect for unknown {}", id);
                return Err(SessionError::NotFound(id));
            }
        };

        self.inner
            .by_profile
            .remove_if(&profile_id, |_, live| *live == id);

        tracing::info!("Closing {}", id);
        tokio::spawn(async move {
            if let Err(e) = adapter.close().await {
                tracing::warn!("Error closing {}: {}", id, e);
            }
        });
        Ok(DisconnectOutcome::Closing)
    }

    /// Forward keystrokes to an open session.
    ///
    /// Bytes for sessions that are not open are dropped.
    pub fn send(&self, id: SessionId, data: Bytes) -> bool {
        let Some(entry) = self.inner.sessions.get(&id) else {
            tracing::debug!("Dropping {} bytes for closed {}", data.len(), id);
            return false;
        };
        if entry.status != SessionStatus::Open {
            tracing::debug!(
                "Dropping {} bytes for {} in state {}",
                data.len(),
                id,
                entry.status
            );
            return false;
        }
        match entry.adapter.write(data) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("Write to {} failed: {}", id, e);
                false
            }
        }
    }

    /// Current status of a live session
    pub fn status(&self, id: SessionId) -> Option<SessionStatus> {
        self.inner.sessions.get(&id).map(|e| e.status)
    }

    /// The session holding a profile's slot, if any.
    ///
    /// A session that is closing no longer holds the slot.
    pub fn session_for_profile(&self, profile: &ProfileId) -> Option<SessionId> {
        self.inner.by_profile.get(profile).map(|id| *id)
    }

    /// Snapshot of all live sessions, oldest first
    pub fn list(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> = self
            .inner
            .sessions
            .iter()
            .map(|entry| SessionInfo {
                id: *entry.key(),
                profile_id: entry.profile_id.clone(),
                status: entry.status,
                age: entry.created_at.elapsed(),
            })
            .collect();
        sessions.sort_by_key(|s| s.id);
        sessions
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.inner.sessions.len()
    }

    /// Whether no session is live
    pub fn is_empty(&self) -> bool {
        self.inner.sessions.is_empty()
    }

    /// Close every live session and clear the registry.
    ///
    /// Closes run concurrently under the configured shutdown timeout. A
    /// failing close is logged and reported; it does not stop the rest.
    /// On timeout, closes that already finished are still counted.
    pub async fn shutdown_all(&self) -> ShutdownReport {
        let targets: Vec<(SessionId, AdapterHandle)> = self
            .inner
            .sessions
            .iter_mut()
            .map(|mut entry| {
                entry.status = SessionStatus::Closing;
                (*entry.key(), entry.adapter.clone())
            })
            .collect();

        let mut report = ShutdownReport::default();
        if targets.is_empty() {
            return report;
        }
        tracing::info!("Shutting down {} sessions", targets.len());

        let mut closes: FuturesUnordered<_> = targets
            .iter()
            .map(|(id, adapter)| async move { (*id, adapter.close().await) })
            .collect();

        let deadline = tokio::time::sleep(self.inner.config.shutdown_timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                next = closes.next() => match next {
                    Some((_, Ok(()))) => report.closed += 1,
                    Some((id, Err(e))) => {
                        tracing::warn!("Error closing {} during shutdown: {}", id, e);
                        report.failures.push((id, e));
                    }
                    None => break,
                },
                _ = &mut deadline => {
                    tracing::warn!(
                        "Shutdown timed out after {:?} with {} sessions still closing",
                        self.inner.config.shutdown_timeout,
                        closes.len()
                    );
                    report.timed_out = true;
                    break;
                }
            }
        }
        drop(closes);

        for (id, _) in &targets {
            self.inner.forget(*id);
        }

        tracing::info!(
            "Shutdown complete: {} closed, {} failed",
            report.closed,
            report.failures.len()
        );
        report
    }

    fn was_issued(&self, id: SessionId) -> bool {
        let raw = id.as_u64();
        raw >= FIRST_SESSION_ID && raw < self.inner.next_id.load(Ordering::SeqCst)
    }
}

impl SessionBackend for SessionRegistry {
    fn connect(&self, profile: &ConnectionProfile) -> Result<SessionId, SessionError> {
        SessionRegistry::connect(self, profile)
    }

    fn disconnect(&self, id: SessionId) -> Result<DisconnectOutcome, SessionError> {
        SessionRegistry::disconnect(self, id)
    }

    fn send(&self, id: SessionId, data: Bytes) -> bool {
        SessionRegistry::send(self, id, data)
    }
}

impl RegistryInner {
    /// Drop a session's entry and its profile index slot
    fn forget(&self, id: SessionId) {
        if let Some((_, entry)) = self.sessions.remove(&id) {
            self.by_profile
                .remove_if(&entry.profile_id, |_, live| *live == id);
        }
    }

    fn on_adapter_event(&self, event: AdapterEvent) -> LifecycleEvent {
        let AdapterEvent {
            session_id,
            profile_id,
            kind,
        } = event;

        let payload = match kind {
            AdapterEventKind::Opened => {
                if let Some(mut entry) = self.sessions.get_mut(&session_id) {
                    if entry.status == SessionStatus::Connecting {
                        entry.status = SessionStatus::Open;
                    }
                }
                EventPayload::Connected
            }
            AdapterEventKind::Data(data) => EventPayload::Data(data),
            AdapterEventKind::Error(e) => EventPayload::Error(e.to_string()),
            AdapterEventKind::Closed => {
                self.forget(session_id);
                tracing::info!("{} closed", session_id);
                EventPayload::Closed
            }
        };

        LifecycleEvent::new(session_id, profile_id, payload)
    }
}

async fn run_event_pump(
    registry: Weak<RegistryInner>,
    mut adapter_rx: mpsc::Receiver<AdapterEvent>,
    publisher: EventPublisher,
) {
    while let Some(event) = adapter_rx.recv().await {
        let Some(inner) = registry.upgrade() else {
            break;
        };
        let lifecycle = inner.on_adapter_event(event);
        drop(inner);

        if !publisher.publish(lifecycle).await {
            tracing::debug!("Event bus has no subscriber, dropping event");
        }
    }
    tracing::debug!("Registry event pump stopped");
}
