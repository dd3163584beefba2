//! Tab-session reconciler
//!
//! Keeps one [`TabBinding`] per profile that has a tab open and decides
//! what a connect request does:
//!
//! - `Pending`, `Failed` or `Connected` binding: switch to its tab. No
//!   new tab, no new session.
//! - No binding: open a tab, bind it as `Pending` and start a session.
//!
//! A failed attempt keeps its tab (and its error transcript) until the
//! user closes it; nothing is retried automatically. Tab indices are
//! positional, so closing a tab shifts every later binding down by one.

use std::collections::HashMap;

use ts_core::traits::SessionBackend;
use ts_core::{ConnectionProfile, EventPayload, LifecycleEvent, ProfileId, SessionId};

use crate::tabs::TabHost;

/// Message recorded when a pending attempt closes without an error
const CLOSED_BEFORE_CONNECT: &str = "Connection closed";

/// Binding between a profile and the tab showing its session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabBinding {
    /// Connection attempt in flight
    Pending { tab: usize, session: SessionId },
    /// Session open
    Connected { tab: usize, session: SessionId },
    /// Attempt failed; the tab keeps the error until closed
    Failed { tab: usize, message: String },
}

impl TabBinding {
    /// Tab index
    pub fn tab(&self) -> usize {
        match self {
            TabBinding::Pending { tab, .. }
            | TabBinding::Connected { tab, .. }
            | TabBinding::Failed { tab, .. } => *tab,
        }
    }

    fn tab_mut(&mut self) -> &mut usize {
        match self {
            TabBinding::Pending { tab, .. }
            | TabBinding::Connected { tab, .. }
            | TabBinding::Failed { tab, .. } => tab,
        }
    }

    /// Session the binding tracks, if it is still live
    pub fn session(&self) -> Option<SessionId> {
        match self {
            TabBinding::Pending { session, .. } | TabBinding::Connected { session, .. } => {
                Some(*session)
            }
            TabBinding::Failed { .. } => None,
        }
    }

    /// Status without the payload
    pub fn status(&self) -> BindingStatus {
        match self {
            TabBinding::Pending { .. } => BindingStatus::Pending,
            TabBinding::Connected { .. } => BindingStatus::Connected,
            TabBinding::Failed { .. } => BindingStatus::Failed,
        }
    }
}

/// Reconciler state of a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingStatus {
    NoAttempt,
    Pending,
    Connected,
    Failed,
}

/// What a connect request did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectDecision {
    /// The profile already had a tab; it was made active
    SwitchedTo(usize),
    /// A new tab was opened and a session started
    Opened { tab: usize, session: SessionId },
    /// A new tab was opened but the backend refused the attempt
    Refused { tab: usize, message: String },
}

/// Binding change caused by a lifecycle event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Pending attempt connected
    Connected { tab: usize },
    /// Pending attempt failed
    Failed { tab: usize, message: String },
    /// Live session ended; its binding is gone and the tab untracked
    Released { tab: usize },
}

/// Profile-to-tab state machine
#[derive(Debug, Default)]
pub struct Reconciler {
    bindings: HashMap<ProfileId, TabBinding>,
}

impl Reconciler {
    /// Create a reconciler with no bindings
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle a user connect request for `profile`
    pub fn connect<B, T>(
        &mut self,
        profile: &ConnectionProfile,
        backend: &B,
        tabs: &mut T,
    ) -> ConnectDecision
    where
        B: SessionBackend + ?Sized,
        T: TabHost + ?Sized,
    {
        if let Some(binding) = self.bindings.get(&profile.id) {
            let tab = binding.tab();
            tracing::debug!(
                "Profile {} is {:?}, switching to tab {}",
                profile.id,
                binding.status(),
                tab
            );
            tabs.switch_to(tab);
            return ConnectDecision::SwitchedTo(tab);
        }

        let tab = tabs.open_tab(&profile.name);
        match backend.connect(profile) {
            Ok(session) => {
                tracing::info!("Tab {} pending on {} for {}", tab, session, profile.id);
                self.bindings
                    .insert(profile.id.clone(), TabBinding::Pending { tab, session });
                ConnectDecision::Opened { tab, session }
            }
            Err(e) => {
                tracing::error!("Backend refused connect for {}: {}", profile.id, e);
                let message = e.to_string();
                self.bindings.insert(
                    profile.id.clone(),
                    TabBinding::Failed {
                        tab,
                        message: message.clone(),
                    },
                );
                ConnectDecision::Refused { tab, message }
            }
        }
    }

    /// Apply a lifecycle event.
    ///
    /// Events for sessions no binding tracks are stale and ignored.
    pub fn apply(&mut self, event: &LifecycleEvent) -> Option<Transition> {
        let binding = self.bindings.get_mut(&event.profile_id)?;
        if binding.session() != Some(event.session_id) {
            tracing::debug!(
                "Ignoring stale {} event for {}",
                event.payload.kind(),
                event.session_id
            );
            return None;
        }

        let tab = binding.tab();
        let session = event.session_id;
        let transition = match (binding.status(), &event.payload) {
            (BindingStatus::Pending, EventPayload::Connected) => {
                *binding = TabBinding::Connected { tab, session };
                Transition::Connected { tab }
            }
            (BindingStatus::Pending, EventPayload::Error(message)) => {
                *binding = TabBinding::Failed {
                    tab,
                    message: message.clone(),
                };
                Transition::Failed {
                    tab,
                    message: message.clone(),
                }
            }
            (BindingStatus::Pending, EventPayload::Closed) => {
                *binding = TabBinding::Failed {
                    tab,
                    message: CLOSED_BEFORE_CONNECT.to_string(),
                };
                Transition::Failed {
                    tab,
                    message: CLOSED_BEFORE_CONNECT.to_string(),
                }
            }
            (BindingStatus::Connected, EventPayload::Closed) => {
                self.bindings.remove(&event.profile_id);
                Transition::Released { tab }
            }
            _ => return None,
        };

        tracing::debug!("{} on tab {}: {:?}", session, tab, transition);
        Some(transition)
    }

    /// The user closed tab `tab`.
    ///
    /// Removes the binding at that index, shifts later bindings down by
    /// one and returns the removed binding so its session can be ended.
    pub fn on_tab_closed(&mut self, tab: usize) -> Option<(ProfileId, TabBinding)> {
        let profile = self
            .bindings
            .iter()
            .find(|(_, binding)| binding.tab() == tab)
            .map(|(profile, _)| profile.clone());
        let removed = profile.and_then(|p| self.bindings.remove(&p).map(|b| (p, b)));

        for binding in self.bindings.values_mut() {
            let index = binding.tab_mut();
            if *index > tab {
                *index -= 1;
            }
        }
        removed
    }

    /// State of a profile
    pub fn status_of(&self, profile: &ProfileId) -> BindingStatus {
        self.bindings
            .get(profile)
            .map(TabBinding::status)
            .unwrap_or(BindingStatus::NoAttempt)
    }

    /// Binding of a profile
    pub fn binding(&self, profile: &ProfileId) -> Option<&TabBinding> {
        self.bindings.get(profile)
    }

    /// Binding shown in tab `tab`
    pub fn binding_for_tab(&self, tab: usize) -> Option<(&ProfileId, &TabBinding)> {
        self.bindings.iter().find(|(_, binding)| binding.tab() == tab)
    }

    /// Number of bindings
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether there are no bindings
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tabs::TabStrip;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use ts_core::traits::DisconnectOutcome;
    use ts_core::SessionError;

    #[derive(Default)]
    struct CountingBackend {
        next: Mutex<u64>,
        calls: Mutex<usize>,
        refuse: AtomicBool,
    }

    impl CountingBackend {
        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    impl SessionBackend for CountingBackend {
        fn connect(&self, profile: &ConnectionProfile) -> Result<SessionId, SessionError> {
            *self.calls.lock().unwrap() += 1;
            if self.refuse.load(Ordering::SeqCst) {
                return Err(SessionError::AlreadyActive(profile.id.clone()));
            }
            let mut next = self.next.lock().unwrap();
            *next += 1;
            Ok(SessionId::new(*next))
        }

        fn disconnect(&self, _id: SessionId) -> Result<DisconnectOutcome, SessionError> {
            Ok(DisconnectOutcome::Closing)
        }

        fn send(&self, _id: SessionId, _data: Bytes) -> bool {
            true
        }
    }

    fn profile(id: &str) -> ConnectionProfile {
        let mut profile = ConnectionProfile::with_password(id, "host", "root", "pw");
        profile.id = ProfileId::new(id);
        profile
    }

    fn event(profile: &str, session: SessionId, payload: EventPayload) -> LifecycleEvent {
        LifecycleEvent::new(session, ProfileId::new(profile), payload)
    }

    fn opened(decision: ConnectDecision) -> (usize, SessionId) {
        match decision {
            ConnectDecision::Opened { tab, session } => (tab, session),
            other => panic!("expected a new tab, got {:?}", other),
        }
    }

    #[test]
    fn test_double_connect_while_pending_switches() {
        let backend = CountingBackend::default();
        let mut tabs = TabStrip::new();
        let mut reconciler = Reconciler::new();
        let p1 = profile("p1");

        let (tab, session) = opened(reconciler.connect(&p1, &backend, &mut tabs));
        assert_eq!(tab, 0);
        assert_eq!(reconciler.status_of(&p1.id), BindingStatus::Pending);

        assert_eq!(
            reconciler.connect(&p1, &backend, &mut tabs),
            ConnectDecision::SwitchedTo(0)
        );
        assert_eq!(backend.calls(), 1);
        assert_eq!(tabs.len(), 1);

        let transition = reconciler.apply(&event("p1", session, EventPayload::Connected));
        assert_eq!(transition, Some(Transition::Connected { tab: 0 }));
        assert_eq!(reconciler.status_of(&p1.id), BindingStatus::Connected);
    }

    #[test]
    fn test_failed_tab_is_reused_until_closed() {
        let backend = CountingBackend::default();
        let mut tabs = TabStrip::new();
        let mut reconciler = Reconciler::new();
        let (p1, p2) = (profile("p1"), profile("p2"));

        reconciler.connect(&p1, &backend, &mut tabs);
        let (tab, session) = opened(reconciler.connect(&p2, &backend, &mut tabs));
        assert_eq!(tab, 1);

        reconciler.apply(&event(
            "p2",
            session,
            EventPayload::Error("Authentication failed".to_string()),
        ));
        assert_eq!(
            reconciler.binding(&p2.id),
            Some(&TabBinding::Failed {
                tab: 1,
                message: "Authentication failed".to_string()
            })
        );

        // The Closed that follows the error is no longer tracked
        assert_eq!(reconciler.apply(&event("p2", session, EventPayload::Closed)), None);

        tabs.switch_to(0);
        assert_eq!(
            reconciler.connect(&p2, &backend, &mut tabs),
            ConnectDecision::SwitchedTo(1)
        );
        assert_eq!(tabs.active(), Some(1));
        assert_eq!(backend.calls(), 2);

        reconciler.on_tab_closed(1);
        tabs.remove(1);
        let (tab, _) = opened(reconciler.connect(&p2, &backend, &mut tabs));
        assert_eq!(tab, 1);
        assert_eq!(backend.calls(), 3);
    }

    #[test]
    fn test_closing_middle_tab_reindexes() {
        let backend = CountingBackend::default();
        let mut tabs = TabStrip::new();
        let mut reconciler = Reconciler::new();
        let (p1, p2, p3) = (profile("p1"), profile("p2"), profile("p3"));
        for p in [&p1, &p2, &p3] {
            reconciler.connect(p, &backend, &mut tabs);
        }

        let (removed, binding) = reconciler.on_tab_closed(1).unwrap();
        assert_eq!(removed, p2.id);
        assert_eq!(binding.tab(), 1);

        assert_eq!(reconciler.binding(&p1.id).unwrap().tab(), 0);
        assert_eq!(reconciler.binding(&p3.id).unwrap().tab(), 1);
        assert_eq!(reconciler.status_of(&p2.id), BindingStatus::NoAttempt);
    }

    #[test]
    fn test_close_of_unbound_tab_still_reindexes() {
        let backend = CountingBackend::default();
        let mut tabs = TabStrip::new();
        let mut reconciler = Reconciler::new();
        let (p1, p2) = (profile("p1"), profile("p2"));

        let (_, session) = opened(reconciler.connect(&p1, &backend, &mut tabs));
        reconciler.connect(&p2, &backend, &mut tabs);
        reconciler.apply(&event("p1", session, EventPayload::Connected));
        assert_eq!(
            reconciler.apply(&event("p1", session, EventPayload::Closed)),
            Some(Transition::Released { tab: 0 })
        );

        assert!(reconciler.on_tab_closed(0).is_none());
        assert_eq!(reconciler.binding(&p2.id).unwrap().tab(), 0);
    }

    #[test]
    fn test_pending_closed_without_error_fails() {
        let backend = CountingBackend::default();
        let mut tabs = TabStrip::new();
        let mut reconciler = Reconciler::new();
        let p1 = profile("p1");

        let (_, session) = opened(reconciler.connect(&p1, &backend, &mut tabs));
        assert_eq!(
            reconciler.apply(&event("p1", session, EventPayload::Closed)),
            Some(Transition::Failed {
                tab: 0,
                message: "Connection closed".to_string()
            })
        );
    }

    #[test]
    fn test_stale_session_events_ignored() {
        let backend = CountingBackend::default();
        let mut tabs = TabStrip::new();
        let mut reconciler = Reconciler::new();
        let p1 = profile("p1");

        let (_, first) = opened(reconciler.connect(&p1, &backend, &mut tabs));
        reconciler.on_tab_closed(0);
        tabs.remove(0);
        let (_, second) = opened(reconciler.connect(&p1, &backend, &mut tabs));

        assert_eq!(reconciler.apply(&event("p1", first, EventPayload::Closed)), None);
        assert_eq!(reconciler.status_of(&p1.id), BindingStatus::Pending);
        assert_eq!(
            reconciler.apply(&event("p1", second, EventPayload::Connected)),
            Some(Transition::Connected { tab: 0 })
        );
    }

    #[test]
    fn test_refused_connect_leaves_failed_tab() {
        let backend = CountingBackend::default();
        backend.refuse.store(true, Ordering::SeqCst);
        let mut tabs = TabStrip::new();
        let mut reconciler = Reconciler::new();
        let p1 = profile("p1");

        let decision = reconciler.connect(&p1, &backend, &mut tabs);
        assert!(matches!(decision, ConnectDecision::Refused { tab: 0, .. }));
        assert_eq!(reconciler.status_of(&p1.id), BindingStatus::Failed);
        assert_eq!(
            reconciler.connect(&p1, &backend, &mut tabs),
            ConnectDecision::SwitchedTo(0)
        );
    }

    #[test]
    fn test_connected_profile_switches_to_its_tab() {
        let backend = CountingBackend::default();
        let mut tabs = TabStrip::new();
        let mut reconciler = Reconciler::new();
        let (p1, p2) = (profile("p1"), profile("p2"));

        let (_, session) = opened(reconciler.connect(&p1, &backend, &mut tabs));
        reconciler.connect(&p2, &backend, &mut tabs);
        reconciler.apply(&event("p1", session, EventPayload::Connected));

        assert_eq!(
            reconciler.connect(&p1, &backend, &mut tabs),
            ConnectDecision::SwitchedTo(0)
        );
        assert_eq!(backend.calls(), 2);
    }
}
