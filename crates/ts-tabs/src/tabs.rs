//! Tab strip model
//!
//! Tabs are positional: closing a tab shifts every later tab one place
//! to the left.

use ts_core::SessionId;

/// The UI's tab container, as far as the reconciler needs it
pub trait TabHost {
    /// Append a tab, make it active and return its index
    fn open_tab(&mut self, title: &str) -> usize;

    /// Make an existing tab active
    fn switch_to(&mut self, index: usize);
}

/// One tab
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tab {
    /// Label shown in the strip
    pub title: String,
    /// Session whose output this tab shows, if one was ever started
    pub session: Option<SessionId>,
}

/// Ordered list of tabs with an active selection
#[derive(Debug, Default)]
pub struct TabStrip {
    tabs: Vec<Tab>,
    active: Option<usize>,
}

impl TabStrip {
    /// Create an empty strip
    pub fn new() -> Self {
        Self::default()
    }

    /// Tab at `index`
    pub fn get(&self, index: usize) -> Option<&Tab> {
        self.tabs.get(index)
    }

    /// Session shown in tab `index`
    pub fn session(&self, index: usize) -> Option<SessionId> {
        self.tabs.get(index).and_then(|t| t.session)
    }

    /// Record the session a tab shows
    pub fn set_session(&mut self, index: usize, session: SessionId) {
        if let Some(tab) = self.tabs.get_mut(index) {
            tab.session = Some(session);
        }
    }

    /// Index of the active tab
    pub fn active(&self) -> Option<usize> {
        self.active
    }

    /// Remove tab `index`, moving the selection to its neighbour
    pub fn remove(&mut self, index: usize) -> Option<Tab> {
        if index >= self.tabs.len() {
            return None;
        }
        let tab = self.tabs.remove(index);

        self.active = match self.active {
            _ if self.tabs.is_empty() => None,
            Some(active) if active > index => Some(active - 1),
            Some(active) if active == index => Some(index.min(self.tabs.len() - 1)),
            other => other,
        };
        Some(tab)
    }

    /// Tab titles in order
    pub fn titles(&self) -> Vec<&str> {
        self.tabs.iter().map(|t| t.title.as_str()).collect()
    }

    /// Number of tabs
    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    /// Whether the strip is empty
    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }
}

impl TabHost for TabStrip {
    fn open_tab(&mut self, title: &str) -> usize {
        self.tabs.push(Tab {
            title: title.to_string(),
            session: None,
        });
        let index = self.tabs.len() - 1;
        self.active = Some(index);
        index
    }

    fn switch_to(&mut self, index: usize) {
        if index < self.tabs.len() {
            self.active = Some(index);
        } else {
            tracing::warn!("Switch to missing tab {}", index);
        }
    }
}
