//! Stream router
//!
//! Lives in the UI domain and hands each session's output to the
//! terminal surface bound to it. Output that arrives before a surface is
//! attached is buffered, up to a byte limit, and flushed in order on
//! attach.

use bytes::Bytes;
use std::collections::{HashMap, VecDeque};

use ts_core::traits::{SessionBackend, TerminalSurface};
use ts_core::SessionId;

/// What happened to a chunk handed to [`StreamRouter::deliver`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Written to the bound surface
    Written,
    /// Held until a surface is attached
    Buffered,
    /// No route for the session; the chunk was discarded
    Dropped,
}

enum Route {
    Buffering {
        chunks: VecDeque<Bytes>,
        len: usize,
        closed: bool,
    },
    Bound(Box<dyn TerminalSurface>),
}

impl Route {
    fn buffering() -> Self {
        Route::Buffering {
            chunks: VecDeque::new(),
            len: 0,
            closed: false,
        }
    }
}

/// Per-session routing of shell output to terminal surfaces
pub struct StreamRouter {
    routes: HashMap<SessionId, Route>,
    buffer_limit: usize,
}

impl StreamRouter {
    /// Create a router buffering at most `buffer_limit` bytes per
    /// unattached session
    pub fn new(buffer_limit: usize) -> Self {
        Self {
            routes: HashMap::new(),
            buffer_limit,
        }
    }

    /// Start routing for a session. Output is buffered until [`bind`](Self::bind).
    pub fn open(&mut self, id: SessionId) {
        self.routes.entry(id).or_insert_with(Route::buffering);
    }

    /// Route a chunk of output for `id`
    pub fn deliver(&mut self, id: SessionId, data: &[u8]) -> Delivery {
        let limit = self.buffer_limit;
        match self.routes.get_mut(&id) {
            Some(Route::Bound(surface)) => {
                surface.write(data);
                Delivery::Written
            }
            Some(Route::Buffering { chunks, len, .. }) => {
                chunks.push_back(Bytes::copy_from_slice(data));
                *len += data.len();

                if *len > limit {
                    let dropped = trim_front(chunks, *len - limit);
                    *len -= dropped;
                    tracing::warn!(
                        "{}: output buffer full, dropped {} oldest bytes",
                        id,
                        dropped
                    );
                }
                Delivery::Buffered
            }
            None => {
                tracing::debug!("{}: no route, dropping {} bytes", id, data.len());
                Delivery::Dropped
            }
        }
    }

    /// Attach a surface to a session, flushing buffered output to it.
    ///
    /// If the session already closed, the surface receives the retained
    /// transcript and the route is dropped. Returns the number of bytes
    /// flushed.
    pub fn bind(&mut self, id: SessionId, mut surface: Box<dyn TerminalSurface>) -> usize {
        let previous = self.routes.remove(&id).unwrap_or_else(Route::buffering);

        let (flushed, closed) = match previous {
            Route::Buffering {
                chunks,
                len,
                closed,
            } => {
                for chunk in &chunks {
                    surface.write(chunk);
                }
                (len, closed)
            }
            Route::Bound(_) => {
                tracing::debug!("{}: replacing bound surface", id);
                (0, false)
            }
        };

        if closed {
            tracing::debug!("{}: attached after close, route dropped", id);
        } else {
            self.routes.insert(id, Route::Bound(surface));
        }
        flushed
    }

    /// The session closed.
    ///
    /// A bound route is dropped. An unbound route keeps its transcript so
    /// a later [`bind`](Self::bind) still shows it.
    pub fn close(&mut self, id: SessionId) {
        let bound = match self.routes.get_mut(&id) {
            Some(Route::Bound(_)) => true,
            Some(Route::Buffering { closed, .. }) => {
                *closed = true;
                false
            }
            None => false,
        };
        if bound {
            self.routes.remove(&id);
        }
    }

    /// Send keystrokes from the bound surface to the session.
    ///
    /// Input for a session without an attached surface is dropped.
    pub fn forward<B>(&self, backend: &B, id: SessionId, data: Bytes) -> bool
    where
        B: SessionBackend + ?Sized,
    {
        if !self.is_bound(id) {
            tracing::debug!("{}: no surface bound, dropping {} input bytes", id, data.len());
            return false;
        }
        backend.send(id, data)
    }

    /// Forget a session entirely, including any retained transcript
    pub fn discard(&mut self, id: SessionId) {
        self.routes.remove(&id);
    }

    /// Whether a surface is attached to the session
    pub fn is_bound(&self, id: SessionId) -> bool {
        matches!(self.routes.get(&id), Some(Route::Bound(_)))
    }

    /// Whether the router holds anything for the session
    pub fn has_route(&self, id: SessionId) -> bool {
        self.routes.contains_key(&id)
    }

    /// Bytes held for an unattached session
    pub fn buffered_len(&self, id: SessionId) -> usize {
        match self.routes.get(&id) {
            Some(Route::Buffering { len, .. }) => *len,
            _ => 0,
        }
    }

    /// Number of routes
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether there are no routes
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Remove `excess` bytes from the front of the queue, splitting a chunk
/// if needed. Returns the number of bytes removed.
fn trim_front(chunks: &mut VecDeque<Bytes>, excess: usize) -> usize {
    let mut removed = 0;
    while removed < excess {
        let Some(front) = chunks.front_mut() else {
            break;
        };
        let want = excess - removed;
        if front.len() <= want {
            removed += front.len();
            chunks.pop_front();
        } else {
            *front = front.slice(want..);
            removed += want;
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl TerminalSurface for Capture {
        fn write(&mut self, data: &[u8]) {
            self.0.lock().unwrap().extend_from_slice(data);
        }
    }

    #[test]
    fn test_buffer_then_flush_in_order() {
        let mut router = StreamRouter::new(1024);
        let id = SessionId::new(1);
        router.open(id);

        assert_eq!(router.deliver(id, b"one "), Delivery::Buffered);
        assert_eq!(router.deliver(id, b"two "), Delivery::Buffered);

        let capture = Capture::default();
        assert_eq!(router.bind(id, Box::new(capture.clone())), 8);
        assert_eq!(router.deliver(id, b"three"), Delivery::Written);
        assert_eq!(capture.text(), "one two three");
    }

    #[test]
    fn test_overflow_drops_oldest_bytes() {
        let mut router = StreamRouter::new(8);
        let id = SessionId::new(1);
        router.open(id);

        router.deliver(id, b"abcdef");
        router.deliver(id, b"ghijkl");
        assert_eq!(router.buffered_len(id), 8);

        let capture = Capture::default();
        router.bind(id, Box::new(capture.clone()));
        assert_eq!(capture.text(), "efghijkl");
    }

    #[test]
    fn test_close_while_unbound_keeps_transcript() {
        let mut router = StreamRouter::new(1024);
        let id = SessionId::new(3);
        router.open(id);
        router.deliver(id, b"Connection failed: Authentication failed\r\n");
        router.close(id);
        assert!(router.has_route(id));

        let capture = Capture::default();
        router.bind(id, Box::new(capture.clone()));
        assert!(capture.text().contains("Authentication failed"));
        assert!(!router.has_route(id));
    }

    #[test]
    fn test_close_bound_route_stops_delivery() {
        let mut router = StreamRouter::new(1024);
        let id = SessionId::new(1);
        let capture = Capture::default();
        router.open(id);
        router.bind(id, Box::new(capture.clone()));

        router.close(id);
        assert_eq!(router.deliver(id, b"late"), Delivery::Dropped);
        assert_eq!(capture.text(), "");
    }

    #[test]
    fn test_unknown_session_is_a_no_op() {
        let mut router = StreamRouter::new(1024);
        assert_eq!(router.deliver(SessionId::new(9), b"x"), Delivery::Dropped);
        router.close(SessionId::new(9));
        router.discard(SessionId::new(9));
        assert!(router.is_empty());
    }

    #[test]
    fn test_trim_front_splits_chunk() {
        let mut chunks: VecDeque<Bytes> =
            vec![Bytes::from_static(b"abc"), Bytes::from_static(b"def")].into();
        assert_eq!(trim_front(&mut chunks, 4), 4);
        assert_eq!(chunks, VecDeque::from(vec![Bytes::from_static(b"ef")]));
    }
}
