//! Transport adapter
//!
//! One adapter drives one remote shell from handshake to teardown. It
//! runs as its own task and talks to the registry through a shared
//! notification channel, so the registry never awaits network I/O.
//!
//! Whatever happens (handshake failure, remote close, cancellation
//! mid-handshake, local close) the adapter emits exactly one
//! [`AdapterEventKind::Closed`] and it is always the last event for its
//! session.

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use ts_core::traits::{RemoteShellTransport, ShellStream};
use ts_core::{ConnectionProfile, ProfileId, SessionId, TransportError};

/// Notification from an adapter task to the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterEvent {
    pub session_id: SessionId,
    pub profile_id: ProfileId,
    pub kind: AdapterEventKind,
}

/// What an adapter observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterEventKind {
    /// Handshake complete, shell open
    Opened,
    /// Output from the remote shell
    Data(Bytes),
    /// Transport failure
    Error(TransportError),
    /// Terminal event; nothing follows it
    Closed,
}

enum AdapterCommand {
    Write(Bytes),
    Close {
        reply: oneshot::Sender<Result<(), TransportError>>,
    },
}

/// Handle used by the registry to drive a running adapter.
///
/// Cloning is cheap; all clones address the same task.
#[derive(Clone)]
pub struct AdapterHandle {
    session_id: SessionId,
    cmd_tx: mpsc::UnboundedSender<AdapterCommand>,
    cancel: CancellationToken,
}

impl AdapterHandle {
    /// Session this adapter serves
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Queue keystroke bytes for the remote shell
    pub fn write(&self, data: Bytes) -> Result<(), TransportError> {
        self.cmd_tx
            .send(AdapterCommand::Write(data))
            .map_err(|_| TransportError::Internal(format!("{} is closed", self.session_id)))
    }

    /// Close the shell and wait for the transport to finish closing.
    ///
    /// Idempotent: once the adapter task has exited, this returns `Ok`.
    /// A close issued during the handshake cancels it.
    pub async fn close(&self) -> Result<(), TransportError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(AdapterCommand::Close { reply: reply_tx })
            .is_err()
        {
            return Ok(());
        }
        self.cancel.cancel();
        reply_rx.await.unwrap_or(Ok(()))
    }

}

impl std::fmt::Debug for AdapterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterHandle")
            .field("session_id", &self.session_id)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// The adapter task itself; run it with `tokio::spawn(adapter.run())`
pub struct TransportAdapter {
    session_id: SessionId,
    profile: ConnectionProfile,
    transport: Arc<dyn RemoteShellTransport>,
    timeout: Duration,
    events: mpsc::Sender<AdapterEvent>,
    cmd_rx: mpsc::UnboundedReceiver<AdapterCommand>,
    cancel: CancellationToken,
}

impl TransportAdapter {
    /// Prepare an adapter for `profile` without starting it.
    ///
    /// The handle is returned first so the caller can record it before
    /// any event can be observed.
    pub fn new(
        session_id: SessionId,
        profile: ConnectionProfile,
        transport: Arc<dyn RemoteShellTransport>,
        timeout: Duration,
        events: mpsc::Sender<AdapterEvent>,
    ) -> (AdapterHandle, Self) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let handle = AdapterHandle {
            session_id,
            cmd_tx,
            cancel: cancel.clone(),
        };
        let adapter = Self {
            session_id,
            profile,
            transport,
            timeout,
            events,
            cmd_rx,
            cancel,
        };
        (handle, adapter)
    }

    /// Run the handshake, then pump bytes until the shell closes
    pub async fn run(mut self) {
        tracing::debug!(
            "{}: connecting to {} as {} ({})",
            self.session_id,
            self.profile.address(),
            self.profile.username,
            self.profile.auth.method()
        );

        let connect = tokio::time::timeout(
            self.timeout,
            self.transport.connect(&self.profile),
        );

        let handshake = tokio::select! {
            biased;

            _ = self.cancel.cancelled() => None,
            result = connect => Some(result),
        };

        let mut stream = match handshake {
            None => {
                tracing::debug!("{}: handshake cancelled", self.session_id);
                self.finish(Ok(())).await;
                return;
            }
            Some(Ok(Ok(stream))) => stream,
            Some(Ok(Err(e))) => {
                tracing::warn!("{}: connection failed: {}", self.session_id, e);
                self.emit(AdapterEventKind::Error(e)).await;
                self.finish(Ok(())).await;
                return;
            }
            Some(Err(_)) => {
                tracing::warn!(
                    "{}: handshake timed out after {:?}",
                    self.session_id,
                    self.timeout
                );
                self.emit(AdapterEventKind::Error(TransportError::HandshakeTimeout))
                    .await;
                self.finish(Ok(())).await;
                return;
            }
        };

        tracing::info!("{}: shell open on {}", self.session_id, self.profile.address());
        self.emit(AdapterEventKind::Opened).await;

        let close_result = self.pump(stream.as_mut()).await;
        self.finish(close_result).await;
    }

    async fn pump(&mut self, stream: &mut dyn ShellStream) -> Result<(), TransportError> {
        loop {
            tokio::select! {
                biased;

                cmd = self.cmd_rx.recv() => match cmd {
                    Some(AdapterCommand::Write(data)) => {
                        if let Err(e) = stream.write(&data).await {
                            tracing::warn!("{}: write failed: {}", self.session_id, e);
                            self.emit(AdapterEventKind::Error(e)).await;
                            return stream.close().await;
                        }
                    }
                    Some(AdapterCommand::Close { reply }) => {
                        let result = stream.close().await;
                        let _ = reply.send(result.clone());
                        return result;
                    }
                    None => {
                        tracing::debug!("{}: all handles dropped, closing", self.session_id);
                        return stream.close().await;
                    }
                },

                _ = self.cancel.cancelled() => {
                    return stream.close().await;
                }

                chunk = stream.recv() => match chunk {
                    Some(Ok(data)) => {
                        tracing::trace!("{}: {} bytes from remote", self.session_id, data.len());
                        self.emit(AdapterEventKind::Data(data)).await;
                    }
                    Some(Err(e)) => {
                        tracing::warn!("{}: stream error: {}", self.session_id, e);
                        self.emit(AdapterEventKind::Error(e)).await;
                        if let Err(e) = stream.close().await {
                            tracing::debug!("{}: close after error failed: {}", self.session_id, e);
                        }
                        return Ok(());
                    }
                    None => {
                        tracing::info!("{}: remote closed the shell", self.session_id);
                        return Ok(());
                    }
                },
            }
        }
    }

    /// Answer close requests still queued, then emit the final `Closed`
    async fn finish(&mut self, result: Result<(), TransportError>) {
        self.cmd_rx.close();
        while let Ok(cmd) = self.cmd_rx.try_recv() {
            if let AdapterCommand::Close { reply } = cmd {
                let _ = reply.send(result.clone());
            }
        }
        self.cancel.cancel();

        let closed = self.event(AdapterEventKind::Closed);
        if self.events.send(closed).await.is_err() {
            tracing::debug!("{}: registry gone, Closed dropped", self.session_id);
        }
    }

    /// Report an observation, giving up once the adapter is cancelled.
    ///
    /// A full notification channel must not keep a close request waiting.
    async fn emit(&self, kind: AdapterEventKind) {
        let event = self.event(kind);
        tokio::select! {
            biased;

            sent = self.events.send(event) => {
                if sent.is_err() {
                    tracing::debug!("{}: registry gone, event dropped", self.session_id);
                }
            }
            _ = self.cancel.cancelled() => {
                tracing::debug!("{}: closing, event dropped", self.session_id);
            }
        }
    }

    fn event(&self, kind: AdapterEventKind) -> AdapterEvent {
        AdapterEvent {
            session_id: self.session_id,
            profile_id: self.profile.id.clone(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::{Handshake, ScriptedTransport};

    fn spawn(
        transport: &ScriptedTransport,
        profile: &ConnectionProfile,
        timeout: Duration,
    ) -> (AdapterHandle, mpsc::Receiver<AdapterEvent>) {
        let (tx, rx) = mpsc::channel(64);
        let (handle, adapter) = TransportAdapter::new(
            SessionId::new(1),
            profile.clone(),
            Arc::new(transport.clone()),
            timeout,
            tx,
        );
        tokio::spawn(adapter.run());
        (handle, rx)
    }

    async fn kinds(rx: &mut mpsc::Receiver<AdapterEvent>) -> Vec<AdapterEventKind> {
        let mut out = Vec::new();
        while let Some(event) = rx.recv().await {
            let done = event.kind == AdapterEventKind::Closed;
            out.push(event.kind);
            if done {
                break;
            }
        }
        out
    }

    #[tokio::test]
    async fn test_open_data_remote_close() {
        let transport = ScriptedTransport::new();
        let profile = ConnectionProfile::with_password("a", "host-a", "root", "pw");
        let (_handle, mut rx) = spawn(&transport, &profile, Duration::from_secs(5));

        let remote = transport.wait_for_remote(&profile.id).await;
        remote.send(b"hello");
        remote.hang_up();

        assert_eq!(
            kinds(&mut rx).await,
            vec![
                AdapterEventKind::Opened,
                AdapterEventKind::Data(Bytes::from_static(b"hello")),
                AdapterEventKind::Closed,
            ]
        );
    }

    #[tokio::test]
    async fn test_auth_failure_emits_error_then_closed() {
        let transport = ScriptedTransport::new();
        let profile = ConnectionProfile::with_password("a", "host-a", "root", "bad");
        transport.script(
            &profile.id,
            Handshake::Fail(TransportError::AuthenticationFailed),
        );
        let (_handle, mut rx) = spawn(&transport, &profile, Duration::from_secs(5));

        assert_eq!(
            kinds(&mut rx).await,
            vec![
                AdapterEventKind::Error(TransportError::AuthenticationFailed),
                AdapterEventKind::Closed,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_handshake_times_out() {
        let transport = ScriptedTransport::new();
        let profile = ConnectionProfile::with_password("a", "host-a", "root", "pw");
        transport.script(&profile.id, Handshake::Hang);
        let (_handle, mut rx) = spawn(&transport, &profile, Duration::from_secs(45));

        assert_eq!(
            kinds(&mut rx).await,
            vec![
                AdapterEventKind::Error(TransportError::HandshakeTimeout),
                AdapterEventKind::Closed,
            ]
        );
    }

    #[tokio::test]
    async fn test_close_during_handshake_cancels() {
        let transport = ScriptedTransport::new();
        let profile = ConnectionProfile::with_password("a", "host-a", "root", "pw");
        transport.script(&profile.id, Handshake::Hang);
        let (handle, mut rx) = spawn(&transport, &profile, Duration::from_secs(45));

        handle.close().await.unwrap();
        assert_eq!(kinds(&mut rx).await, vec![AdapterEventKind::Closed]);

        // Closing again after exit is a no-op
        handle.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_writes_reach_remote() {
        let transport = ScriptedTransport::new();
        let profile = ConnectionProfile::with_password("a", "host-a", "root", "pw");
        let (handle, mut rx) = spawn(&transport, &profile, Duration::from_secs(5));
        assert_eq!(rx.recv().await.unwrap().kind, AdapterEventKind::Opened);

        let remote = transport.wait_for_remote(&profile.id).await;
        handle.write(Bytes::from_static(b"ls\r")).unwrap();
        handle.close().await.unwrap();

        assert_eq!(remote.written(), b"ls\r".to_vec());
        assert!(remote.is_closed());
        assert_eq!(kinds(&mut rx).await, vec![AdapterEventKind::Closed]);
    }
}
