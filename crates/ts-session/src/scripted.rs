//! Scripted in-memory transport
//!
//! Stands in for SSH when exercising the session core without a network.
//! Each profile can be given a handshake script; every accepted
//! connection exposes a [`RemoteEnd`] through which a test plays the
//! remote host: pushing output, hanging up, and inspecting keystrokes.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

use ts_core::traits::{RemoteShellTransport, ShellStream};
use ts_core::{ConnectionProfile, ProfileId, TransportError};

/// How the handshake for a profile plays out
#[derive(Debug, Clone)]
pub enum Handshake {
    /// Succeed immediately
    Accept,
    /// Succeed after a delay
    AcceptAfter(Duration),
    /// Fail with the given error
    Fail(TransportError),
    /// Never complete
    Hang,
}

#[derive(Debug, Clone)]
struct Script {
    handshake: Handshake,
    close_error: Option<TransportError>,
    close_stalls: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            handshake: Handshake::Accept,
            close_error: None,
            close_stalls: false,
        }
    }
}

enum Output {
    Data(Bytes),
    Error(TransportError),
    Eof,
}

#[derive(Default)]
struct ScriptState {
    scripts: Mutex<HashMap<ProfileId, Script>>,
    remotes: Mutex<HashMap<ProfileId, RemoteEnd>>,
    connects: AtomicUsize,
    remote_ready: Notify,
}

/// Transport whose behaviour is scripted per profile
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    state: Arc<ScriptState>,
}

impl ScriptedTransport {
    /// Transport that accepts every profile
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the handshake behaviour for a profile
    pub fn script(&self, profile: &ProfileId, handshake: Handshake) {
        let mut scripts = self.state.scripts.lock().unwrap_or_else(|e| e.into_inner());
        scripts.entry(profile.clone()).or_default().handshake = handshake;
    }

    /// Make closing this profile's shell fail with `error`
    pub fn fail_close(&self, profile: &ProfileId, error: TransportError) {
        let mut scripts = self.state.scripts.lock().unwrap_or_else(|e| e.into_inner());
        scripts.entry(profile.clone()).or_default().close_error = Some(error);
    }

    /// Make closing this profile's shell never complete
    pub fn stall_close(&self, profile: &ProfileId) {
        let mut scripts = self.state.scripts.lock().unwrap_or_else(|e| e.into_inner());
        scripts.entry(profile.clone()).or_default().close_stalls = true;
    }

    /// Number of connect calls seen so far
    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Remote end of the most recent shell opened for a profile
    pub fn remote(&self, profile: &ProfileId) -> Option<RemoteEnd> {
        let remotes = self.state.remotes.lock().unwrap_or_else(|e| e.into_inner());
        remotes.get(profile).cloned()
    }

    /// Wait until a shell has been opened for a profile
    pub async fn wait_for_remote(&self, profile: &ProfileId) -> RemoteEnd {
        loop {
            let notified = self.state.remote_ready.notified();
            if let Some(remote) = self.remote(profile) {
                return remote;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl RemoteShellTransport for ScriptedTransport {
    async fn connect(
        &self,
        profile: &ConnectionProfile,
    ) -> Result<Box<dyn ShellStream>, TransportError> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        let script = {
            let scripts = self.state.scripts.lock().unwrap_or_else(|e| e.into_inner());
            scripts.get(&profile.id).cloned().unwrap_or_default()
        };

        match script.handshake {
            Handshake::Accept => {}
            Handshake::AcceptAfter(delay) => tokio::time::sleep(delay).await,
            Handshake::Fail(e) => return Err(e),
            Handshake::Hang => std::future::pending::<()>().await,
        }

        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let remote = RemoteEnd {
            output: output_tx,
            written: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
        };
        let shell = ScriptedShell {
            output: output_rx,
            written: remote.written.clone(),
            closed: remote.closed.clone(),
            close_error: script.close_error,
            close_stalls: script.close_stalls,
        };

        self.state
            .remotes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(profile.id.clone(), remote);
        self.state.remote_ready.notify_waiters();

        Ok(Box::new(shell))
    }
}

/// The remote host's side of a scripted shell
#[derive(Clone)]
pub struct RemoteEnd {
    output: mpsc::UnboundedSender<Output>,
    written: Arc<Mutex<Vec<u8>>>,
    closed: Arc<AtomicBool>,
}

impl RemoteEnd {
    /// Emit shell output
    pub fn send(&self, data: &[u8]) {
        let _ = self.output.send(Output::Data(Bytes::copy_from_slice(data)));
    }

    /// Break the stream with a transport error
    pub fn fail(&self, error: TransportError) {
        let _ = self.output.send(Output::Error(error));
    }

    /// Close the shell from the remote side
    pub fn hang_up(&self) {
        let _ = self.output.send(Output::Eof);
    }

    /// Everything the client has written so far
    pub fn written(&self) -> Vec<u8> {
        self.written.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Whether the client closed the shell
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct ScriptedShell {
    output: mpsc::UnboundedReceiver<Output>,
    written: Arc<Mutex<Vec<u8>>>,
    closed: Arc<AtomicBool>,
    close_error: Option<TransportError>,
    close_stalls: bool,
}

#[async_trait]
impl ShellStream for ScriptedShell {
    async fn recv(&mut self) -> Option<Result<Bytes, TransportError>> {
        match self.output.recv().await? {
            Output::Data(data) => Some(Ok(data)),
            Output::Error(e) => Some(Err(e)),
            Output::Eof => None,
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Internal("shell is closed".to_string()));
        }
        self.written
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(data);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.close_stalls {
            std::future::pending::<()>().await;
        }
        self.closed.store(true, Ordering::SeqCst);
        match self.close_error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
