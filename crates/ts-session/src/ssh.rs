//! SSH transport
//!
//! [`RusshTransport`] opens an interactive shell over SSH: TCP connect,
//! key exchange, password or public key authentication, then a PTY and
//! a shell on one session channel. The handshake timeout is applied by
//! the transport adapter around the whole sequence.

use async_trait::async_trait;
use bytes::Bytes;
use russh::client::{self, Config, Handle, Msg};
use russh::{Channel, ChannelMsg, Disconnect};
use russh_keys::key::PublicKey;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

use ts_core::config::ClientConfig;
use ts_core::traits::{RemoteShellTransport, ShellStream};
use ts_core::{ConnectionProfile, Credentials, TransportError};

/// Remote shell transport backed by russh
#[derive(Debug, Clone)]
pub struct RusshTransport {
    keepalive_interval: Duration,
    term: String,
    cols: u32,
    rows: u32,
}

impl RusshTransport {
    /// Create a transport using the PTY and keepalive settings of `config`
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            keepalive_interval: config.keepalive_interval,
            term: config.term.clone(),
            cols: config.initial_cols,
            rows: config.initial_rows,
        }
    }

    async fn establish(
        &self,
        profile: &ConnectionProfile,
    ) -> Result<Box<dyn ShellStream>, TransportError> {
        let address = profile.address();

        tracing::debug!("Opening TCP connection to {}", address);
        let tcp = TcpStream::connect((profile.host.as_str(), profile.port))
            .await
            .map_err(|e| TransportError::NetworkUnreachable(format!("{}: {}", address, e)))?;
        if let Err(e) = tcp.set_nodelay(true) {
            tracing::debug!("Could not set TCP_NODELAY for {}: {}", address, e);
        }

        let config = Arc::new(Config {
            keepalive_interval: Some(self.keepalive_interval),
            ..Default::default()
        });
        let mut handle = client::connect_stream(config, tcp, HostKeyLogger)
            .await
            .map_err(|e| internal(format!("SSH handshake with {} failed", address), e))?;

        tracing::debug!(
            "Authenticating as '{}' using {}",
            profile.username,
            profile.auth.method()
        );
        let authenticated = match &profile.auth {
            Credentials::Password { password } => handle
                .authenticate_password(profile.username.as_str(), password.as_str())
                .await
                .map_err(|e| internal("Authentication error".to_string(), e))?,
            Credentials::PrivateKey { key, passphrase } => {
                let key = russh_keys::decode_secret_key(key, passphrase.as_deref())
                    .map_err(|e| internal("Unable to decode private key".to_string(), e))?;
                handle
                    .authenticate_publickey(profile.username.as_str(), Arc::new(key))
                    .await
                    .map_err(|e| internal("Authentication error".to_string(), e))?
            }
        };
        if !authenticated {
            return Err(TransportError::AuthenticationFailed);
        }

        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| internal("Failed to open session channel".to_string(), e))?;
        channel
            .request_pty(false, &self.term, self.cols, self.rows, 0, 0, &[])
            .await
            .map_err(|e| internal("PTY request failed".to_string(), e))?;
        channel
            .request_shell(true)
            .await
            .map_err(|e| internal("Shell request failed".to_string(), e))?;

        Ok(Box::new(RusshShell { handle, channel }))
    }
}

#[async_trait]
impl RemoteShellTransport for RusshTransport {
    async fn connect(
        &self,
        profile: &ConnectionProfile,
    ) -> Result<Box<dyn ShellStream>, TransportError> {
        self.establish(profile).await
    }
}

fn internal(context: String, err: impl Into<anyhow::Error>) -> TransportError {
    let err = err.into().context(context);
    TransportError::Internal(format!("{:#}", err))
}

/// Client handler that accepts the server's host key
struct HostKeyLogger;

#[async_trait]
impl client::Handler for HostKeyLogger {
    type Error = anyhow::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        tracing::debug!("Server host key: {}", server_public_key.fingerprint());
        Ok(true)
    }
}

/// An open shell channel
struct RusshShell {
    handle: Handle<HostKeyLogger>,
    channel: Channel<Msg>,
}

#[async_trait]
impl ShellStream for RusshShell {
    async fn recv(&mut self) -> Option<Result<Bytes, TransportError>> {
        loop {
            match self.channel.wait().await? {
                ChannelMsg::Data { data } => return Some(Ok(Bytes::copy_from_slice(&data))),
                ChannelMsg::ExtendedData { data, .. } => {
                    return Some(Ok(Bytes::copy_from_slice(&data)))
                }
                ChannelMsg::ExitStatus { exit_status } => {
                    tracing::debug!("Remote shell exited with status {}", exit_status);
                }
                ChannelMsg::Eof | ChannelMsg::Close => return None,
                _ => {}
            }
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.channel
            .data(data)
            .await
            .map_err(|e| internal("Channel write failed".to_string(), e))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Err(e) = self.channel.eof().await {
            tracing::debug!("EOF on closing channel failed: {}", e);
        }
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(|e| internal("Disconnect failed".to_string(), e))
    }
}
