//! Remote shell transport traits

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransportError;
use crate::profile::ConnectionProfile;

/// Opens interactive shells on remote hosts
#[async_trait]
pub trait RemoteShellTransport: Send + Sync {
    /// Connect, authenticate and start a shell for `profile`.
    ///
    /// Authentication and network failures are reported as their own
    /// variants. The caller bounds the whole call with the handshake
    /// timeout and drops the future when it expires, so implementations
    /// must not hold resources that outlive a dropped future.
    async fn connect(
        &self,
        profile: &ConnectionProfile,
    ) -> Result<Box<dyn ShellStream>, TransportError>;
}

/// A live duplex byte stream to a remote shell
#[async_trait]
pub trait ShellStream: Send {
    /// Next chunk of shell output.
    ///
    /// Returns `None` once the remote side has closed the shell. Must be
    /// cancel safe: dropping the future loses no data.
    async fn recv(&mut self) -> Option<Result<Bytes, TransportError>>;

    /// Write keystroke bytes to the shell
    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Close the shell and the underlying connection
    async fn close(&mut self) -> Result<(), TransportError>;
}
