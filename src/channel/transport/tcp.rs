//! TCP transport for secure channels.
//!
//! Dialing or accepting a connection runs the full handshake before the
//! channel is handed back.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::debug;

use crate::channel::config::ChannelConfig;
use crate::channel::error::ChannelError;
use crate::channel::session::SecureChannel;

/// Listens for peers and establishes a channel with each one accepted.
pub struct ChannelListener {
    listener: TcpListener,
    config: ChannelConfig,
}

impl ChannelListener {
    /// Bind to an address and start listening.
    pub async fn bind<A: ToSocketAddrs>(addr: A, config: ChannelConfig) -> Result<Self, ChannelError> {
        config.validate()?;
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, config })
    }

    /// Accept the next connection and complete its handshake.
    pub async fn accept(&self) -> Result<(SecureChannel, SocketAddr), ChannelError> {
        let (stream, addr) = self.listener.accept().await?;
        stream.set_nodelay(true)?;
        debug!(%addr, "accepted connection");

        let channel = SecureChannel::establish(stream, &self.config).await?;
        Ok((channel, addr))
    }

    /// Get the local address.
    pub fn local_addr(&self) -> Result<SocketAddr, ChannelError> {
        Ok(self.listener.local_addr()?)
    }
}

/// TCP transport configuration.
#[derive(Debug, Clone, Default)]
pub struct TcpTransport {
    /// Optional bind address for listening.
    pub bind_addr: Option<String>,

    /// Settings applied to every channel.
    pub config: ChannelConfig,
}

impl TcpTransport {
    /// Create a transport with default channel settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bind address for listening.
    pub fn with_bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = Some(addr.into());
        self
    }

    /// Use `config` for every channel.
    pub fn with_config(mut self, config: ChannelConfig) -> Self {
        self.config = config;
        self
    }

    /// Create a listener bound to the configured address.
    pub async fn listen(&self) -> Result<ChannelListener, ChannelError> {
        let addr = self.bind_addr.as_deref().unwrap_or("127.0.0.1:0");
        ChannelListener::bind(addr, self.config.clone()).await
    }

    /// Dial `addr` and complete the handshake.
    pub async fn connect<A: ToSocketAddrs>(&self, addr: A) -> Result<SecureChannel, ChannelError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        debug!(peer = ?stream.peer_addr().ok(), "connected");

        SecureChannel::establish(stream, &self.config).await
    }
}
