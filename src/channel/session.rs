//! The established secure channel.
//!
//! A `SecureChannel` owns one connection. Construction generates an ElGamal
//! key pair, runs the handshake to completion and only then hands the two
//! halves of the stream to their pipeline tasks. All sensitive key material
//! lives inside the per-direction ciphers, which zeroize on drop.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, BufReader, BufWriter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::channel::config::ChannelConfig;
use crate::channel::error::ChannelError;
use crate::channel::pipeline::{inbound_loop, outbound_loop, Inbound};
use crate::channel::protocol::{
    FrameReader, FrameWriter, Handshake, HandshakeOutcome, OsSecretSource, SecretSource,
};
use crate::crypto::{PrivateKey, PublicKey};

/// Cloneable handle for queueing outbound messages.
///
/// Stays usable after the owning channel moves to another task, but stops
/// accepting messages once the outbound task has ended.
#[derive(Clone)]
pub struct ChannelSender {
    queue: mpsc::Sender<Vec<u8>>,
    max_frame_len: u64,
}

impl ChannelSender {
    /// Queue one message; waits while the outbound queue is full.
    pub async fn send(&self, message: impl Into<Vec<u8>>) -> Result<(), ChannelError> {
        let message = message.into();
        let len = message.len() as u64;
        if len > self.max_frame_len {
            return Err(ChannelError::FrameTooLarge {
                len,
                max: self.max_frame_len,
            });
        }
        self.queue
            .send(message)
            .await
            .map_err(|_| ChannelError::Closed)
    }

    /// Whether the outbound task has stopped.
    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }
}

/// An encrypted, framed, full-duplex channel to one peer.
pub struct SecureChannel {
    local_key: PrivateKey,
    peer_key: Arc<PublicKey>,
    established: bool,
    sender: Option<ChannelSender>,
    inbound: mpsc::Receiver<Inbound>,
    outbound_task: Option<JoinHandle<Result<(), ChannelError>>>,
    inbound_task: JoinHandle<()>,
}

impl SecureChannel {
    /// Run the handshake over `stream` with OS randomness and start the pipelines.
    pub async fn establish<T>(stream: T, config: &ChannelConfig) -> Result<Self, ChannelError>
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::establish_with(stream, config, &mut OsSecretSource).await
    }

    /// Like [`establish`](Self::establish) but drawing the local secret from `secrets`.
    pub async fn establish_with<T, S>(
        stream: T,
        config: &ChannelConfig,
        secrets: &mut S,
    ) -> Result<Self, ChannelError>
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
        S: SecretSource + ?Sized,
    {
        config.validate()?;

        // Prime search is CPU-bound; keep it off the async workers
        let bits = config.key_bits;
        let local_key = tokio::task::spawn_blocking(move || PrivateKey::generate(bits))
            .await
            .map_err(|e| ChannelError::TaskFailed(format!("key generation: {}", e)))??;
        debug!(
            bits,
            local = %local_key.public_key().fingerprint_hex(),
            "generated ElGamal key pair"
        );

        Self::establish_with_key(stream, config, local_key, secrets).await
    }

    /// Establish using an already generated key pair.
    pub async fn establish_with_key<T, S>(
        stream: T,
        config: &ChannelConfig,
        local_key: PrivateKey,
        secrets: &mut S,
    ) -> Result<Self, ChannelError>
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
        S: SecretSource + ?Sized,
    {
        config.validate()?;

        let (read_half, write_half) = tokio::io::split(stream);
        let mut reader = FrameReader::new(BufReader::new(read_half), config.max_frame_len);
        let mut writer = FrameWriter::new(BufWriter::new(write_half), config.max_frame_len);

        let mut handshake = Handshake::new(local_key);
        handshake.run(&mut reader, &mut writer, secrets).await?;
        let HandshakeOutcome {
            local_key,
            peer_key,
            send_cipher,
            recv_cipher,
        } = handshake.finish()?;

        writer.install_cipher(send_cipher);
        reader.install_cipher(recv_cipher);

        let (out_tx, out_rx) = mpsc::channel(config.send_queue_depth);
        let (in_tx, in_rx) = mpsc::channel(config.recv_queue_depth);
        let outbound_task = tokio::spawn(outbound_loop(writer, out_rx));
        let inbound_task = tokio::spawn(inbound_loop(reader, in_tx));

        info!(
            peer = %peer_key.fingerprint_hex(),
            peer_bits = peer_key.bits(),
            "secure channel established"
        );

        Ok(Self {
            local_key,
            peer_key,
            established: true,
            sender: Some(ChannelSender {
                queue: out_tx,
                max_frame_len: config.max_frame_len,
            }),
            inbound: in_rx,
            outbound_task: Some(outbound_task),
            inbound_task,
        })
    }

    /// Whether both direction ciphers are in place.
    pub fn is_established(&self) -> bool {
        self.established
    }

    /// The peer's ElGamal public key as received during the handshake.
    pub fn peer_key(&self) -> &Arc<PublicKey> {
        &self.peer_key
    }

    /// Our own ElGamal public key.
    pub fn local_public_key(&self) -> &Arc<PublicKey> {
        self.local_key.public_key()
    }

    /// Queue `message` for sending. Messages go out in the order they are queued.
    pub async fn send(&self, message: impl Into<Vec<u8>>) -> Result<(), ChannelError> {
        self.sender()?.send(message).await
    }

    /// A cloneable handle for sending from other tasks.
    pub fn sender(&self) -> Result<ChannelSender, ChannelError> {
        if !self.established {
            return Err(ChannelError::HandshakeIncomplete);
        }
        self.sender.clone().ok_or(ChannelError::Closed)
    }

    /// Wait for the next message.
    ///
    /// Returns `Ok(None)` once the peer has closed the connection cleanly; the
    /// error that stopped the inbound direction is returned once.
    pub async fn recv(&mut self) -> Result<Option<Vec<u8>>, ChannelError> {
        if !self.established {
            return Err(ChannelError::HandshakeIncomplete);
        }
        self.inbound.recv().await.transpose()
    }

    /// Stop sending, wait for queued messages to be written and close our write half.
    ///
    /// Returns the error that ended the outbound task, if any. Outstanding
    /// handles from [`sender`](Self::sender) keep the queue open, so drop them first.
    pub async fn close(mut self) -> Result<(), ChannelError> {
        self.sender = None;
        let Some(task) = self.outbound_task.take() else {
            return Ok(());
        };
        let result = task
            .await
            .map_err(|e| ChannelError::TaskFailed(format!("outbound pipeline: {}", e)))?;
        debug!("secure channel closed");
        result
    }
}

impl Drop for SecureChannel {
    fn drop(&mut self) {
        if let Some(task) = &self.outbound_task {
            task.abort();
        }
        self.inbound_task.abort();
    }
}

impl std::fmt::Debug for SecureChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureChannel")
            .field("established", &self.established)
            .field("local", &self.local_key.public_key().fingerprint_hex())
            .field("peer", &self.peer_key.fingerprint_hex())
            .finish()
    }
}
