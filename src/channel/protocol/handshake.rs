//! Handshake for establishing a secure channel.
//!
//! Both peers run the same steps; there is no initiator/responder split.
//!
//! ## Flow
//!
//! 1. Send our ElGamal public key as three frames (`p`, `g`, `h`), then read the peer's
//! 2. Draw a 32-byte local secret
//! 3. Encrypt it under the peer's key and send: one frame with the unit count,
//!    then per unit the `shared` value, the `ciphertext` value and a 4-byte BE size
//! 4. Read and decrypt the peer's secret
//! 5. Session secret = local XOR peer; the side whose local secret is numerically
//!    larger sends with the first half and receives with the second
//!
//! Every handshake frame is sent in the clear.

use std::cmp::Ordering;
use std::sync::Arc;

use num_bigint::BigUint;
use rand::rngs::OsRng;
use rand::RngCore;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::channel::error::ChannelError;
use crate::channel::protocol::framing::{FrameReader, FrameWriter};
use crate::crypto::{self, to_wire_bytes, Aes128, CipherUnit, PrivateKey, PublicKey, KEY_SIZE};

/// Length of each side's random secret.
pub const SECRET_LEN: usize = 32;

/// Unit count travels in a single byte.
pub const MAX_UNITS: usize = u8::MAX as usize;

/// Handshake progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Nothing exchanged yet.
    Initial,
    /// Public keys and encrypted secrets are being exchanged.
    Exchanging,
    /// Both secrets known; session keys being derived.
    Deriving,
    /// Both direction ciphers are ready.
    Established,
}

/// Where the local 32-byte secret comes from.
pub trait SecretSource: Send {
    /// Produce the secret for one handshake.
    fn local_secret(&mut self) -> [u8; SECRET_LEN];
}

/// Draws secrets from the operating system RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsSecretSource;

impl SecretSource for OsSecretSource {
    fn local_secret(&mut self) -> [u8; SECRET_LEN] {
        let mut secret = [0u8; SECRET_LEN];
        OsRng.fill_bytes(&mut secret);
        secret
    }
}

/// Always returns the same secret. Only meant for tests and reproductions.
#[derive(Clone)]
pub struct FixedSecret(pub [u8; SECRET_LEN]);

impl SecretSource for FixedSecret {
    fn local_secret(&mut self) -> [u8; SECRET_LEN] {
        self.0
    }
}

/// The two 16-byte halves of the session secret, assigned to directions.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SessionKeys {
    /// Key for traffic we send.
    pub send: [u8; KEY_SIZE],
    /// Key for traffic we receive.
    pub recv: [u8; KEY_SIZE],
}

impl SessionKeys {
    /// Combine the two secrets and split the result by direction.
    ///
    /// Secrets are compared as 256-bit big-endian integers, which for equal
    /// length arrays is plain lexicographic order.
    pub fn derive(local: &[u8; SECRET_LEN], peer: &[u8; SECRET_LEN]) -> Result<Self, ChannelError> {
        let mut session = [0u8; SECRET_LEN];
        for (i, byte) in session.iter_mut().enumerate() {
            *byte = local[i] ^ peer[i];
        }

        let mut first = [0u8; KEY_SIZE];
        let mut second = [0u8; KEY_SIZE];
        first.copy_from_slice(&session[..KEY_SIZE]);
        second.copy_from_slice(&session[KEY_SIZE..]);
        session.zeroize();

        match local.cmp(peer) {
            Ordering::Greater => Ok(Self {
                send: first,
                recv: second,
            }),
            Ordering::Less => Ok(Self {
                send: second,
                recv: first,
            }),
            Ordering::Equal => Err(ChannelError::SecretCollision),
        }
    }

    /// Build the `(send, recv)` cipher pair.
    pub fn ciphers(&self) -> Result<(Aes128, Aes128), ChannelError> {
        Ok((Aes128::new(&self.send)?, Aes128::new(&self.recv)?))
    }
}

/// Everything the channel keeps from a finished handshake.
pub struct HandshakeOutcome {
    /// Our key pair.
    pub local_key: PrivateKey,
    /// The peer's public key.
    pub peer_key: Arc<PublicKey>,
    /// Cipher for the outbound direction.
    pub send_cipher: Aes128,
    /// Cipher for the inbound direction.
    pub recv_cipher: Aes128,
}

/// Handshake state machine over a framed connection.
pub struct Handshake {
    state: HandshakeState,
    local_key: PrivateKey,
    peer_key: Option<Arc<PublicKey>>,
    ciphers: Option<(Aes128, Aes128)>,
}

impl Handshake {
    /// Start a handshake with our freshly generated key pair.
    pub fn new(local_key: PrivateKey) -> Self {
        Self {
            state: HandshakeState::Initial,
            local_key,
            peer_key: None,
            ciphers: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// The peer's public key, once received.
    pub fn peer_key(&self) -> Option<&Arc<PublicKey>> {
        self.peer_key.as_ref()
    }

    /// Drive the exchange to completion.
    ///
    /// On error the state stays where it failed and the handshake cannot be resumed.
    pub async fn run<R, W, S>(
        &mut self,
        reader: &mut FrameReader<R>,
        writer: &mut FrameWriter<W>,
        secrets: &mut S,
    ) -> Result<(), ChannelError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
        S: SecretSource + ?Sized,
    {
        if self.state != HandshakeState::Initial {
            return Err(ChannelError::Protocol(format!(
                "handshake already in state {:?}",
                self.state
            )));
        }
        self.state = HandshakeState::Exchanging;

        write_public_key(writer, self.local_key.public_key()).await?;
        let peer_key = Arc::new(read_public_key(reader).await?);
        debug!(
            peer_bits = peer_key.bits(),
            peer = %peer_key.fingerprint_hex(),
            "public keys exchanged"
        );

        let mut local_secret = secrets.local_secret();
        let units = crypto::encrypt(&peer_key, &local_secret)?;
        write_units(writer, &units).await?;
        self.peer_key = Some(peer_key);

        let peer_units = read_units(reader).await?;
        let mut peer_plain = crypto::decrypt(&self.local_key, &peer_units)?;
        let mut peer_secret: [u8; SECRET_LEN] =
            peer_plain.as_slice().try_into().map_err(|_| {
                ChannelError::Protocol(format!(
                    "peer secret has {} bytes, expected {}",
                    peer_plain.len(),
                    SECRET_LEN
                ))
            })?;
        peer_plain.zeroize();
        debug!(units = peer_units.len(), "secrets exchanged");

        self.state = HandshakeState::Deriving;
        let keys = SessionKeys::derive(&local_secret, &peer_secret);
        local_secret.zeroize();
        peer_secret.zeroize();

        self.ciphers = Some(keys?.ciphers()?);
        self.state = HandshakeState::Established;
        debug!("session keys derived");
        Ok(())
    }

    /// Consume a completed handshake.
    pub fn finish(self) -> Result<HandshakeOutcome, ChannelError> {
        match (self.state, self.peer_key, self.ciphers) {
            (HandshakeState::Established, Some(peer_key), Some((send_cipher, recv_cipher))) => {
                Ok(HandshakeOutcome {
                    local_key: self.local_key,
                    peer_key,
                    send_cipher,
                    recv_cipher,
                })
            }
            _ => Err(ChannelError::HandshakeIncomplete),
        }
    }
}

/// Read a frame the handshake cannot do without.
async fn expect_frame<R: AsyncRead + Unpin>(
    reader: &mut FrameReader<R>,
    what: &str,
) -> Result<Vec<u8>, ChannelError> {
    reader.read_frame().await?.ok_or_else(|| {
        ChannelError::Protocol(format!("connection closed while waiting for {}", what))
    })
}

/// Send `p`, `g`, `h` as three frames.
pub async fn write_public_key<W: AsyncWrite + Unpin>(
    writer: &mut FrameWriter<W>,
    key: &PublicKey,
) -> Result<(), ChannelError> {
    for field in key.to_wire_fields() {
        writer.write_frame(&field).await?;
    }
    Ok(())
}

/// Receive `p`, `g`, `h` and validate them.
pub async fn read_public_key<R: AsyncRead + Unpin>(
    reader: &mut FrameReader<R>,
) -> Result<PublicKey, ChannelError> {
    let p = expect_frame(reader, "peer modulus").await?;
    let g = expect_frame(reader, "peer generator").await?;
    let h = expect_frame(reader, "peer public value").await?;
    Ok(PublicKey::from_wire_fields(&p, &g, &h)?)
}

/// Send the unit count, then `shared`, `ciphertext`, size for each unit.
pub async fn write_units<W: AsyncWrite + Unpin>(
    writer: &mut FrameWriter<W>,
    units: &[CipherUnit],
) -> Result<(), ChannelError> {
    let count = u8::try_from(units.len()).map_err(|_| {
        ChannelError::Protocol(format!(
            "{} ciphertext units exceed the limit of {}",
            units.len(),
            MAX_UNITS
        ))
    })?;
    writer.write_frame(&[count]).await?;

    for unit in units {
        let size = u32::try_from(unit.size)
            .map_err(|_| ChannelError::Protocol(format!("unit size {} too large", unit.size)))?;
        writer.write_frame(&to_wire_bytes(&unit.shared)).await?;
        writer.write_frame(&to_wire_bytes(&unit.ciphertext)).await?;
        writer.write_frame(&size.to_be_bytes()).await?;
    }
    Ok(())
}

/// Receive a unit list written by [`write_units`].
pub async fn read_units<R: AsyncRead + Unpin>(
    reader: &mut FrameReader<R>,
) -> Result<Vec<CipherUnit>, ChannelError> {
    let count = expect_frame(reader, "unit count").await?;
    let count = match count.as_slice() {
        [n] => *n as usize,
        other => {
            return Err(ChannelError::Protocol(format!(
                "unit count frame has {} bytes, expected 1",
                other.len()
            )))
        }
    };

    let mut units = Vec::with_capacity(count);
    for _ in 0..count {
        let shared = BigUint::from_bytes_be(&expect_frame(reader, "unit shared value").await?);
        let ciphertext = BigUint::from_bytes_be(&expect_frame(reader, "unit ciphertext").await?);
        let size = expect_frame(reader, "unit size").await?;
        let size: [u8; 4] = size.as_slice().try_into().map_err(|_| {
            ChannelError::Protocol(format!("unit size frame has {} bytes, expected 4", size.len()))
        })?;

        units.push(CipherUnit {
            shared,
            ciphertext,
            size: u32::from_be_bytes(size) as usize,
        });
    }
    Ok(units)
}
