//! Secure point-to-point channel.
//!
//! ## Lifecycle
//!
//! 1. A connection is dialed or accepted ([`TcpTransport`], [`ChannelListener`]),
//!    or any `AsyncRead + AsyncWrite` stream is handed to [`SecureChannel::establish`]
//! 2. Both sides exchange ElGamal public keys and encrypted 32-byte secrets
//! 3. The XOR of the secrets is split into one AES-128 key per direction
//! 4. An outbound and an inbound task move framed, encrypted messages until
//!    the connection closes
//!
//! ## Limitations
//!
//! Peers are not authenticated, so an active man-in-the-middle goes
//! unnoticed; compare [`PublicKey::fingerprint_hex`](crate::crypto::PublicKey::fingerprint_hex)
//! out of band. Payload blocks are encrypted independently (no chaining, no
//! nonce), so equal plaintext blocks give equal ciphertext blocks and frames
//! carry no integrity protection.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod protocol;
pub mod session;
pub mod transport;

pub use config::{ChannelConfig, ConfigError};
pub use error::ChannelError;
pub use protocol::{FixedSecret, HandshakeState, OsSecretSource, SecretSource, SessionKeys};
pub use session::{ChannelSender, SecureChannel};
pub use transport::{ChannelListener, TcpTransport};
