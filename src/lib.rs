//! # cipherlink - private point-to-point channels
//!
//! cipherlink connects two peers over any byte stream and protects the
//! traffic with primitives implemented from their definitions.
//!
//! ## Overview
//!
//! - **AES-128** built from FIPS-197: GF(2^8) arithmetic, S-box tables derived at compile time
//! - **ElGamal** over a freshly generated prime, used once per connection to carry a secret
//! - **Handshake**: each side sends its public key, then its own 32-byte secret encrypted
//!   under the peer's key; the XOR of both secrets gives one AES key per direction
//! - **Framing**: 8-byte big-endian length, payload zero-padded to 16 bytes and
//!   encrypted block by block
//! - **Pipelines**: one tokio task per direction, fed by bounded queues
//!
//! ## Security Model
//!
//! This is a teaching-grade protocol. There is no peer authentication, no
//! integrity check on frames and no chaining between blocks; compare key
//! fingerprints out of band before trusting a peer.
//!
//! ## Example Usage
//!
//! ```no_run
//! use cipherlink::channel::{ChannelConfig, TcpTransport};
//!
//! # async fn run() -> Result<(), cipherlink::channel::ChannelError> {
//! let transport = TcpTransport::new().with_config(ChannelConfig::default());
//! let mut channel = transport.connect("127.0.0.1:9000").await?;
//!
//! println!("peer fingerprint: {}", channel.peer_key().fingerprint_hex());
//! channel.send("hello").await?;
//!
//! while let Some(message) = channel.recv().await? {
//!     println!("{}", String::from_utf8_lossy(&message));
//! }
//! # Ok(())
//! # }
//! ```

/// Crate version, as shown by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod channel;
pub mod crypto;
pub mod logging;

// Re-export commonly used types at the crate root
pub use channel::{
    ChannelConfig, ChannelError, ChannelListener, ChannelSender, SecureChannel, TcpTransport,
};
pub use crypto::{keygen, Aes128, PrivateKey, PublicKey};
pub use logging::init_logging;
