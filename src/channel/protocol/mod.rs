//! Wire protocol for the secure channel.
//!
//! - [`framing`]: length-prefixed, block-padded frames with optional AES-128
//! - [`handshake`]: ElGamal public-key exchange and session key derivation

pub mod framing;
pub mod handshake;

pub use framing::{encode_frame, padded_len, FrameReader, FrameWriter, LENGTH_PREFIX_LEN};
pub use handshake::{
    read_public_key, read_units, write_public_key, write_units, FixedSecret, Handshake,
    HandshakeOutcome, HandshakeState, OsSecretSource, SecretSource, SessionKeys, MAX_UNITS,
    SECRET_LEN,
};
