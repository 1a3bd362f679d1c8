//! Cryptographic primitives for cipherlink.
//!
//! This module provides:
//! - AES-128 block encryption built from FIPS-197 (GF(2^8) tables derived at compile time)
//! - ElGamal key generation over a random prime modulus
//! - ElGamal encryption of arbitrary-length messages as a list of ciphertext units
//!
//! Neither primitive is hardened against side channels.

pub mod asymmetric;
pub mod gf;
pub mod keys;
pub mod prime;
pub mod symmetric;

pub use asymmetric::{decrypt, encrypt, AsymmetricError, CipherUnit};
pub use keys::{keygen, to_wire_bytes, PrivateKey, PublicKey, MIN_KEY_BITS};
pub use symmetric::{Aes128, Block, SymmetricError, BLOCK_SIZE, KEY_SIZE};
