//! ElGamal encryption of arbitrary-length byte messages.
//!
//! Messages are cut into blocks of [`PublicKey::block_size`] bytes (the last
//! one may be shorter). Each block `m` is encrypted on its own:
//!
//! ```text
//! b      <- random in [0, p)
//! shared =  g^b mod p
//! c      = (h^b * m) mod p
//! ```
//!
//! and the unit remembers how many plaintext bytes it carries, because
//! leading zero bytes do not survive the trip through an integer.

use num_bigint::{BigUint, RandBigInt};
use rand::rngs::OsRng;
use thiserror::Error;

use super::keys::{PrivateKey, PublicKey};
use super::prime::mod_inverse;

/// Errors that can occur during ElGamal operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AsymmetricError {
    #[error("Message block is not smaller than the modulus")]
    MessageTooLarge,

    #[error("Recovered block has {got} bytes but the unit records {expected}")]
    SizeMismatch { expected: usize, got: usize },

    #[error("Unit claims {size} bytes but a block carries at most {max}")]
    UnitTooLarge { size: usize, max: usize },

    #[error("Key size of {bits} bits is too small")]
    KeyTooSmall { bits: u64 },

    #[error("Ciphertext unit component is not smaller than the modulus")]
    InvalidUnit,

    #[error("Mask is not invertible modulo p")]
    NotInvertible,

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),
}

/// One encrypted block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CipherUnit {
    /// Ephemeral contribution `g^b mod p`.
    pub shared: BigUint,
    /// Masked block `h^b * m mod p`.
    pub ciphertext: BigUint,
    /// Number of plaintext bytes this unit encodes.
    pub size: usize,
}

/// Encrypts a single integer block.
fn encrypt_block(public: &PublicKey, m: &BigUint, size: usize) -> Result<CipherUnit, AsymmetricError> {
    let p = public.modulus();
    if m >= p {
        return Err(AsymmetricError::MessageTooLarge);
    }

    let b = OsRng.gen_biguint_below(p);
    let shared = public.generator().modpow(&b, p);
    let mask = public.public_value().modpow(&b, p);
    let ciphertext = (mask * m) % p;

    Ok(CipherUnit {
        shared,
        ciphertext,
        size,
    })
}

/// Encrypts `message` for the holder of `public`'s private key.
///
/// An empty message yields no units.
pub fn encrypt(public: &PublicKey, message: &[u8]) -> Result<Vec<CipherUnit>, AsymmetricError> {
    let block_size = public.block_size();
    if block_size == 0 {
        return Err(AsymmetricError::KeyTooSmall { bits: public.bits() });
    }

    message
        .chunks(block_size)
        .map(|chunk| encrypt_block(public, &BigUint::from_bytes_be(chunk), chunk.len()))
        .collect()
}

/// Decrypts a single unit back to its integer block.
fn decrypt_block(private: &PrivateKey, unit: &CipherUnit) -> Result<BigUint, AsymmetricError> {
    let p = private.public_key().modulus();
    if &unit.shared >= p || &unit.ciphertext >= p {
        return Err(AsymmetricError::InvalidUnit);
    }

    let mask = unit.shared.modpow(private.exponent(), p);
    let mask_inv = mod_inverse(&mask, p).ok_or(AsymmetricError::NotInvertible)?;

    Ok((&unit.ciphertext * mask_inv) % p)
}

/// Decrypts units in order and concatenates the recovered blocks.
///
/// A unit may not claim more bytes than one block carries.
pub fn decrypt(private: &PrivateKey, units: &[CipherUnit]) -> Result<Vec<u8>, AsymmetricError> {
    let block_size = private.public_key().block_size();
    if let Some(unit) = units.iter().find(|u| u.size > block_size) {
        return Err(AsymmetricError::UnitTooLarge {
            size: unit.size,
            max: block_size,
        });
    }

    let mut plaintext = Vec::with_capacity(units.iter().map(|u| u.size).sum());

    for unit in units {
        let m = decrypt_block(private, unit)?;
        let bytes = super::keys::to_wire_bytes(&m);

        if bytes.len() > unit.size {
            return Err(AsymmetricError::SizeMismatch {
                expected: unit.size,
                got: bytes.len(),
            });
        }

        // Restore leading zero bytes lost in the integer representation
        plaintext.resize(plaintext.len() + unit.size - bytes.len(), 0);
        plaintext.extend_from_slice(&bytes);
    }

    Ok(plaintext)
}
