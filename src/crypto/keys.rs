//! ElGamal key generation and public-key handling.
//!
//! A public key is the triple `(p, g, h)` with `h = g^a mod p`; the private
//! key is the exponent `a` plus a shared handle to its public key.
//!
//! KNOWN WEAKNESS: `g` is sampled uniformly from `[0, p)` and never checked
//! to generate a large subgroup. This matches the wire protocol's peers and
//! is kept as is; it is not a sound ElGamal parameter choice.

use std::sync::Arc;

use num_bigint::{BigUint, RandBigInt};
use num_traits::Zero;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use super::asymmetric::AsymmetricError;
use super::prime::generate_prime;

/// Smallest modulus that still carries one byte per ElGamal block.
pub const MIN_KEY_BITS: u64 = 16;

/// Public half of an ElGamal key pair.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    p: BigUint,
    g: BigUint,
    h: BigUint,
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicKey")
            .field("bits", &self.p.bits())
            .field("fingerprint", &self.fingerprint_hex())
            .finish()
    }
}

impl PublicKey {
    /// Builds a public key from raw components received from a peer.
    ///
    /// Only checks what keeps the arithmetic defined: a modulus of at least
    /// [`MIN_KEY_BITS`] bits and `g`, `h` reduced below it.
    pub fn from_components(p: BigUint, g: BigUint, h: BigUint) -> Result<Self, AsymmetricError> {
        if p.bits() < MIN_KEY_BITS {
            return Err(AsymmetricError::InvalidPublicKey(format!(
                "modulus has {} bits, need at least {}",
                p.bits(),
                MIN_KEY_BITS
            )));
        }
        if g >= p || h >= p {
            return Err(AsymmetricError::InvalidPublicKey(
                "generator and public value must be below the modulus".to_string(),
            ));
        }
        Ok(Self { p, g, h })
    }

    /// Parses the three big-endian wire fields `(p, g, h)`.
    pub fn from_wire_fields(p: &[u8], g: &[u8], h: &[u8]) -> Result<Self, AsymmetricError> {
        Self::from_components(
            BigUint::from_bytes_be(p),
            BigUint::from_bytes_be(g),
            BigUint::from_bytes_be(h),
        )
    }

    /// The three big-endian wire fields in exchange order: modulus, generator, public value.
    pub fn to_wire_fields(&self) -> [Vec<u8>; 3] {
        [
            to_wire_bytes(&self.p),
            to_wire_bytes(&self.g),
            to_wire_bytes(&self.h),
        ]
    }

    /// The prime modulus `p`.
    pub fn modulus(&self) -> &BigUint {
        &self.p
    }

    /// The generator candidate `g`.
    pub fn generator(&self) -> &BigUint {
        &self.g
    }

    /// The public value `h = g^a mod p`.
    pub fn public_value(&self) -> &BigUint {
        &self.h
    }

    /// Bit length of the modulus.
    pub fn bits(&self) -> u64 {
        self.p.bits()
    }

    /// Plaintext bytes per ciphertext unit: `bits(p) / 8 - 1`, so every
    /// block value is below `p`.
    pub fn block_size(&self) -> usize {
        (self.p.bits() / 8) as usize - 1
    }

    /// SHA-256 over the length-prefixed wire fields.
    ///
    /// Only useful for out-of-band comparison; the handshake itself does
    /// not authenticate peers.
    pub fn fingerprint(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        for field in self.to_wire_fields() {
            hasher.update((field.len() as u64).to_be_bytes());
            hasher.update(&field);
        }
        hasher.finalize().into()
    }

    /// First 8 bytes of the fingerprint as hex.
    pub fn fingerprint_hex(&self) -> String {
        hex::encode(&self.fingerprint()[..8])
    }
}

/// Private exponent plus a shared handle to the matching public key.
#[derive(Clone)]
pub struct PrivateKey {
    a: BigUint,
    public: Arc<PublicKey>,
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Don't expose the exponent in debug output
        f.debug_struct("PrivateKey")
            .field("public", &self.public)
            .field("a", &"[REDACTED]")
            .finish()
    }
}

impl PrivateKey {
    /// Generates a fresh key pair with a `bits`-bit prime modulus.
    pub fn generate(bits: u64) -> Result<Self, AsymmetricError> {
        if bits < MIN_KEY_BITS {
            return Err(AsymmetricError::KeyTooSmall { bits });
        }

        let mut rng = OsRng;
        let p = generate_prime(bits, &mut rng)?;
        let g = rng.gen_biguint_below(&p);
        let a = rng.gen_biguint_below(&p);
        let h = g.modpow(&a, &p);

        Ok(Self {
            a,
            public: Arc::new(PublicKey { p, g, h }),
        })
    }

    /// The public half.
    pub fn public_key(&self) -> &Arc<PublicKey> {
        &self.public
    }

    pub(crate) fn exponent(&self) -> &BigUint {
        &self.a
    }
}

/// Generates a key pair, returning the private key and a shared public key.
pub fn keygen(bits: u64) -> Result<(PrivateKey, Arc<PublicKey>), AsymmetricError> {
    let private = PrivateKey::generate(bits)?;
    let public = Arc::clone(private.public_key());
    Ok((private, public))
}

/// Minimal big-endian encoding; zero is the empty string.
pub fn to_wire_bytes(n: &BigUint) -> Vec<u8> {
    if n.is_zero() {
        Vec::new()
    } else {
        n.to_bytes_be()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keygen_shapes() {
        let (private, public) = keygen(64).unwrap();
        assert_eq!(public.bits(), 64);
        assert_eq!(public.block_size(), 7);
        assert!(public.generator() < public.modulus());
        assert_eq!(
            public.generator().modpow(private.exponent(), public.modulus()),
            *public.public_value()
        );
        assert!(Arc::ptr_eq(&public, private.public_key()));
    }

    #[test]
    fn test_keygen_rejects_tiny_modulus() {
        assert!(matches!(
            keygen(8),
            Err(AsymmetricError::KeyTooSmall { bits: 8 })
        ));
    }

    #[test]
    fn test_wire_fields_roundtrip() {
        let (_, public) = keygen(128).unwrap();
        let [p, g, h] = public.to_wire_fields();
        let parsed = PublicKey::from_wire_fields(&p, &g, &h).unwrap();
        assert_eq!(parsed, *public);
        assert_eq!(parsed.fingerprint(), public.fingerprint());
    }

    #[test]
    fn test_from_components_validation() {
        let p = BigUint::from(65_521u32);
        assert!(PublicKey::from_components(p.clone(), 3u32.into(), 5u32.into()).is_ok());
        assert!(PublicKey::from_components(p.clone(), p.clone(), 5u32.into()).is_err());
        assert!(PublicKey::from_components(BigUint::zero(), 0u32.into(), 0u32.into()).is_err());
        assert!(PublicKey::from_components(251u32.into(), 3u32.into(), 5u32.into()).is_err());
    }

    #[test]
    fn test_zero_encodes_empty() {
        assert!(to_wire_bytes(&BigUint::zero()).is_empty());
        assert_eq!(to_wire_bytes(&BigUint::from(0x0102u32)), vec![1, 2]);
    }

    #[test]
    fn test_debug_redacts_exponent() {
        let (private, _) = keygen(32).unwrap();
        let debug = format!("{:?}", private);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains(&private.exponent().to_string()));
    }
}
