//! AES-128 block cipher implemented from FIPS-197.
//!
//! The state is kept as 16 bytes in column-major order: byte `r + 4*c` is
//! row `r`, column `c`. That is also the order of the input block, so
//! loading and storing the state are plain copies.
//!
//! The engine only transforms single blocks. Callers that encrypt longer
//! buffers do so block by block with no chaining (see [`Aes128::encrypt_in_place`]),
//! so equal plaintext blocks give equal ciphertext blocks under one key.

use thiserror::Error;
use zeroize::Zeroize;

use super::gf::{gf_mul, xtime, INV_SBOX, SBOX};

/// Block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Key size in bytes.
pub const KEY_SIZE: usize = 16;

/// Number of rounds for a 128-bit key.
const ROUNDS: usize = 10;

/// A single 16-byte block.
pub type Block = [u8; BLOCK_SIZE];

type State = [u8; BLOCK_SIZE];

/// Errors that can occur when building or using the block cipher.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SymmetricError {
    #[error("Invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("Buffer length {0} is not a multiple of the block size")]
    UnalignedLength(usize),
}

/// AES-128 engine holding an immutable expanded key schedule.
///
/// Encryption and decryption take `&self`, so one engine can be shared
/// read-only; the channel still gives each direction its own instance.
#[derive(Clone)]
pub struct Aes128 {
    round_keys: [[u8; BLOCK_SIZE]; ROUNDS + 1],
}

impl std::fmt::Debug for Aes128 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aes128")
            .field("round_keys", &"[REDACTED]")
            .finish()
    }
}

impl Drop for Aes128 {
    fn drop(&mut self) {
        self.round_keys.zeroize();
    }
}

impl Aes128 {
    /// Expands a 16-byte key into the 11 round keys.
    pub fn new(key: &[u8]) -> Result<Self, SymmetricError> {
        let key: &[u8; KEY_SIZE] = key.try_into().map_err(|_| SymmetricError::InvalidKeyLength {
            expected: KEY_SIZE,
            got: key.len(),
        })?;

        Ok(Self {
            round_keys: expand_key(key),
        })
    }

    /// Encrypts one block.
    pub fn encrypt_block(&self, plaintext: &Block) -> Block {
        let mut state: State = *plaintext;

        add_round_key(&mut state, &self.round_keys[0]);
        for round in 1..ROUNDS {
            sub_bytes(&mut state);
            shift_rows(&mut state);
            mix_columns(&mut state);
            add_round_key(&mut state, &self.round_keys[round]);
        }
        sub_bytes(&mut state);
        shift_rows(&mut state);
        add_round_key(&mut state, &self.round_keys[ROUNDS]);

        state
    }

    /// Decrypts one block.
    pub fn decrypt_block(&self, ciphertext: &Block) -> Block {
        let mut state: State = *ciphertext;

        add_round_key(&mut state, &self.round_keys[ROUNDS]);
        for round in (1..ROUNDS).rev() {
            inv_shift_rows(&mut state);
            inv_sub_bytes(&mut state);
            add_round_key(&mut state, &self.round_keys[round]);
            inv_mix_columns(&mut state);
        }
        inv_shift_rows(&mut state);
        inv_sub_bytes(&mut state);
        add_round_key(&mut state, &self.round_keys[0]);

        state
    }

    /// Encrypts every 16-byte block of `buf` independently, in place.
    pub fn encrypt_in_place(&self, buf: &mut [u8]) -> Result<(), SymmetricError> {
        self.apply_blocks(buf, Self::encrypt_block)
    }

    /// Decrypts every 16-byte block of `buf` independently, in place.
    pub fn decrypt_in_place(&self, buf: &mut [u8]) -> Result<(), SymmetricError> {
        self.apply_blocks(buf, Self::decrypt_block)
    }

    fn apply_blocks(
        &self,
        buf: &mut [u8],
        transform: fn(&Self, &Block) -> Block,
    ) -> Result<(), SymmetricError> {
        if buf.len() % BLOCK_SIZE != 0 {
            return Err(SymmetricError::UnalignedLength(buf.len()));
        }
        for chunk in buf.chunks_exact_mut(BLOCK_SIZE) {
            let mut block = [0u8; BLOCK_SIZE];
            block.copy_from_slice(chunk);
            chunk.copy_from_slice(&transform(self, &block));
        }
        Ok(())
    }
}

/// Runs the key schedule recurrence over 4-byte words.
fn expand_key(key: &[u8; KEY_SIZE]) -> [[u8; BLOCK_SIZE]; ROUNDS + 1] {
    let mut words = [[0u8; 4]; 4 * (ROUNDS + 1)];
    for (i, word) in words.iter_mut().take(4).enumerate() {
        word.copy_from_slice(&key[4 * i..4 * i + 4]);
    }

    let mut rcon = 1u8;
    for i in 4..words.len() {
        let mut temp = words[i - 1];
        if i % 4 == 0 {
            temp.rotate_left(1);
            for byte in temp.iter_mut() {
                *byte = SBOX[*byte as usize];
            }
            temp[0] ^= rcon;
            rcon = xtime(rcon);
        }
        for j in 0..4 {
            words[i][j] = words[i - 4][j] ^ temp[j];
        }
    }

    let mut round_keys = [[0u8; BLOCK_SIZE]; ROUNDS + 1];
    for (round, key) in round_keys.iter_mut().enumerate() {
        for col in 0..4 {
            key[4 * col..4 * col + 4].copy_from_slice(&words[4 * round + col]);
        }
    }
    words.zeroize();
    round_keys
}

fn add_round_key(state: &mut State, round_key: &[u8; BLOCK_SIZE]) {
    for (s, k) in state.iter_mut().zip(round_key) {
        *s ^= k;
    }
}

fn sub_bytes(state: &mut State) {
    for byte in state.iter_mut() {
        *byte = SBOX[*byte as usize];
    }
}

fn inv_sub_bytes(state: &mut State) {
    for byte in state.iter_mut() {
        *byte = INV_SBOX[*byte as usize];
    }
}

/// Row `r` rotates left by `r` columns.
fn shift_rows(state: &mut State) {
    let old = *state;
    for row in 1..4 {
        for col in 0..4 {
            state[row + 4 * col] = old[row + 4 * ((col + row) % 4)];
        }
    }
}

fn inv_shift_rows(state: &mut State) {
    let old = *state;
    for row in 1..4 {
        for col in 0..4 {
            state[row + 4 * ((col + row) % 4)] = old[row + 4 * col];
        }
    }
}

fn mix_columns(state: &mut State) {
    for column in state.chunks_exact_mut(4) {
        let [a0, a1, a2, a3] = [column[0], column[1], column[2], column[3]];
        column[0] = xtime(a0) ^ (xtime(a1) ^ a1) ^ a2 ^ a3;
        column[1] = a0 ^ xtime(a1) ^ (xtime(a2) ^ a2) ^ a3;
        column[2] = a0 ^ a1 ^ xtime(a2) ^ (xtime(a3) ^ a3);
        column[3] = (xtime(a0) ^ a0) ^ a1 ^ a2 ^ xtime(a3);
    }
}

fn inv_mix_columns(state: &mut State) {
    for column in state.chunks_exact_mut(4) {
        let [a0, a1, a2, a3] = [column[0], column[1], column[2], column[3]];
        column[0] = gf_mul(a0, 0x0e) ^ gf_mul(a1, 0x0b) ^ gf_mul(a2, 0x0d) ^ gf_mul(a3, 0x09);
        column[1] = gf_mul(a0, 0x09) ^ gf_mul(a1, 0x0e) ^ gf_mul(a2, 0x0b) ^ gf_mul(a3, 0x0d);
        column[2] = gf_mul(a0, 0x0d) ^ gf_mul(a1, 0x09) ^ gf_mul(a2, 0x0e) ^ gf_mul(a3, 0x0b);
        column[3] = gf_mul(a0, 0x0b) ^ gf_mul(a1, 0x0d) ^ gf_mul(a2, 0x09) ^ gf_mul(a3, 0x0e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(s: &str) -> Block {
        hex::decode(s).unwrap().try_into().unwrap()
    }

    const KEY: &str = "000102030405060708090a0b0c0d0e0f";
    const PLAINTEXT: &str = "00112233445566778899aabbccddeeff";
    const CIPHERTEXT: &str = "69c4e0d86a7b0430d8cdb78070b4c55a";

    /// FIPS-197 appendix C.1, rounds 1..=9:
    /// (start, after SubBytes, after ShiftRows, after MixColumns, round key)
    const ROUND_TRACE: [[&str; 5]; 9] = [
        [
            "00102030405060708090a0b0c0d0e0f0",
            "63cab7040953d051cd60e0e7ba70e18c",
            "6353e08c0960e104cd70b751bacad0e7",
            "5f72641557f5bc92f7be3b291db9f91a",
            "d6aa74fdd2af72fadaa678f1d6ab76fe",
        ],
        [
            "89d810e8855ace682d1843d8cb128fe4",
            "a761ca9b97be8b45d8ad1a611fc97369",
            "a7be1a6997ad739bd8c9ca451f618b61",
            "ff87968431d86a51645151fa773ad009",
            "b692cf0b643dbdf1be9bc5006830b3fe",
        ],
        [
            "4915598f55e5d7a0daca94fa1f0a63f7",
            "3b59cb73fcd90ee05774222dc067fb68",
            "3bd92268fc74fb735767cbe0c0590e2d",
            "4c9c1e66f771f0762c3f868e534df256",
            "b6ff744ed2c2c9bf6c590cbf0469bf41",
        ],
        [
            "fa636a2825b339c940668a3157244d17",
            "2dfb02343f6d12dd09337ec75b36e3f0",
            "2d6d7ef03f33e334093602dd5bfb12c7",
            "6385b79ffc538df997be478e7547d691",
            "47f7f7bc95353e03f96c32bcfd058dfd",
        ],
        [
            "247240236966b3fa6ed2753288425b6c",
            "36400926f9336d2d9fb59d23c42c3950",
            "36339d50f9b539269f2c092dc4406d23",
            "f4bcd45432e554d075f1d6c51dd03b3c",
            "3caaa3e8a99f9deb50f3af57adf622aa",
        ],
        [
            "c81677bc9b7ac93b25027992b0261996",
            "e847f56514dadde23f77b64fe7f7d490",
            "e8dab6901477d4653ff7f5e2e747dd4f",
            "9816ee7400f87f556b2c049c8e5ad036",
            "5e390f7df7a69296a7553dc10aa31f6b",
        ],
        [
            "c62fe109f75eedc3cc79395d84f9cf5d",
            "b415f8016858552e4bb6124c5f998a4c",
            "b458124c68b68a014b99f82e5f15554c",
            "c57e1c159a9bd286f05f4be098c63439",
            "14f9701ae35fe28c440adf4d4ea9c026",
        ],
        [
            "d1876c0f79c4300ab45594add66ff41f",
            "3e175076b61c04678dfc2295f6a8bfc0",
            "3e1c22c0b6fcbf768da85067f6170495",
            "baa03de7a1f9b56ed5512cba5f414d23",
            "47438735a41c65b9e016baf4aebf7ad2",
        ],
        [
            "fde3bad205e5d0d73547964ef1fe37f1",
            "5411f4b56bd9700e96a0902fa1bb9aa1",
            "54d990a16ba09ab596bbf40ea111702f",
            "e9f74eec023020f61bf2ccf2353c21c7",
            "549932d1f08557681093ed9cbe2c974e",
        ],
    ];

    /// Round 10: (start, after SubBytes, after ShiftRows, round key).
    const FINAL_ROUND: [&str; 4] = [
        "bd6e7c3df2b5779e0b61216e8b10b689",
        "7a9f102789d5f50b2beffd9f3dca4ea7",
        "7ad5fda789ef4e272bca100b3d9ff59f",
        "13111d7fe3944a17f307a78b4d2b30c5",
    ];

    #[test]
    fn test_key_expansion_appendix_a1() {
        let aes = Aes128::new(&block("2b7e151628aed2a6abf7158809cf4f3c")).unwrap();
        let expected = [
            "2b7e151628aed2a6abf7158809cf4f3c",
            "a0fafe1788542cb123a339392a6c7605",
            "f2c295f27a96b9435935807a7359f67f",
            "3d80477d4716fe3e1e237e446d7a883b",
            "ef44a541a8525b7fb671253bdb0bad00",
            "d4d1c6f87c839d87caf2b8bc11f915bc",
            "6d88a37a110b3efddbf98641ca0093fd",
            "4e54f70e5f5fc9f384a64fb24ea6dc4f",
            "ead27321b58dbad2312bf5607f8d292f",
            "ac7766f319fadc2128d12941575c006e",
            "d014f9a8c9ee2589e13f0cc8b6630ca6",
        ];
        for (round, hex_key) in expected.iter().enumerate() {
            assert_eq!(aes.round_keys[round], block(hex_key), "round key {}", round);
        }
    }

    #[test]
    fn test_invalid_key_length() {
        assert_eq!(
            Aes128::new(&[0u8; 15]).unwrap_err(),
            SymmetricError::InvalidKeyLength { expected: 16, got: 15 }
        );
        assert!(Aes128::new(&[0u8; 32]).is_err());
        assert!(Aes128::new(&[]).is_err());
    }

    #[test]
    fn test_cipher_intermediate_states() {
        let aes = Aes128::new(&block(KEY)).unwrap();
        let mut state = block(PLAINTEXT);

        assert_eq!(aes.round_keys[0], block(KEY));
        add_round_key(&mut state, &aes.round_keys[0]);

        for (i, [start, s_box, s_row, m_col, k_sch]) in ROUND_TRACE.iter().enumerate() {
            let round = i + 1;
            assert_eq!(state, block(start), "round {} start", round);
            sub_bytes(&mut state);
            assert_eq!(state, block(s_box), "round {} sub_bytes", round);
            shift_rows(&mut state);
            assert_eq!(state, block(s_row), "round {} shift_rows", round);
            mix_columns(&mut state);
            assert_eq!(state, block(m_col), "round {} mix_columns", round);
            assert_eq!(aes.round_keys[round], block(k_sch), "round {} key", round);
            add_round_key(&mut state, &aes.round_keys[round]);
        }

        let [start, s_box, s_row, k_sch] = FINAL_ROUND;
        assert_eq!(state, block(start));
        sub_bytes(&mut state);
        assert_eq!(state, block(s_box));
        shift_rows(&mut state);
        assert_eq!(state, block(s_row));
        assert_eq!(aes.round_keys[10], block(k_sch));
        add_round_key(&mut state, &aes.round_keys[10]);
        assert_eq!(state, block(CIPHERTEXT));
    }

    #[test]
    fn test_inverse_cipher_intermediate_states() {
        let aes = Aes128::new(&block(KEY)).unwrap();
        let mut state = block(CIPHERTEXT);

        add_round_key(&mut state, &aes.round_keys[10]);
        let [_, s_box, s_row, _] = FINAL_ROUND;
        assert_eq!(state, block(s_row), "inverse round 1 start");
        inv_shift_rows(&mut state);
        assert_eq!(state, block(s_box), "inverse round 1 inv_shift_rows");
        inv_sub_bytes(&mut state);

        // Walk the forward trace backwards: each inverse round undoes one forward round.
        for round in (1..=9).rev() {
            let [start, s_box, s_row, m_col, k_sch] = ROUND_TRACE[round - 1];
            let next_start = if round == 9 { FINAL_ROUND[0] } else { ROUND_TRACE[round][0] };
            assert_eq!(state, block(next_start), "inverse round {} inv_sub_bytes", round);
            assert_eq!(aes.round_keys[round], block(k_sch));
            add_round_key(&mut state, &aes.round_keys[round]);
            assert_eq!(state, block(m_col), "inverse round {} add_round_key", round);
            inv_mix_columns(&mut state);
            assert_eq!(state, block(s_row), "inverse round {} inv_mix_columns", round);
            inv_shift_rows(&mut state);
            assert_eq!(state, block(s_box), "inverse round {} inv_shift_rows", round);
            inv_sub_bytes(&mut state);
            assert_eq!(state, block(start), "inverse round {} inv_sub_bytes", round);
        }

        add_round_key(&mut state, &aes.round_keys[0]);
        assert_eq!(state, block(PLAINTEXT));
    }

    #[test]
    fn test_block_encrypt_decrypt_vector() {
        let aes = Aes128::new(&block(KEY)).unwrap();
        assert_eq!(aes.encrypt_block(&block(PLAINTEXT)), block(CIPHERTEXT));
        assert_eq!(aes.decrypt_block(&block(CIPHERTEXT)), block(PLAINTEXT));
    }

    #[test]
    fn test_shift_rows_inverse() {
        let mut state: State = core::array::from_fn(|i| i as u8);
        let original = state;
        shift_rows(&mut state);
        assert_ne!(state, original);
        // Row 0 is untouched
        assert_eq!([state[0], state[4], state[8], state[12]], [0, 4, 8, 12]);
        inv_shift_rows(&mut state);
        assert_eq!(state, original);
    }

    #[test]
    fn test_mix_columns_inverse() {
        // FIPS-197 / common test column: db 13 53 45 -> 8e 4d a1 bc
        let mut state: State = [0; 16];
        state[..4].copy_from_slice(&[0xdb, 0x13, 0x53, 0x45]);
        mix_columns(&mut state);
        assert_eq!(&state[..4], &[0x8e, 0x4d, 0xa1, 0xbc]);
        inv_mix_columns(&mut state);
        assert_eq!(&state[..4], &[0xdb, 0x13, 0x53, 0x45]);
    }

    #[test]
    fn test_in_place_no_chaining() {
        let aes = Aes128::new(&[7u8; 16]).unwrap();
        let mut buf = [0x42u8; 48];
        aes.encrypt_in_place(&mut buf).unwrap();

        // Identical plaintext blocks encrypt identically (ECB-style framing).
        assert_eq!(buf[..16], buf[16..32]);
        assert_eq!(buf[16..32], buf[32..48]);

        aes.decrypt_in_place(&mut buf).unwrap();
        assert_eq!(buf, [0x42u8; 48]);
    }

    #[test]
    fn test_in_place_unaligned() {
        let aes = Aes128::new(&[7u8; 16]).unwrap();
        let mut buf = [0u8; 17];
        assert_eq!(
            aes.encrypt_in_place(&mut buf),
            Err(SymmetricError::UnalignedLength(17))
        );
    }

    #[test]
    fn test_debug_redacts_round_keys() {
        let aes = Aes128::new(&block(KEY)).unwrap();
        let debug = format!("{:?}", aes);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("d6aa74fd"));
    }
}
