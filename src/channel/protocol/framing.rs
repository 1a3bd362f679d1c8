//! Length-prefixed, block-padded frames.
//!
//! ```text
//! +----------------------+------------------------------------------+
//! | length L (u64, BE)   | payload, zero-padded to ceil(L/16)*16    |
//! +----------------------+------------------------------------------+
//! ```
//!
//! Once a cipher is installed the padded payload is encrypted one 16-byte
//! block at a time with no chaining; before that it travels in the clear.
//! The length prefix is never encrypted.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::channel::error::ChannelError;
use crate::crypto::{Aes128, BLOCK_SIZE};

/// Size of the big-endian length prefix.
pub const LENGTH_PREFIX_LEN: usize = 8;

/// Rounds `len` up to the next multiple of the block size.
pub fn padded_len(len: u64) -> Option<u64> {
    let block = BLOCK_SIZE as u64;
    match len % block {
        0 => Some(len),
        rem => len.checked_add(block - rem),
    }
}

/// Builds the complete wire bytes for one frame.
pub fn encode_frame(payload: &[u8], cipher: Option<&Aes128>) -> Result<Vec<u8>, ChannelError> {
    let len = payload.len() as u64;
    let padded = padded_len(len).ok_or(ChannelError::FrameTooLarge { len, max: u64::MAX })? as usize;

    let mut frame = Vec::with_capacity(LENGTH_PREFIX_LEN + padded);
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);
    frame.resize(LENGTH_PREFIX_LEN + padded, 0);

    if let Some(cipher) = cipher {
        cipher.encrypt_in_place(&mut frame[LENGTH_PREFIX_LEN..])?;
    }
    Ok(frame)
}

/// Fills `buf` completely.
///
/// Returns `Ok(false)` if the stream ended before the first byte, and
/// `IncompleteRead` if it ended part way through.
async fn read_full<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> Result<bool, ChannelError> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(false);
            }
            return Err(ChannelError::IncompleteRead {
                expected: buf.len(),
                got: filled,
            });
        }
        filled += n;
    }
    Ok(true)
}

/// Writing side of a framed connection.
pub struct FrameWriter<W> {
    inner: W,
    cipher: Option<Aes128>,
    max_frame_len: u64,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Wrap a writer; frames go out unencrypted until a cipher is installed.
    pub fn new(inner: W, max_frame_len: u64) -> Self {
        Self {
            inner,
            cipher: None,
            max_frame_len,
        }
    }

    /// Encrypt every subsequent frame with `cipher`.
    pub fn install_cipher(&mut self, cipher: Aes128) {
        self.cipher = Some(cipher);
    }

    /// Whether frames are currently encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    /// Write one frame and flush it.
    pub async fn write_frame(&mut self, payload: &[u8]) -> Result<(), ChannelError> {
        let len = payload.len() as u64;
        if len > self.max_frame_len {
            return Err(ChannelError::FrameTooLarge {
                len,
                max: self.max_frame_len,
            });
        }

        let frame = encode_frame(payload, self.cipher.as_ref())?;
        self.inner.write_all(&frame).await?;
        self.inner.flush().await?;

        trace!(len, wire_len = frame.len(), encrypted = self.is_encrypted(), "frame sent");
        Ok(())
    }

    /// Flush and close the write direction.
    pub async fn shutdown(&mut self) -> Result<(), ChannelError> {
        self.inner.flush().await?;
        self.inner.shutdown().await?;
        Ok(())
    }

    /// Unwrap the underlying writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Reading side of a framed connection.
pub struct FrameReader<R> {
    inner: R,
    cipher: Option<Aes128>,
    max_frame_len: u64,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Wrap a reader; frames are taken as plaintext until a cipher is installed.
    pub fn new(inner: R, max_frame_len: u64) -> Self {
        Self {
            inner,
            cipher: None,
            max_frame_len,
        }
    }

    /// Decrypt every subsequent frame with `cipher`.
    pub fn install_cipher(&mut self, cipher: Aes128) {
        self.cipher = Some(cipher);
    }

    /// Whether frames are currently decrypted.
    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    /// Read one frame and return its unpadded payload.
    ///
    /// `Ok(None)` means the peer closed the stream cleanly between frames
    /// (or before sending any byte of a non-empty payload).
    pub async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, ChannelError> {
        let mut header = [0u8; LENGTH_PREFIX_LEN];
        if !read_full(&mut self.inner, &mut header).await? {
            return Ok(None);
        }

        let len = u64::from_be_bytes(header);
        if len > self.max_frame_len {
            return Err(ChannelError::FrameTooLarge {
                len,
                max: self.max_frame_len,
            });
        }
        let too_large = || ChannelError::FrameTooLarge {
            len,
            max: self.max_frame_len,
        };
        let padded = padded_len(len).ok_or_else(too_large)?;
        let padded = usize::try_from(padded).map_err(|_| too_large())?;

        let mut payload = vec![0u8; padded];
        if !read_full(&mut self.inner, &mut payload).await? {
            return Ok(None);
        }

        if let Some(cipher) = &self.cipher {
            cipher.decrypt_in_place(&mut payload)?;
        }
        payload.truncate(len as usize);

        trace!(len, encrypted = self.is_encrypted(), "frame received");
        Ok(Some(payload))
    }

    /// Unwrap the underlying reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: u64 = 1 << 20;

    fn cipher(byte: u8) -> Aes128 {
        Aes128::new(&[byte; 16]).unwrap()
    }

    async fn write_all_frames(messages: &[Vec<u8>], cipher: Option<Aes128>) -> Vec<u8> {
        let mut writer = FrameWriter::new(Vec::new(), MAX);
        if let Some(c) = cipher {
            writer.install_cipher(c);
        }
        for m in messages {
            writer.write_frame(m).await.unwrap();
        }
        writer.into_inner()
    }

    #[test]
    fn test_padded_len() {
        assert_eq!(padded_len(0), Some(0));
        assert_eq!(padded_len(1), Some(16));
        assert_eq!(padded_len(15), Some(16));
        assert_eq!(padded_len(16), Some(16));
        assert_eq!(padded_len(17), Some(32));
        assert_eq!(padded_len(u64::MAX), None);
    }

    #[test]
    fn test_frame_layout_plaintext() {
        let frame = encode_frame(b"hello", None).unwrap();
        assert_eq!(frame.len(), 8 + 16);
        assert_eq!(&frame[..8], &5u64.to_be_bytes());
        assert_eq!(&frame[8..13], b"hello");
        assert!(frame[13..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_frame_layout_empty() {
        assert_eq!(encode_frame(&[], None).unwrap(), vec![0u8; 8]);
    }

    #[test]
    fn test_frame_layout_encrypted() {
        let aes = cipher(9);
        let frame = encode_frame(b"hello", Some(&aes)).unwrap();
        assert_eq!(&frame[..8], &5u64.to_be_bytes());

        let mut expected = [0u8; 16];
        expected[..5].copy_from_slice(b"hello");
        assert_eq!(&frame[8..], &aes.encrypt_block(&expected));
    }

    #[tokio::test]
    async fn test_roundtrip_all_lengths_plaintext() {
        let messages: Vec<Vec<u8>> = (0..=40u8).map(|n| (0..n).collect()).collect();
        let wire = write_all_frames(&messages, None).await;

        let mut reader = FrameReader::new(&wire[..], MAX);
        for m in &messages {
            assert_eq!(reader.read_frame().await.unwrap().as_ref(), Some(m));
        }
        assert_eq!(reader.read_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_roundtrip_all_lengths_encrypted() {
        let messages: Vec<Vec<u8>> = (0..=40u8).map(|n| vec![n; n as usize]).collect();
        let wire = write_all_frames(&messages, Some(cipher(3))).await;

        let mut reader = FrameReader::new(&wire[..], MAX);
        reader.install_cipher(cipher(3));
        assert!(reader.is_encrypted());
        for m in &messages {
            assert_eq!(reader.read_frame().await.unwrap().as_ref(), Some(m));
        }
        assert_eq!(reader.read_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_switch_to_encryption_mid_stream() {
        let mut writer = FrameWriter::new(Vec::new(), MAX);
        writer.write_frame(b"clear").await.unwrap();
        writer.install_cipher(cipher(5));
        writer.write_frame(b"sealed").await.unwrap();
        let wire = writer.into_inner();

        let mut reader = FrameReader::new(&wire[..], MAX);
        assert_eq!(reader.read_frame().await.unwrap().unwrap(), b"clear");
        reader.install_cipher(cipher(5));
        assert_eq!(reader.read_frame().await.unwrap().unwrap(), b"sealed");
    }

    #[tokio::test]
    async fn test_duplex_stream() {
        let (a, b) = tokio::io::duplex(1024);
        let mut writer = FrameWriter::new(a, MAX);
        let mut reader = FrameReader::new(b, MAX);

        writer.write_frame(b"over a pipe").await.unwrap();
        writer.shutdown().await.unwrap();

        assert_eq!(reader.read_frame().await.unwrap().unwrap(), b"over a pipe");
        assert_eq!(reader.read_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_truncated_header() {
        let wire = [0u8, 0, 0];
        let mut reader = FrameReader::new(&wire[..], MAX);
        assert!(matches!(
            reader.read_frame().await,
            Err(ChannelError::IncompleteRead { expected: 8, got: 3 })
        ));
    }

    #[tokio::test]
    async fn test_truncated_payload() {
        let mut wire = encode_frame(b"twenty bytes of data", None).unwrap();
        wire.truncate(8 + 10);
        let mut reader = FrameReader::new(&wire[..], MAX);
        assert!(matches!(
            reader.read_frame().await,
            Err(ChannelError::IncompleteRead { expected: 32, got: 10 })
        ));
    }

    #[tokio::test]
    async fn test_eof_before_payload_is_clean() {
        let wire = 5u64.to_be_bytes();
        let mut reader = FrameReader::new(&wire[..], MAX);
        assert_eq!(reader.read_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let wire = (MAX + 1).to_be_bytes();
        let mut reader = FrameReader::new(&wire[..], MAX);
        assert!(matches!(
            reader.read_frame().await,
            Err(ChannelError::FrameTooLarge { .. })
        ));

        let mut writer = FrameWriter::new(Vec::new(), 4);
        assert!(matches!(
            writer.write_frame(b"too long").await,
            Err(ChannelError::FrameTooLarge { len: 8, max: 4 })
        ));
    }
}
