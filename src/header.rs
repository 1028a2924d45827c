//! Message framing (spec §6): a fixed 20-byte big-endian header followed by
//! `size` payload bytes, and the stateless single-message decoder (§4.1).

use std::io::{self, Read};

use crate::{Error, Result};

/// `offset(8) + timestamp(8) + size(4)`, big-endian.
pub const HEADER_LEN: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    pub offset: u64,
    pub timestamp: u64,
    pub size: u32,
}

impl FrameHeader {
    pub fn new(offset: u64, timestamp: u64, size: u32) -> Self {
        Self {
            offset,
            timestamp,
            size,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..8].copy_from_slice(&self.offset.to_be_bytes());
        buf[8..16].copy_from_slice(&self.timestamp.to_be_bytes());
        buf[16..20].copy_from_slice(&self.size.to_be_bytes());
        buf
    }

    /// `bytes` must have length exactly [`HEADER_LEN`].
    pub fn from_bytes(bytes: &[u8]) -> Self {
        debug_assert_eq!(bytes.len(), HEADER_LEN);
        let offset = u64::from_be_bytes(bytes[0..8].try_into().expect("header slice length"));
        let timestamp = u64::from_be_bytes(bytes[8..16].try_into().expect("header slice length"));
        let size = u32::from_be_bytes(bytes[16..20].try_into().expect("header slice length"));
        Self {
            offset,
            timestamp,
            size,
        }
    }
}

/// Stateless, reentrant single-message decoder (spec §4.1).
///
/// Reads a [`HEADER_LEN`]-byte header from `src` into `header_buf` (capacity
/// must be >= [`HEADER_LEN`]), then reads exactly `size` payload bytes into a
/// freshly allocated buffer. Returns `(payload, offset, timestamp)`.
///
/// Fails with [`Error::EndOfStream`] if `src` hits EOF before either the
/// header or the payload is complete; any other I/O error propagates
/// unchanged as [`Error::Storage`].
pub fn decode_message<R: Read>(
    src: &mut R,
    header_buf: &mut [u8],
) -> Result<(Vec<u8>, u64, u64)> {
    assert!(
        header_buf.len() >= HEADER_LEN,
        "header_buf must be at least {HEADER_LEN} bytes"
    );
    read_exact_or_eof(src, &mut header_buf[..HEADER_LEN])?;
    let header = FrameHeader::from_bytes(&header_buf[..HEADER_LEN]);

    let mut payload = vec![0u8; header.size as usize];
    read_exact_or_eof(src, &mut payload)?;

    Ok((payload, header.offset, header.timestamp))
}

fn read_exact_or_eof<R: Read>(src: &mut R, buf: &mut [u8]) -> Result<()> {
    match src.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Err(Error::EndOfStream),
        Err(err) => Err(Error::Storage(err)),
    }
}
