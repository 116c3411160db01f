use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::pool::DEFAULT_MAX_RETAINED_BYTES;

/// Frame header: a single big-endian `u32` payload length.
pub const HEADER_SIZE: usize = 4;

/// Default maximum payload size: 4 MiB.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

/// Default size of the pooled read window of a [`FrameConn`](crate::FrameConn).
pub const DEFAULT_BUFFER_SIZE: usize = DEFAULT_MAX_RETAINED_BYTES;

/// Smallest read window accepted; it must at least hold a header plus a
/// little payload to be useful.
pub const MIN_BUFFER_SIZE: usize = 64;

/// Encode the header for a payload of `len` bytes.
///
/// Wire format:
/// ```text
/// ┌────────────────────┬──────────────────┐
/// │ Length N (4B, BE)  │ Payload (N bytes) │
/// └────────────────────┴──────────────────┘
/// ```
pub fn encode_header(len: usize, max_frame_size: usize) -> Result<[u8; HEADER_SIZE]> {
    let max = max_frame_size.min(u32::MAX as usize);
    if len > max {
        return Err(FrameError::FrameTooLarge { size: len, max });
    }
    Ok((len as u32).to_be_bytes())
}

/// Decode the payload length from a header.
pub fn decode_header(header: [u8; HEADER_SIZE]) -> usize {
    u32::from_be_bytes(header) as usize
}

/// Append one complete frame to `dst`.
pub fn encode_frame(payload: &[u8], max_frame_size: usize, dst: &mut BytesMut) -> Result<()> {
    let header = encode_header(payload.len(), max_frame_size)?;
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_slice(&header);
    dst.put_slice(payload);
    Ok(())
}

/// Decode one frame from the front of `src`.
///
/// Returns `Ok(None)` if `src` does not hold a complete frame yet. The
/// length is checked against `max_frame_size` as soon as the header is
/// available, before any payload is buffered.
pub fn decode_frame(src: &mut BytesMut, max_frame_size: usize) -> Result<Option<Bytes>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    let mut header = [0u8; HEADER_SIZE];
    header.copy_from_slice(&src[..HEADER_SIZE]);
    let len = decode_header(header);
    if len > max_frame_size {
        return Err(FrameError::FrameTooLarge {
            size: len,
            max: max_frame_size,
        });
    }

    if src.len() < HEADER_SIZE + len {
        src.reserve(HEADER_SIZE + len - src.len());
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    Ok(Some(src.split_to(len).freeze()))
}

/// Configuration for framed connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameConfig {
    /// Maximum payload size in bytes, enforced on read and write. Default: 4 MiB.
    pub max_frame_size: usize,
    /// Size of the pooled read window. Frames that do not fit are read
    /// into a private allocation instead. Default: 64 KiB.
    pub buffer_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_big_endian() {
        assert_eq!(encode_header(0x0102_0304, usize::MAX).unwrap(), [1, 2, 3, 4]);
        assert_eq!(decode_header([0, 0, 1, 0]), 256);
    }

    #[test]
    fn empty_payload_is_four_zero_bytes() {
        let mut buf = BytesMut::new();
        encode_frame(b"", DEFAULT_MAX_FRAME_SIZE, &mut buf).unwrap();
        assert_eq!(buf.as_ref(), &[0, 0, 0, 0]);

        let payload = decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE)
            .unwrap()
            .unwrap();
        assert!(payload.is_empty());
        assert!(buf.is_empty());
    }

    #[test]
    fn encode_rejects_oversized_payload() {
        let mut buf = BytesMut::new();
        let err = encode_frame(&[0u8; 9], 8, &mut buf).unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { size: 9, max: 8 }));
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_waits_for_complete_frame() {
        let mut buf = BytesMut::from(&[0u8, 0][..]);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE).unwrap().is_none());

        let mut buf = BytesMut::new();
        encode_frame(b"hello", DEFAULT_MAX_FRAME_SIZE, &mut buf).unwrap();
        buf.truncate(HEADER_SIZE + 2);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE).unwrap().is_none());
        assert_eq!(buf.len(), HEADER_SIZE + 2, "partial frame must stay buffered");
    }

    #[test]
    fn decode_rejects_oversized_header_without_payload() {
        let mut buf = BytesMut::new();
        buf.put_u32(DEFAULT_MAX_FRAME_SIZE as u32 + 1);
        let err = decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE).unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { .. }));
    }

    #[test]
    fn decodes_back_to_back_frames() {
        let mut buf = BytesMut::new();
        encode_frame(b"first", DEFAULT_MAX_FRAME_SIZE, &mut buf).unwrap();
        encode_frame(b"second", DEFAULT_MAX_FRAME_SIZE, &mut buf).unwrap();

        let a = decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE).unwrap().unwrap();
        let b = decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE).unwrap().unwrap();
        assert_eq!(a.as_ref(), b"first");
        assert_eq!(b.as_ref(), b"second");
        assert!(buf.is_empty());
    }
}
