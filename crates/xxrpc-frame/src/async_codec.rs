//! `tokio_util::codec` adapter for the xxrpc wire format.
//!
//! Lets async code speak to a blocking xxrpc server or client through
//! `Framed<S, RpcFrameCodec>` without a second framing implementation.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, decode_header, encode_frame, DEFAULT_MAX_FRAME_SIZE, HEADER_SIZE};
use crate::error::FrameError;

/// Length-prefixed frame codec with a maximum frame size.
#[derive(Debug, Clone, Copy)]
pub struct RpcFrameCodec {
    max_frame_size: usize,
}

impl RpcFrameCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for RpcFrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Decoder for RpcFrameCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        decode_frame(src, self.max_frame_size)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(FrameError::Truncated {
                expected: expected_len(src),
                received: src.len(),
            }),
        }
    }
}

impl Encoder<Bytes> for RpcFrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(&item, self.max_frame_size, dst)
    }
}

impl Encoder<&[u8]> for RpcFrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: &[u8], dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(item, self.max_frame_size, dst)
    }
}

/// Total bytes the partial frame at the front of `src` was announced as.
fn expected_len(src: &BytesMut) -> usize {
    if src.len() < HEADER_SIZE {
        return HEADER_SIZE;
    }
    let mut header = [0u8; HEADER_SIZE];
    header.copy_from_slice(&src[..HEADER_SIZE]);
    HEADER_SIZE + decode_header(header)
}
