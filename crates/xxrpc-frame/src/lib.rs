//! Length-prefixed framing over stream sockets.
//!
//! Every message on the wire is a 4-byte big-endian payload length followed
//! by exactly that many payload bytes. [`FrameConn`] reconstructs frames
//! from a byte stream through a pooled read window, handing out borrowed
//! views on the common path so small frames are never copied.
//!
//! No partial frames are ever returned to the caller.

pub mod codec;
pub mod conn;
pub mod error;
pub mod pool;

#[cfg(feature = "async")]
pub mod async_codec;

#[cfg(feature = "async")]
pub use async_codec::RpcFrameCodec;
pub use codec::{
    decode_frame, encode_frame, FrameConfig, DEFAULT_BUFFER_SIZE, DEFAULT_MAX_FRAME_SIZE,
    HEADER_SIZE,
};
pub use conn::FrameConn;
pub use error::{FrameError, Result};
pub use pool::{BufferPool, Pool, PoolConfig, Poolable};
