//! Request/response RPC over framed stream connections.
//!
//! A [`Server`] accepts connections and serves each one on its own thread:
//! read a frame, decode a [`Request`], dispatch it through the [`Registry`],
//! encode the [`Response`], write it back. A [`Client`] holds one
//! connection and makes strictly sequential calls over it.
//!
//! Dispatch misses and application errors travel back inside
//! `Response::error` and leave the connection open. Transport, framing and
//! envelope decode faults close it.

pub mod client;
pub mod codec;
pub mod envelope;
pub mod error;
pub mod registry;
pub mod server;

pub use client::{Client, ClientConfig};
#[cfg(feature = "msgpack")]
pub use codec::MsgPackCodec;
pub use codec::{Codec, CodecKind, DecodeInPlace, JsonCodec};
pub use envelope::{Request, Response};
pub use error::{CodecError, RegistryError, Result, RpcError, ServiceError};
pub use registry::{split_key, Handler, Registry, Service, ServiceBinder};
pub use server::{BoundServer, Server, ServerConfig, ShutdownHandle, DEFAULT_LISTEN};
