//! Stream socket abstraction for xxrpc.
//!
//! Provides a unified interface over the stream transports a server can
//! listen on and a client can dial:
//! - TCP (`host:port`)
//! - Unix domain sockets (`unix:/path`, Unix only)
//!
//! This is the lowest layer of xxrpc. Everything else builds on top of
//! the [`RpcStream`] type provided here.

pub mod endpoint;
pub mod error;
pub mod listener;
pub mod stream;
pub mod tcp;

#[cfg(unix)]
pub mod uds;

pub use endpoint::Endpoint;
pub use error::{Result, TransportError};
pub use listener::{connect, RpcListener};
pub use stream::RpcStream;
pub use tcp::TcpSocket;

#[cfg(unix)]
pub use uds::UnixDomainSocket;
