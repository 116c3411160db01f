//! Minimal request/response RPC over length-prefixed frames.
//!
//! xxrpc moves one request and one response per round trip over a TCP or
//! Unix domain socket. Frames are a 4-byte big-endian length followed by
//! the payload; payloads are codec-encoded envelopes; methods are plain
//! typed closures registered under `Service.Method` names.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP and Unix domain socket listeners and streams
//! - [`frame`]: length-prefixed framing, pooled read windows, object pools
//! - [`rpc`]: envelopes, codecs, dispatch registry, server and client
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use xxrpc::{Client, Codec, Server, Service, ServiceBinder};
//! use xxrpc::transport::Endpoint;
//!
//! struct Echo;
//!
//! impl Service for Echo {
//!     const NAME: &'static str = "Echo";
//!
//!     fn bind<C: Codec>(self: Arc<Self>, binder: &mut ServiceBinder<'_, C>) {
//!         binder.method("Say", |msg: String| Ok(msg.to_uppercase()));
//!     }
//! }
//!
//! let mut server = Server::listen(Endpoint::tcp("127.0.0.1:8888"));
//! server.register("Echo", Echo);
//! std::thread::spawn(move || server.start());
//!
//! let mut client = Client::dial("127.0.0.1:8888")?;
//! let reply: String = client.call_decode("Echo.Say", "hi")?;
//! assert_eq!(reply, "HI");
//! # Ok::<(), xxrpc::RpcError>(())
//! ```

/// Re-export transport types.
pub mod transport {
    pub use xxrpc_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use xxrpc_frame::*;
}

/// Re-export RPC types.
pub mod rpc {
    pub use xxrpc_core::*;
}

pub use xxrpc_core::{
    Client, ClientConfig, Codec, CodecKind, JsonCodec, Registry, Request, Response, RpcError,
    Server, ServerConfig, Service, ServiceBinder, ServiceError,
};
