use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace, warn};
use xxrpc_frame::pool::DEFAULT_MAX_RETAINED_BYTES;
use xxrpc_frame::{BufferPool, FrameConfig, FrameConn, FrameError, PoolConfig};
use xxrpc_transport::{Endpoint, RpcStream};

use crate::codec::{Codec, JsonCodec};
use crate::envelope::{Request, Response};
use crate::error::{Result, RpcError};
use crate::registry::split_key;

/// Client-side connection settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientConfig {
    pub frame: FrameConfig,
    pub pool: PoolConfig,
}

/// One connection to an RPC server.
///
/// The protocol has no correlation id: the next frame read is always taken
/// as the answer to the last request written. [`call`](Self::call) takes
/// `&mut self`, so a `Client` can only ever have one call in flight. For
/// concurrent calls open several clients, or hand clients out from a pool
/// that grants exclusive use of each.
pub struct Client<C: Codec = JsonCodec> {
    conn: FrameConn<RpcStream>,
    codec: C,
    endpoint: Endpoint,
    scratch: Vec<u8>,
}

impl Client<JsonCodec> {
    /// Connect to `addr` (`host:port` or `unix:/path`) with default settings.
    pub fn dial(addr: &str) -> Result<Self> {
        let endpoint = Endpoint::parse(addr)?;
        Self::connect(&endpoint, ClientConfig::default(), JsonCodec)
    }
}

impl<C: Codec> Client<C> {
    pub fn connect(endpoint: &Endpoint, config: ClientConfig, codec: C) -> Result<Self> {
        let stream = xxrpc_transport::connect(endpoint)?;
        let pool = Arc::new(BufferPool::with_config(config.pool));
        debug!(%endpoint, codec = codec.name(), "rpc client connected");
        Ok(Self {
            conn: FrameConn::with_config(stream, pool, config.frame),
            codec,
            endpoint: endpoint.clone(),
            scratch: Vec::new(),
        })
    }

    /// Call `Service.Method` with `args` and return the server's response.
    ///
    /// A dispatch miss or application failure is not an `Err`: it comes back
    /// as a [`Response`] with a non-empty `error`. `Err` means the call never
    /// completed (malformed key, encode failure, transport or framing fault).
    pub fn call<A>(&mut self, service_method: &str, args: &A) -> Result<Response>
    where
        A: Serialize + ?Sized,
    {
        let (service, method) = split_key(service_method)?;
        let req = Request::new(service, method, self.codec.marshal(args)?);

        self.scratch.clear();
        self.codec.marshal_into(&req, &mut self.scratch)?;
        trace!(key = service_method, len = self.scratch.len(), "sending request");
        let written = self.conn.write_frame(&self.scratch);
        if self.scratch.capacity() > DEFAULT_MAX_RETAINED_BYTES {
            self.scratch = Vec::new();
        }
        if let Err(err) = written {
            return Err(self.fail(err));
        }

        let resp: Response = match self.conn.read_frame() {
            Ok(payload) => self.codec.unmarshal(&payload)?,
            Err(err) => return Err(self.fail(err)),
        };
        trace!(
            key = service_method,
            len = resp.data.len(),
            error = resp.is_error(),
            "received response"
        );
        Ok(resp)
    }

    /// Call and decode the result as `R`. A non-empty `error` in the
    /// response becomes [`RpcError::Remote`].
    pub fn call_decode<A, R>(&mut self, service_method: &str, args: &A) -> Result<R>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let resp = self.call(service_method, args)?;
        if resp.is_error() {
            return Err(RpcError::Remote(resp.error));
        }
        Ok(resp.decode(&self.codec)?)
    }

    /// Whether the connection has been closed, either explicitly or after a
    /// framing fault.
    pub fn is_closed(&self) -> bool {
        self.conn.is_closed()
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Close the connection and release its buffer.
    pub fn close(mut self) -> Result<()> {
        debug!(endpoint = %self.endpoint, "rpc client closing");
        self.conn.close()?;
        Ok(())
    }

    /// A framing fault leaves the stream position unknown; nothing more can
    /// be sent on it.
    fn fail(&mut self, err: FrameError) -> RpcError {
        if !self.conn.is_closed() {
            warn!(
                endpoint = %self.endpoint,
                error = %err,
                "closing client connection on frame error"
            );
            if let Err(close_err) = self.conn.close() {
                trace!(error = %close_err, "error while closing connection");
            }
        }
        err.into()
    }
}

impl<C: Codec> std::fmt::Debug for Client<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.endpoint)
            .field("codec", &self.codec.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistryError;
    use xxrpc_transport::RpcListener;

    #[test]
    fn dial_rejects_empty_address() {
        let err = Client::dial("").expect_err("empty address should fail");
        assert!(matches!(err, RpcError::Transport(_)));
    }

    #[test]
    fn call_rejects_malformed_key_before_sending() {
        let listener =
            RpcListener::bind(&Endpoint::tcp("127.0.0.1:0")).expect("listener should bind");
        let endpoint = listener.local_endpoint();
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept should succeed");
            let mut rest = Vec::new();
            std::io::Read::read_to_end(&mut stream, &mut rest).expect("read should succeed");
            rest
        });

        let mut client = Client::connect(&endpoint, ClientConfig::default(), JsonCodec)
            .expect("client should connect");
        let err = client.call("NoDot", &()).expect_err("key should be rejected");
        assert!(matches!(
            err,
            RpcError::InvalidMethod(RegistryError::InvalidKey(_))
        ));
        client.close().expect("close should succeed");

        let received = server.join().expect("server thread should finish");
        assert!(received.is_empty(), "nothing should reach the wire");
    }

    #[test]
    fn frame_fault_closes_the_client() {
        let listener =
            RpcListener::bind(&Endpoint::tcp("127.0.0.1:0")).expect("listener should bind");
        let endpoint = listener.local_endpoint();
        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept should succeed");
            let mut conn = FrameConn::new(stream, Arc::new(BufferPool::new()));
            let request = conn.read_frame().expect("request should arrive").into_owned();
            conn.close().expect("close should succeed");
            request
        });

        let mut client = Client::connect(&endpoint, ClientConfig::default(), JsonCodec)
            .expect("client should connect");
        let err = client.call("Echo.Say", "hi").expect_err("peer hung up");
        assert!(
            matches!(err, RpcError::Frame(FrameError::ConnectionClosed)),
            "{err}"
        );
        assert!(client.is_closed());

        let err = client.call("Echo.Say", "again").expect_err("client is closed");
        assert!(matches!(err, RpcError::Frame(FrameError::Closed)), "{err}");

        let request = server.join().expect("server thread should finish");
        let request: Request = JsonCodec.unmarshal(&request).expect("request should decode");
        assert_eq!(request.key(), "Echo.Say");
    }
}
