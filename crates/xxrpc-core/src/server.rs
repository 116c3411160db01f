use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, info_span, trace, warn};
use xxrpc_frame::{BufferPool, FrameConfig, FrameConn, FrameError, Pool, PoolConfig};
use xxrpc_transport::{Endpoint, RpcListener, RpcStream};

use crate::codec::{Codec, JsonCodec};
use crate::envelope::{Request, Response};
use crate::error::Result;
use crate::registry::{Registry, Service};

/// Default listen address.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:8888";

const ACCEPT_BACKOFF_MIN: Duration = Duration::from_millis(5);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Endpoint to listen on.
    pub listen: Endpoint,
    /// Frame limits applied to every connection.
    pub frame: FrameConfig,
    /// Retention policy for the buffer and envelope pools.
    pub pool: PoolConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: Endpoint::tcp(DEFAULT_LISTEN),
            frame: FrameConfig::default(),
            pool: PoolConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(listen: Endpoint) -> Self {
        Self {
            listen,
            ..Self::default()
        }
    }
}

/// An RPC server under construction: register services, then
/// [`bind`](Self::bind) or [`start`](Self::start).
pub struct Server<C: Codec = JsonCodec> {
    config: ServerConfig,
    codec: C,
    registry: Registry,
}

impl Server<JsonCodec> {
    /// Server on `listen` with the default codec.
    pub fn listen(listen: Endpoint) -> Self {
        Self::new(ServerConfig::new(listen), JsonCodec)
    }
}

impl<C: Codec> Server<C> {
    pub fn new(config: ServerConfig, codec: C) -> Self {
        Self {
            config,
            codec,
            registry: Registry::new(),
        }
    }

    /// Publish `service`'s methods as `<name>.<Method>`.
    pub fn register<S: Service>(&mut self, name: &str, service: S) -> &mut Self {
        self.registry
            .register_service_as(name, Arc::new(service), self.codec.clone());
        self
    }

    /// Direct access to the handler table, e.g. for
    /// [`Registry::register_typed`].
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the listener. The registry is frozen from here on.
    pub fn bind(self) -> Result<BoundServer<C>> {
        let listener = RpcListener::bind(&self.config.listen)?;
        let local = listener.local_endpoint();
        info!(
            endpoint = %local,
            transport = local.transport_name(),
            codec = self.codec.name(),
            methods = self.registry.len(),
            "rpc server listening"
        );

        let pool = self.config.pool;
        Ok(BoundServer {
            listener,
            local,
            shutdown: Arc::new(AtomicBool::new(false)),
            shared: Arc::new(Shared {
                registry: self.registry,
                codec: self.codec,
                frame: self.config.frame,
                buffers: Arc::new(BufferPool::with_config(pool)),
                requests: Pool::with_config(pool),
                responses: Pool::with_config(pool),
            }),
        })
    }

    /// Bind and run the accept loop on the calling thread.
    pub fn start(self) -> Result<()> {
        self.bind()?.serve()
    }
}

/// State shared read-only by every connection worker. The pools are
/// internally synchronized.
struct Shared<C: Codec> {
    registry: Registry,
    codec: C,
    frame: FrameConfig,
    buffers: Arc<BufferPool>,
    requests: Pool<Request>,
    responses: Pool<Response>,
}

/// A server whose listener is bound and ready to accept.
pub struct BoundServer<C: Codec = JsonCodec> {
    listener: RpcListener,
    local: Endpoint,
    shutdown: Arc<AtomicBool>,
    shared: Arc<Shared<C>>,
}

impl<C: Codec> BoundServer<C> {
    /// The endpoint actually bound (TCP port 0 resolved).
    pub fn local_endpoint(&self) -> &Endpoint {
        &self.local
    }

    /// Handle that stops [`serve`](Self::serve) from another thread.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: Arc::clone(&self.shutdown),
            wake: self.local.clone(),
        }
    }

    /// Run the accept loop until shut down.
    ///
    /// Each connection is served by its own thread. Accept failures are
    /// logged and retried with backoff; they never stop the loop.
    /// Connections already running are not waited for.
    pub fn serve(self) -> Result<()> {
        let next_id = AtomicU64::new(1);
        let mut backoff = ACCEPT_BACKOFF_MIN;

        while !self.shutdown.load(Ordering::SeqCst) {
            let (stream, peer) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(err) => {
                    if self.shutdown.load(Ordering::SeqCst) {
                        break;
                    }
                    warn!(error = %err, retry_in = ?backoff, "accept failed");
                    thread::sleep(backoff);
                    backoff = (backoff * 2).min(ACCEPT_BACKOFF_MAX);
                    continue;
                }
            };
            backoff = ACCEPT_BACKOFF_MIN;

            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }

            let id = next_id.fetch_add(1, Ordering::Relaxed);
            let shared = Arc::clone(&self.shared);
            let spawned = thread::Builder::new()
                .name(format!("xxrpc-conn-{id}"))
                .spawn(move || {
                    let span = info_span!("conn", id, %peer);
                    let _enter = span.enter();
                    serve_connection(&shared, stream);
                });
            if let Err(err) = spawned {
                error!(error = %err, "failed to spawn connection worker");
            }
        }

        info!(endpoint = %self.local, "rpc server stopped");
        Ok(())
    }
}

/// Stops a running [`BoundServer::serve`] loop.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    wake: Endpoint,
}

impl ShutdownHandle {
    /// Ask the accept loop to exit. The loop is woken by a throwaway
    /// connection to its own endpoint.
    pub fn shutdown(&self) {
        if self.flag.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(err) = xxrpc_transport::connect(&self.wake) {
            debug!(error = %err, "shutdown wake-up connect failed");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Serve one connection until the peer leaves or a fault occurs.
fn serve_connection<C: Codec>(shared: &Shared<C>, stream: RpcStream) {
    let mut conn = FrameConn::with_config(stream, Arc::clone(&shared.buffers), shared.frame);
    let mut calls = 0u64;

    let outcome = loop {
        match serve_one(shared, &mut conn) {
            Ok(()) => calls += 1,
            Err(err) => break err,
        }
    };

    match outcome {
        ConnFault::Frame(FrameError::ConnectionClosed) => debug!(calls, "peer closed connection"),
        ConnFault::Frame(err) => warn!(calls, error = %err, "closing connection on frame error"),
        ConnFault::Decode(err) => {
            warn!(calls, error = %err, "closing connection on undecodable request")
        }
        ConnFault::Encode(err) => {
            error!(calls, error = %err, "closing connection on unencodable response")
        }
    }

    if let Err(err) = conn.close() {
        trace!(error = %err, "error while closing connection");
    }
}

enum ConnFault {
    Frame(FrameError),
    Decode(crate::error::CodecError),
    Encode(crate::error::CodecError),
}

/// One read, dispatch, write cycle. Pooled envelopes and the encode buffer
/// go back to their pools on every path.
fn serve_one<C: Codec, S: io::Read + io::Write>(
    shared: &Shared<C>,
    conn: &mut FrameConn<S>,
) -> std::result::Result<(), ConnFault> {
    let mut req = shared.requests.acquire();
    let decoded = match conn.read_frame() {
        Ok(payload) => shared.codec.unmarshal_into(&payload, &mut req),
        Err(err) => {
            shared.requests.release(req);
            return Err(ConnFault::Frame(err));
        }
    };
    if let Err(err) = decoded {
        shared.requests.release(req);
        return Err(ConnFault::Decode(err));
    }

    let mut resp = shared.responses.acquire();
    dispatch(&shared.registry, &req, &mut resp);

    let mut out = shared.buffers.acquire();
    let result = match shared.codec.marshal_into(&resp, &mut out) {
        Ok(()) => conn.write_frame(&out).map_err(ConnFault::Frame),
        Err(err) => Err(ConnFault::Encode(err)),
    };

    shared.buffers.release(out);
    shared.responses.release(resp);
    shared.requests.release(req);
    result
}

/// Resolve and run the handler for `req`, recording the outcome in `resp`.
/// Unknown methods and handler errors become `resp.error`.
fn dispatch(registry: &Registry, req: &Request, resp: &mut Response) {
    let handler = match registry.lookup(&req.service, &req.method) {
        Ok(handler) => handler,
        Err(err) => {
            debug!(service = %req.service, method = %req.method, error = %err, "dispatch miss");
            resp.set_error(err);
            return;
        }
    };

    if let Err(err) = handler(&req.params, &mut resp.data) {
        debug!(service = %req.service, method = %req.method, error = %err, "handler failed");
        resp.set_error(err);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::{Read, Write};

    use super::*;
    use crate::error::ServiceError;

    /// In-memory stream: reads from a script, collects writes.
    #[derive(Default)]
    struct MemStream {
        input: VecDeque<u8>,
        output: Vec<u8>,
    }

    impl Read for MemStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(self.input.len());
            for (slot, byte) in buf.iter_mut().zip(self.input.drain(..n)) {
                *slot = byte;
            }
            Ok(n)
        }
    }

    impl Write for MemStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn shared() -> Shared<JsonCodec> {
        let mut registry = Registry::new();
        registry
            .register_typed("Echo.Say", JsonCodec, |msg: String| Ok(msg.to_uppercase()))
            .expect("key should be valid");
        registry
            .register_typed("Echo.Fail", JsonCodec, |_: String| -> std::result::Result<String, ServiceError> {
                Err(ServiceError::new("always fails"))
            })
            .expect("key should be valid");
        Shared {
            registry,
            codec: JsonCodec,
            frame: FrameConfig::default(),
            buffers: Arc::new(BufferPool::new()),
            requests: Pool::new(),
            responses: Pool::new(),
        }
    }

    fn framed(payload: &[u8]) -> Vec<u8> {
        let mut out = (payload.len() as u32).to_be_bytes().to_vec();
        out.extend_from_slice(payload);
        out
    }

    fn request_frame(service: &str, method: &str, params: &str) -> Vec<u8> {
        let req = Request::new(service, method, JsonCodec.marshal(params).expect("encode"));
        framed(&JsonCodec.marshal(&req).expect("encode"))
    }

    fn responses(output: &[u8]) -> Vec<Response> {
        let mut out = Vec::new();
        let mut rest = output;
        while rest.len() >= 4 {
            let len = u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
            out.push(JsonCodec.unmarshal(&rest[4..4 + len]).expect("response should decode"));
            rest = &rest[4 + len..];
        }
        out
    }

    fn run(shared: &Shared<JsonCodec>, input: Vec<u8>) -> (Vec<Response>, ConnFault) {
        let stream = MemStream {
            input: input.into(),
            output: Vec::new(),
        };
        let mut conn = FrameConn::new(stream, Arc::clone(&shared.buffers));
        let fault = loop {
            if let Err(fault) = serve_one(shared, &mut conn) {
                break fault;
            }
        };
        let output = conn.get_ref().expect("conn should be open").output.clone();
        (responses(&output), fault)
    }

    #[test]
    fn answers_requests_in_order_until_eof() {
        let shared = shared();
        let mut input = request_frame("Echo", "Say", "hi");
        input.extend(request_frame("Echo", "Nope", "x"));
        input.extend(request_frame("Echo", "Fail", "x"));
        input.extend(request_frame("Echo", "Say", "again"));

        let (resps, fault) = run(&shared, input);
        assert!(matches!(fault, ConnFault::Frame(FrameError::ConnectionClosed)));
        assert_eq!(resps.len(), 4);

        let hi: String = resps[0].decode(&JsonCodec).expect("data should decode");
        assert_eq!(hi, "HI");
        assert!(!resps[0].is_error());

        assert!(resps[1].data.is_empty());
        assert!(resps[1].error.contains("not found"), "{}", resps[1].error);

        assert_eq!(resps[2].error, "always fails");
        assert!(resps[2].data.is_empty());

        let again: String = resps[3].decode(&JsonCodec).expect("data should decode");
        assert_eq!(again, "AGAIN");
    }

    #[test]
    fn undecodable_request_is_fatal_and_unanswered() {
        let shared = shared();
        let mut input = framed(b"{not an envelope");
        input.extend(request_frame("Echo", "Say", "never"));

        let (resps, fault) = run(&shared, input);
        assert!(matches!(fault, ConnFault::Decode(_)));
        assert!(resps.is_empty());
    }

    #[test]
    fn oversized_frame_is_fatal() {
        let shared = shared();
        let input = ((4 * 1024 * 1024 + 1) as u32).to_be_bytes().to_vec();

        let (resps, fault) = run(&shared, input);
        assert!(matches!(
            fault,
            ConnFault::Frame(FrameError::FrameTooLarge { .. })
        ));
        assert!(resps.is_empty());
    }

    #[test]
    fn envelopes_return_to_pools() {
        let shared = shared();
        let (_, _) = run(&shared, request_frame("Echo", "Say", "hi"));
        assert_eq!(shared.requests.idle(), 1);
        assert_eq!(shared.responses.idle(), 1);
    }

    #[test]
    fn dispatch_records_application_error() {
        let shared = shared();
        let req = Request::new("Echo", "Fail", b"\"x\"".to_vec());
        let mut resp = Response::default();
        dispatch(&shared.registry, &req, &mut resp);
        assert_eq!(resp, Response::err("always fails"));
    }

    #[test]
    fn default_config_listens_on_loopback() {
        let config = ServerConfig::default();
        assert_eq!(config.listen, Endpoint::tcp(DEFAULT_LISTEN));
        assert_eq!(config.frame.max_frame_size, 4 * 1024 * 1024);
    }
}
