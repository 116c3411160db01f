//! Echo server on TCP, registered with both a service and a raw handler.
//!
//! Run with:
//!   cargo run --example echo-server
//!
//! In another terminal:
//!   cargo run --example echo-client
//! or:
//!   cargo run --features cli -- call 127.0.0.1:8888 Echo.SayHello \
//!     --json '{"message":"world"}'

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use xxrpc::transport::Endpoint;
use xxrpc::{Codec, Server, ServerConfig, Service, ServiceBinder, ServiceError};

#[derive(Deserialize)]
struct SayHelloReq {
    message: String,
}

#[derive(Serialize)]
struct SayHelloResp {
    message: String,
}

struct Echo;

impl Service for Echo {
    const NAME: &'static str = "Echo";

    fn bind<C: Codec>(self: Arc<Self>, binder: &mut ServiceBinder<'_, C>) {
        binder
            .method("Say", |msg: String| Ok(msg.to_uppercase()))
            .method("SayHello", |req: SayHelloReq| {
                if req.message.is_empty() {
                    return Err(ServiceError::new("message must not be empty"));
                }
                Ok(SayHelloResp {
                    message: format!("Echo:{}", req.message),
                })
            });
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| xxrpc::rpc::DEFAULT_LISTEN.to_string());
    let config = ServerConfig::new(Endpoint::parse(&addr)?);

    let mut server = Server::new(config, xxrpc::JsonCodec);
    server.register(Echo::NAME, Echo);

    // Raw byte handler: reverses whatever bytes it is given.
    server.registry_mut().register("Bytes.Reverse", |params, out| {
        out.extend(params.iter().rev());
        Ok(())
    })?;

    let bound = server.bind()?;
    eprintln!("Listening on {}", bound.local_endpoint());
    bound.serve()?;
    Ok(())
}
