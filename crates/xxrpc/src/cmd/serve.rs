use std::io::Write;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use xxrpc_core::{
    Codec, Server, ServerConfig, Service, ServiceBinder, ServiceError, ShutdownHandle,
};
use xxrpc_frame::PoolConfig;
use xxrpc_transport::Endpoint;

use crate::cmd::ServeArgs;
use crate::exit::{rpc_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};

pub fn run(args: ServeArgs) -> CliResult<i32> {
    let listen =
        Endpoint::parse(&args.listen).map_err(|err| transport_error("invalid --listen", err))?;
    let config = ServerConfig {
        listen,
        frame: args.conn.frame_config(),
        pool: PoolConfig::default(),
    };

    let mut server = Server::new(config, args.conn.codec);
    server.register(EchoService::NAME, EchoService);
    let bound = server.bind().map_err(|err| rpc_error("bind failed", err))?;

    // Resolved endpoint; tells callers the port when bound to port 0.
    let mut stdout = std::io::stdout();
    let _ = writeln!(stdout, "listening on {}", bound.local_endpoint());
    let _ = stdout.flush();

    install_ctrlc_handler(bound.shutdown_handle())?;
    bound.serve().map_err(|err| rpc_error("serve failed", err))?;
    Ok(SUCCESS)
}

fn install_ctrlc_handler(shutdown: ShutdownHandle) -> CliResult<()> {
    ctrlc::set_handler(move || {
        info!("interrupt received, shutting down");
        shutdown.shutdown();
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SayHelloReq {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SayHelloResp {
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplexHelloReq {
    pub message: String,
    pub id: i64,
    pub metadata: std::collections::BTreeMap<String, String>,
    pub tags: Vec<String>,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexHelloResp {
    pub status: String,
    pub reply_id: String,
}

/// Demo service served by `xxrpc serve`.
pub struct EchoService;

impl EchoService {
    fn say(msg: String) -> Result<String, ServiceError> {
        Ok(msg.to_uppercase())
    }

    fn say_hello(req: SayHelloReq) -> Result<SayHelloResp, ServiceError> {
        Ok(SayHelloResp {
            message: format!("Echo:{}", req.message),
        })
    }

    fn complex_hello(req: ComplexHelloReq) -> Result<ComplexHelloResp, ServiceError> {
        if !req.enabled {
            return Err(ServiceError::new(format!("request {} is disabled", req.id)));
        }
        Ok(ComplexHelloResp {
            status: format!("ok:{}:{}", req.message, req.tags.len()),
            reply_id: format!("reply-{}", req.id),
        })
    }
}

impl Service for EchoService {
    const NAME: &'static str = "Echo";

    fn bind<C: Codec>(self: Arc<Self>, binder: &mut ServiceBinder<'_, C>) {
        binder
            .method("Say", Self::say)
            .method("SayHello", Self::say_hello)
            .method("ComplexHello", Self::complex_hello);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xxrpc_core::{JsonCodec, Registry};

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry.register_service(Arc::new(EchoService), JsonCodec);
        registry
    }

    fn invoke(registry: &Registry, key: &str, params: &str) -> Result<String, String> {
        let handler = registry.find(key).map_err(|err| err.to_string())?;
        let mut out = Vec::new();
        handler(params.as_bytes(), &mut out).map_err(|err| err.to_string())?;
        Ok(String::from_utf8(out).expect("json output is utf-8"))
    }

    #[test]
    fn echo_service_registers_three_methods() {
        assert_eq!(
            registry().keys(),
            vec!["Echo.ComplexHello", "Echo.Say", "Echo.SayHello"]
        );
    }

    #[test]
    fn say_hello_prefixes_message() {
        let out = invoke(&registry(), "Echo.SayHello", r#"{"message":"hi"}"#);
        assert_eq!(out.as_deref(), Ok(r#"{"message":"Echo:hi"}"#));
    }

    #[test]
    fn complex_hello_reports_disabled_requests() {
        let registry = registry();
        let out = invoke(
            &registry,
            "Echo.ComplexHello",
            r#"{"message":"m","id":7,"tags":["a","b"],"enabled":true}"#,
        );
        assert_eq!(
            out.as_deref(),
            Ok(r#"{"status":"ok:m:2","reply_id":"reply-7"}"#)
        );

        let err = invoke(&registry, "Echo.ComplexHello", r#"{"id":9}"#);
        assert_eq!(err, Err("request 9 is disabled".to_string()));
    }
}
