use std::time::Instant;

use tracing::debug;
use xxrpc_core::{Client, ClientConfig};
use xxrpc_frame::PoolConfig;
use xxrpc_transport::Endpoint;

use crate::cmd::CallArgs;
use crate::exit::{rpc_error, transport_error, CliError, CliResult, REMOTE_ERROR, SUCCESS, USAGE};
use crate::output::{print_response, OutputFormat};

pub fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let params: serde_json::Value = serde_json::from_str(&args.json)
        .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;
    let endpoint = Endpoint::parse(&args.endpoint)
        .map_err(|err| transport_error("invalid endpoint", err))?;

    let config = ClientConfig {
        frame: args.conn.frame_config(),
        pool: PoolConfig::default(),
    };
    let codec = args.conn.codec;
    let mut client =
        Client::connect(&endpoint, config, codec).map_err(|err| rpc_error("connect failed", err))?;

    let started = Instant::now();
    let resp = client
        .call(&args.method, &params)
        .map_err(|err| rpc_error("call failed", err))?;
    let elapsed_us = started.elapsed().as_micros();
    debug!(method = %args.method, elapsed_us, error = resp.is_error(), "call finished");

    print_response(&args.method, codec, &resp, elapsed_us, format);
    client
        .close()
        .map_err(|err| rpc_error("close failed", err))?;

    Ok(if resp.is_error() { REMOTE_ERROR } else { SUCCESS })
}
