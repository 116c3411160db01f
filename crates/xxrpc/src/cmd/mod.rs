use clap::{Args, Subcommand};
use xxrpc_core::{CodecKind, DEFAULT_LISTEN};
use xxrpc_frame::{FrameConfig, DEFAULT_BUFFER_SIZE, DEFAULT_MAX_FRAME_SIZE};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod call;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run an RPC server exposing the built-in Echo service.
    Serve(ServeArgs),
    /// Call one method and print the response.
    Call(CallArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args),
        Command::Call(args) => call::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Settings both ends of a connection must agree on.
#[derive(Args, Debug, Clone)]
pub struct ConnArgs {
    /// Envelope codec (json, msgpack).
    #[arg(long, env = "XXRPC_CODEC", default_value = "json")]
    pub codec: CodecKind,
    /// Largest frame payload accepted, in bytes.
    #[arg(long, env = "XXRPC_MAX_FRAME_SIZE", default_value_t = DEFAULT_MAX_FRAME_SIZE)]
    pub max_frame_size: usize,
    /// Per-connection read window, in bytes.
    #[arg(long, env = "XXRPC_BUFFER_SIZE", default_value_t = DEFAULT_BUFFER_SIZE)]
    pub buffer_size: usize,
}

impl ConnArgs {
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_frame_size: self.max_frame_size,
            buffer_size: self.buffer_size,
        }
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Endpoint to listen on (`host:port` or `unix:/path`).
    #[arg(long, env = "XXRPC_LISTEN", default_value = DEFAULT_LISTEN)]
    pub listen: String,
    #[command(flatten)]
    pub conn: ConnArgs,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Server endpoint (`host:port` or `unix:/path`).
    pub endpoint: String,
    /// Method to call, as `Service.Method`.
    pub method: String,
    /// Call arguments as JSON.
    #[arg(long, default_value = "null")]
    pub json: String,
    #[command(flatten)]
    pub conn: ConnArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
