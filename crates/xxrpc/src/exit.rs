use std::fmt;
use std::io;

use xxrpc_core::RpcError;
use xxrpc_frame::FrameError;
use xxrpc_transport::TransportError;

pub const SUCCESS: i32 = 0;
/// An I/O failure with no more specific code.
pub const FAILURE: i32 = 1;
/// The call completed but the server answered with an error.
pub const REMOTE_ERROR: i32 = 2;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::NotFound
        | io::ErrorKind::AddrInUse => TRANSPORT_ERROR,
        _ => FAILURE,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { endpoint, source } => {
            io_error(&format!("{context} ({endpoint})"), source)
        }
        TransportError::Connect { endpoint, source } => {
            io_error(&format!("{context} ({endpoint})"), source)
        }
        TransportError::Accept(source) | TransportError::Io(source) => io_error(context, source),
        TransportError::InvalidEndpoint(_) | TransportError::PathTooLong { .. } => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::FrameTooLarge { .. } => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        FrameError::ConnectionClosed | FrameError::Truncated { .. } => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        FrameError::Closed => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

pub fn rpc_error(context: &str, err: RpcError) -> CliError {
    match err {
        RpcError::Transport(err) => transport_error(context, err),
        RpcError::Frame(err) => frame_error(context, err),
        RpcError::Codec(err) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        RpcError::InvalidMethod(err) => CliError::new(USAGE, format!("{context}: {err}")),
        RpcError::Remote(message) => CliError::new(REMOTE_ERROR, format!("{context}: {message}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xxrpc_core::RegistryError;

    #[test]
    fn maps_layer_errors_to_stable_codes() {
        let refused = TransportError::Connect {
            endpoint: "127.0.0.1:1".to_string(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        assert_eq!(rpc_error("connect", refused.into()).code, TRANSPORT_ERROR);

        let too_large = FrameError::FrameTooLarge { size: 10, max: 1 };
        assert_eq!(rpc_error("call", too_large.into()).code, DATA_INVALID);

        let bad_key = RegistryError::InvalidKey("Nope".to_string());
        assert_eq!(rpc_error("call", bad_key.into()).code, USAGE);

        let remote = rpc_error("call", RpcError::Remote("boom".to_string()));
        assert_eq!(remote.code, REMOTE_ERROR);
        assert_eq!(remote.to_string(), "call: boom");
    }

    #[test]
    fn unclassified_io_error_is_generic_failure() {
        let err = io_error("read", io::Error::other("disk on fire"));
        assert_eq!(err.code, FAILURE);
        assert_eq!(err.to_string(), "read: disk on fire");

        let denied = io_error("bind", io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(denied.code, PERMISSION_DENIED);
    }

    #[test]
    fn invalid_endpoint_is_usage_error() {
        let err = transport_error("listen", TransportError::InvalidEndpoint(String::new()));
        assert_eq!(err.code, USAGE);
    }
}
