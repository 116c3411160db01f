/// Errors produced by the envelope codec.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("json codec error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "msgpack")]
    #[error("msgpack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    #[cfg(feature = "msgpack")]
    #[error("msgpack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),
}

/// Dispatch failures. These are reported to the caller inside
/// `Response::error`; they never close the connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A key was not of the form `Service.Method`.
    #[error("invalid method key '{0}' (expected Service.Method)")]
    InvalidKey(String),

    #[error("service {0} not found")]
    ServiceNotFound(String),

    #[error("method {method} not found in service {service}")]
    MethodNotFound { service: String, method: String },
}

/// Error returned by application code, flattened to its message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ServiceError {
    message: String,
}

impl ServiceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<CodecError> for ServiceError {
    fn from(err: CodecError) -> Self {
        Self::new(err.to_string())
    }
}

/// Errors that can occur on the server or client side of a connection.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// Transport-level error (bind, connect, accept).
    #[error("transport error: {0}")]
    Transport(#[from] xxrpc_transport::TransportError),

    /// Frame-level error. Always fatal to the connection.
    #[error("frame error: {0}")]
    Frame(#[from] xxrpc_frame::FrameError),

    /// An envelope or argument failed to encode or decode.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The method key passed to a call is malformed.
    #[error(transparent)]
    InvalidMethod(#[from] RegistryError),

    /// The server answered with a non-empty `error` field.
    #[error("remote error: {0}")]
    Remote(String),
}

pub type Result<T> = std::result::Result<T, RpcError>;
