/// Errors that can occur while reading or writing frames.
///
/// Every variant is fatal to the connection it came from.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The declared or supplied payload length exceeds the configured maximum.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the connection cleanly between frames.
    #[error("connection closed")]
    ConnectionClosed,

    /// The peer closed the connection in the middle of a frame.
    #[error("connection closed mid-frame ({received} of {expected} bytes)")]
    Truncated { expected: usize, received: usize },

    /// The frame connection was already closed locally.
    #[error("frame connection is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
