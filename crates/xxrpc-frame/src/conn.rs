use std::borrow::Cow;
use std::io::{ErrorKind, IoSlice, Read, Write};
use std::sync::Arc;

use tracing::trace;

use crate::codec::{decode_header, encode_header, FrameConfig, HEADER_SIZE, MIN_BUFFER_SIZE};
use crate::error::{FrameError, Result};
use crate::pool::BufferPool;

/// Reads and writes length-prefixed frames over one stream.
///
/// Reads go through a read window `[start, end)` inside a buffer borrowed
/// from a [`BufferPool`] for the lifetime of the connection. A frame that
/// fits in the window is returned as a borrowed view into it; the borrow
/// ends at the next [`read_frame`](Self::read_frame) or
/// [`close`](Self::close), so a caller that needs the bytes for longer must
/// copy them first. Frames larger than the window are read into a private
/// allocation and returned owned.
///
/// A `FrameConn` belongs to exactly one connection worker. It is not meant
/// to be shared between threads.
pub struct FrameConn<T: Read + Write> {
    stream: Option<T>,
    buf: Option<Vec<u8>>,
    start: usize,
    end: usize,
    pool: Arc<BufferPool>,
    config: FrameConfig,
}

impl<T: Read + Write> FrameConn<T> {
    /// Wrap `stream` with the default [`FrameConfig`].
    pub fn new(stream: T, pool: Arc<BufferPool>) -> Self {
        Self::with_config(stream, pool, FrameConfig::default())
    }

    /// Wrap `stream`, taking the read window from `pool`.
    pub fn with_config(stream: T, pool: Arc<BufferPool>, config: FrameConfig) -> Self {
        let mut buf = pool.acquire();
        buf.resize(config.buffer_size.max(MIN_BUFFER_SIZE), 0);
        Self {
            stream: Some(stream),
            buf: Some(buf),
            start: 0,
            end: 0,
            pool,
            config,
        }
    }

    /// Read the next complete frame (blocking) and return its payload.
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when the peer closes the
    /// stream cleanly between frames. A header declaring more than
    /// `max_frame_size` bytes fails with `FrameTooLarge` before any of the
    /// payload is read.
    pub fn read_frame(&mut self) -> Result<Cow<'_, [u8]>> {
        self.fill(HEADER_SIZE)?;

        let window = self.buf.as_ref().ok_or(FrameError::Closed)?;
        let mut header = [0u8; HEADER_SIZE];
        header.copy_from_slice(&window[self.start..self.start + HEADER_SIZE]);
        let len = decode_header(header);
        if len > self.config.max_frame_size {
            return Err(FrameError::FrameTooLarge {
                size: len,
                max: self.config.max_frame_size,
            });
        }

        let total = HEADER_SIZE + len;
        if total > window.len() {
            return self.read_oversized(len).map(Cow::Owned);
        }

        self.fill(total)?;
        let payload_start = self.start + HEADER_SIZE;
        let payload_end = payload_start + len;
        self.start = payload_end;
        if self.start == self.end {
            self.start = 0;
            self.end = 0;
        }

        let window = self.buf.as_ref().ok_or(FrameError::Closed)?;
        Ok(Cow::Borrowed(&window[payload_start..payload_end]))
    }

    /// Write one frame: header and payload go out in a single vectored
    /// write when the stream supports it.
    pub fn write_frame(&mut self, payload: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(FrameError::Closed)?;
        let header = encode_header(payload.len(), self.config.max_frame_size)?;

        let mut slices = [IoSlice::new(&header), IoSlice::new(payload)];
        let mut remaining: &mut [IoSlice<'_>] = &mut slices;
        while !remaining.is_empty() {
            match stream.write_vectored(remaining) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => IoSlice::advance_slices(&mut remaining, n),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        loop {
            match stream.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Return the read window to the pool and close the stream.
    ///
    /// Both steps run even if flushing the stream fails. Closing twice is a
    /// no-op.
    pub fn close(&mut self) -> Result<()> {
        if let Some(buf) = self.buf.take() {
            self.pool.release(buf);
        }
        self.start = 0;
        self.end = 0;

        match self.stream.take() {
            Some(mut stream) => {
                let flushed = stream.flush();
                drop(stream);
                flushed.map_err(FrameError::Io)
            }
            None => Ok(()),
        }
    }

    /// Whether [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    /// Bytes read from the stream but not yet returned as frames.
    pub fn buffered(&self) -> usize {
        self.end - self.start
    }

    /// Borrow the underlying stream, if still open.
    pub fn get_ref(&self) -> Option<&T> {
        self.stream.as_ref()
    }

    /// Current configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Read until at least `need` bytes are resident in the window.
    /// `need` never exceeds the window size.
    fn fill(&mut self, need: usize) -> Result<()> {
        let (Some(buf), Some(stream)) = (self.buf.as_mut(), self.stream.as_mut()) else {
            return Err(FrameError::Closed);
        };

        while self.end - self.start < need {
            if self.start > 0 {
                buf.copy_within(self.start..self.end, 0);
                self.end -= self.start;
                self.start = 0;
            }

            let read = match stream.read(&mut buf[self.end..]) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                let received = self.end - self.start;
                return Err(if received == 0 {
                    FrameError::ConnectionClosed
                } else {
                    FrameError::Truncated {
                        expected: need,
                        received,
                    }
                });
            }
            self.end += read;
        }

        Ok(())
    }

    /// Slow path for a frame larger than the window: the header has been
    /// parsed, payload bytes already resident are copied out, and the rest
    /// is read straight into an exact-size allocation.
    fn read_oversized(&mut self, len: usize) -> Result<Vec<u8>> {
        let (Some(buf), Some(stream)) = (self.buf.as_ref(), self.stream.as_mut()) else {
            return Err(FrameError::Closed);
        };

        self.start += HEADER_SIZE;
        let present = self.end - self.start;
        let mut out = vec![0u8; len];
        out[..present].copy_from_slice(&buf[self.start..self.end]);
        self.start = 0;
        self.end = 0;

        trace!(len, present, "reading frame larger than window");

        let mut filled = present;
        while filled < len {
            match stream.read(&mut out[filled..]) {
                Ok(0) => {
                    return Err(FrameError::Truncated {
                        expected: HEADER_SIZE + len,
                        received: HEADER_SIZE + filled,
                    })
                }
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        Ok(out)
    }
}

impl<T: Read + Write> Drop for FrameConn<T> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl<T: Read + Write> std::fmt::Debug for FrameConn<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameConn")
            .field("closed", &self.is_closed())
            .field("start", &self.start)
            .field("end", &self.end)
            .field("config", &self.config)
            .finish()
    }
}
