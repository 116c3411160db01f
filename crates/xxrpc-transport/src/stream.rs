use std::io::{IoSlice, Read, Write};
use std::net::{Shutdown, TcpStream};

use crate::error::Result;

/// A connected stream socket: implements Read + Write.
///
/// This is the fundamental I/O type returned by transport operations.
/// Vectored writes go straight to the socket so a frame header and its
/// payload can leave in a single syscall.
pub struct RpcStream {
    inner: RpcStreamInner,
}

enum RpcStreamInner {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for RpcStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            RpcStreamInner::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            RpcStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for RpcStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            RpcStreamInner::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            RpcStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> std::io::Result<usize> {
        match &mut self.inner {
            RpcStreamInner::Tcp(stream) => stream.write_vectored(bufs),
            #[cfg(unix)]
            RpcStreamInner::Unix(stream) => stream.write_vectored(bufs),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            RpcStreamInner::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            RpcStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl RpcStream {
    /// Wrap a TCP stream with Nagle disabled.
    pub(crate) fn from_tcp(stream: TcpStream) -> Result<Self> {
        stream.set_nodelay(true)?;
        Ok(Self {
            inner: RpcStreamInner::Tcp(stream),
        })
    }

    /// Wrap a Unix domain socket stream.
    #[cfg(unix)]
    pub fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: RpcStreamInner::Unix(stream),
        }
    }

    /// Human-readable address of the remote side, for logging.
    pub fn peer_label(&self) -> String {
        match &self.inner {
            RpcStreamInner::Tcp(stream) => stream
                .peer_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| "tcp:unknown".to_string()),
            #[cfg(unix)]
            RpcStreamInner::Unix(stream) => match stream.peer_addr() {
                Ok(addr) => match addr.as_pathname() {
                    Some(path) => format!("unix:{}", path.display()),
                    None => "unix:unnamed".to_string(),
                },
                Err(_) => "unix:unknown".to_string(),
            },
        }
    }

    /// Shut down both halves of the connection.
    pub fn shutdown(&self) -> Result<()> {
        match &self.inner {
            RpcStreamInner::Tcp(stream) => stream.shutdown(Shutdown::Both)?,
            #[cfg(unix)]
            RpcStreamInner::Unix(stream) => stream.shutdown(Shutdown::Both)?,
        }
        Ok(())
    }
}

impl std::fmt::Debug for RpcStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.inner {
            RpcStreamInner::Tcp(_) => "tcp",
            #[cfg(unix)]
            RpcStreamInner::Unix(_) => "unix",
        };
        f.debug_struct("RpcStream").field("type", &kind).finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn vectored_write_reaches_peer_intact() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = RpcStream::from_unix(left);
        let mut reader = RpcStream::from_unix(right);

        let bufs = [IoSlice::new(b"head"), IoSlice::new(b"-body")];
        let n = writer.write_vectored(&bufs).unwrap();
        assert_eq!(n, 9);

        let mut out = [0u8; 9];
        reader.read_exact(&mut out).unwrap();
        assert_eq!(&out, b"head-body");
    }

    #[test]
    fn shutdown_signals_eof() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let writer = RpcStream::from_unix(left);
        let mut reader = RpcStream::from_unix(right);

        writer.shutdown().unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn debug_names_transport() {
        let (left, _right) = std::os::unix::net::UnixStream::pair().unwrap();
        let stream = RpcStream::from_unix(left);
        assert!(format!("{stream:?}").contains("unix"));
    }
}
