use tracing::debug;

use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::stream::RpcStream;
use crate::tcp::TcpSocket;
#[cfg(unix)]
use crate::uds::UnixDomainSocket;

/// A bound listener for any supported [`Endpoint`].
pub enum RpcListener {
    Tcp(TcpSocket),
    #[cfg(unix)]
    Unix(UnixDomainSocket),
}

impl RpcListener {
    /// Bind to the given endpoint.
    pub fn bind(endpoint: &Endpoint) -> Result<Self> {
        match endpoint {
            Endpoint::Tcp(addr) => Ok(Self::Tcp(TcpSocket::bind(addr)?)),
            #[cfg(unix)]
            Endpoint::Unix(path) => Ok(Self::Unix(UnixDomainSocket::bind(path)?)),
        }
    }

    /// Accept the next connection (blocking). Returns the stream and a
    /// label describing the remote side.
    pub fn accept(&self) -> Result<(RpcStream, String)> {
        let stream = match self {
            Self::Tcp(socket) => socket.accept()?,
            #[cfg(unix)]
            Self::Unix(socket) => socket.accept()?,
        };
        let peer = stream.peer_label();
        debug!(%peer, "accepted connection");
        Ok((stream, peer))
    }

    /// The endpoint actually bound (TCP port 0 resolved).
    pub fn local_endpoint(&self) -> Endpoint {
        match self {
            Self::Tcp(socket) => Endpoint::Tcp(socket.local_addr().to_string()),
            #[cfg(unix)]
            Self::Unix(socket) => Endpoint::Unix(socket.path().to_path_buf()),
        }
    }
}

/// Connect to a listening endpoint (blocking).
pub fn connect(endpoint: &Endpoint) -> Result<RpcStream> {
    match endpoint {
        Endpoint::Tcp(addr) => TcpSocket::connect(addr),
        #[cfg(unix)]
        Endpoint::Unix(path) => UnixDomainSocket::connect(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    fn exchange(listener: RpcListener) {
        let endpoint = listener.local_endpoint();
        let handle = std::thread::spawn(move || {
            let mut client = connect(&endpoint).unwrap();
            client.write_all(b"abc").unwrap();
        });

        let (mut server, peer) = listener.accept().unwrap();
        assert!(!peer.is_empty());
        let mut buf = [0u8; 3];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"abc");
        handle.join().unwrap();
    }

    #[test]
    fn tcp_listener_roundtrip() {
        let listener = RpcListener::bind(&Endpoint::tcp("127.0.0.1:0")).unwrap();
        assert!(matches!(listener.local_endpoint(), Endpoint::Tcp(addr) if !addr.ends_with(":0")));
        exchange(listener);
    }

    #[cfg(unix)]
    #[test]
    fn unix_listener_roundtrip() {
        let dir = std::env::temp_dir().join(format!("xxrpc-listener-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let endpoint = Endpoint::unix(dir.join("l.sock")).unwrap();

        let listener = RpcListener::bind(&endpoint).unwrap();
        assert_eq!(listener.local_endpoint(), endpoint);
        exchange(listener);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
