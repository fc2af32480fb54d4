use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::Stream;

/// Listening TCP endpoint.
///
/// Binds immediately on construction. [`accept`](Self::accept) blocks the
/// calling thread; another thread can unblock it with [`wake`](Self::wake).
pub struct TcpTransport {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpTransport {
    /// Bind and listen on all IPv4 interfaces at `port`.
    ///
    /// Port 0 asks the OS for an ephemeral port; see [`local_addr`](Self::local_addr).
    pub fn bind(port: u16) -> Result<Self> {
        Self::bind_addr(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port))
    }

    /// Bind and listen on an explicit address.
    pub fn bind_addr(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).map_err(|e| TransportError::Bind { addr, source: e })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| TransportError::Bind { addr, source: e })?;

        info!(%local_addr, "listening on tcp");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<Stream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%peer, "accepted connection");
        Ok(Stream::from_tcp(stream))
    }

    /// Connect to a listening peer (blocking).
    pub fn connect(host: &str, port: u16) -> Result<Stream> {
        Self::connect_timeout(host, port, None)
    }

    /// Connect to a listening peer, bounding each address attempt by `timeout`.
    pub fn connect_timeout(host: &str, port: u16, timeout: Option<Duration>) -> Result<Stream> {
        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|e| TransportError::Connect {
                host: host.to_string(),
                port,
                source: e,
            })?
            .collect();

        let mut last_err = None;
        for addr in addrs {
            let attempt = match timeout {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => {
                    debug!(%addr, "connected over tcp");
                    return Ok(Stream::from_tcp(stream));
                }
                Err(err) => {
                    debug!(%addr, error = %err, "connect attempt failed");
                    last_err = Some(err);
                }
            }
        }

        match last_err {
            Some(source) => Err(TransportError::Connect {
                host: host.to_string(),
                port,
                source,
            }),
            None => Err(TransportError::Resolve {
                host: host.to_string(),
                port,
            }),
        }
    }

    /// Unblock a thread parked in [`accept`](Self::accept).
    ///
    /// Opens and immediately drops a loopback connection to this listener.
    /// The accepting side must check its own stop flag before dispatching.
    /// Fails if the connect does not complete within one second, in which
    /// case the accepting thread stays parked until a real client arrives.
    pub fn wake(&self) -> Result<()> {
        let target = loopback_target(self.local_addr);
        let stream = TcpStream::connect_timeout(&target, Duration::from_secs(1))?;
        drop(stream);
        debug!(%target, "woke accept loop");
        Ok(())
    }

    /// The address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "tcp"
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("local_addr", &self.local_addr)
            .finish()
    }
}

fn loopback_target(addr: SocketAddr) -> SocketAddr {
    match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), addr.port())
        }
        _ => addr,
    }
}
