//! One query, one socket, one receive.
//!
//! A [`ResolverSession`] carries the receive timeout and buffer limits. Each
//! call to [`ResolverSession::resolve`] opens its own datagram socket, sends
//! the query, waits once for a reply and drops the socket again, whatever
//! the outcome. Nothing is retried here.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::Duration;

use tracing::debug;

use crate::config::{NameserverEndpoint, ResolverConfig};
use crate::error::{ConfigError, TransportError};

/// The socket operations a session needs from the transport.
pub trait DatagramSocket {
    /// Abandon a pending receive after `timeout`.
    fn set_receive_deadline(&self, timeout: Duration) -> io::Result<()>;

    fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<usize>;

    /// Expiry of the deadline shows up as `WouldBlock` or `TimedOut`,
    /// depending on the platform.
    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
}

/// Opens a fresh socket for every resolution attempt.
pub trait Connector {
    type Socket: DatagramSocket;

    fn open(&self) -> io::Result<Self::Socket>;
}

impl DatagramSocket for UdpSocket {
    fn set_receive_deadline(&self, timeout: Duration) -> io::Result<()> {
        self.set_read_timeout(Some(timeout))
    }

    fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<usize> {
        UdpSocket::send_to(self, buf, addr)
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buf)
    }
}

/// Binds an ephemeral UDP socket.
#[derive(Debug, Clone, Copy)]
pub struct UdpConnector {
    local: SocketAddr,
}

impl UdpConnector {
    pub fn bound_to(local: SocketAddr) -> UdpConnector {
        UdpConnector { local }
    }
}

impl Default for UdpConnector {
    fn default() -> UdpConnector {
        UdpConnector::bound_to(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)))
    }
}

impl Connector for UdpConnector {
    type Socket = UdpSocket;

    fn open(&self) -> io::Result<UdpSocket> {
        UdpSocket::bind(self.local)
    }
}

/// Raw bytes of a reply and who sent them. Nothing in here has been
/// checked against the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub bytes: Vec<u8>,
    pub source: SocketAddr,
}

#[derive(Debug)]
pub enum ResolutionOutcome {
    Received(Reply),
    TimedOut,
    TransportError(TransportError),
}

impl ResolutionOutcome {
    pub fn is_timed_out(&self) -> bool {
        matches!(self, ResolutionOutcome::TimedOut)
    }

    /// `Ok(None)` means the deadline passed without a reply.
    pub fn into_result(self) -> Result<Option<Reply>, TransportError> {
        match self {
            ResolutionOutcome::Received(reply) => Ok(Some(reply)),
            ResolutionOutcome::TimedOut => Ok(None),
            ResolutionOutcome::TransportError(err) => Err(err),
        }
    }
}

impl From<TransportError> for ResolutionOutcome {
    fn from(err: TransportError) -> ResolutionOutcome {
        ResolutionOutcome::TransportError(err)
    }
}

fn is_deadline_expiry(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

#[derive(Debug, Clone)]
pub struct ResolverSession<C = UdpConnector> {
    connector: C,
    timeout: Duration,
    max_query_size: usize,
    max_response_size: usize,
}

impl ResolverSession<UdpConnector> {
    pub fn new(config: &ResolverConfig) -> Result<ResolverSession<UdpConnector>, ConfigError> {
        ResolverSession::with_connector(UdpConnector::default(), config)
    }
}

impl<C: Connector> ResolverSession<C> {
    pub fn with_connector(connector: C, config: &ResolverConfig) -> Result<ResolverSession<C>, ConfigError> {
        config.validate()?;
        Ok(ResolverSession {
            connector,
            timeout: config.timeout,
            max_query_size: config.max_query_size,
            max_response_size: config.max_response_size,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sends `query` to `server` and waits up to the session timeout for
    /// a single datagram back.
    pub fn resolve(&self, query: &[u8], server: NameserverEndpoint) -> ResolutionOutcome {
        if query.is_empty() || query.len() > self.max_query_size {
            return TransportError::InvalidQuery {
                len: query.len(),
                max: self.max_query_size,
            }
            .into();
        }

        let socket = match self.open_socket() {
            Ok(socket) => socket,
            Err(err) => return TransportError::Setup(err).into(),
        };

        let addr = server.socket_addr();
        match socket.send_to(query, addr) {
            Ok(sent) if sent == query.len() => {}
            Ok(sent) => {
                let short = io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("sent {} of {} bytes", sent, query.len()),
                );
                return TransportError::Send(short).into();
            }
            Err(err) => return TransportError::Send(err).into(),
        }
        debug!(server = %server, len = query.len(), timeout = ?self.timeout, "query sent");

        let mut buf = vec![0u8; self.max_response_size];
        match socket.recv_from(&mut buf) {
            Ok((len, source)) => {
                debug!(%source, len, "reply received");
                buf.truncate(len);
                ResolutionOutcome::Received(Reply { bytes: buf, source })
            }
            Err(err) if is_deadline_expiry(&err) => {
                debug!(server = %server, "no reply before deadline");
                ResolutionOutcome::TimedOut
            }
            Err(err) => TransportError::Receive(err).into(),
        }
    }

    fn open_socket(&self) -> io::Result<C::Socket> {
        let socket = self.connector.open()?;
        socket.set_receive_deadline(self.timeout)?;
        Ok(socket)
    }
}

/// Single attempt over UDP with default buffer limits.
pub fn resolve(query: &[u8], server: NameserverEndpoint, timeout: Duration) -> ResolutionOutcome {
    let config = ResolverConfig {
        server,
        timeout,
        ..ResolverConfig::default()
    };
    match ResolverSession::new(&config) {
        Ok(session) => session.resolve(query, server),
        Err(err) => TransportError::Setup(io::Error::new(io::ErrorKind::InvalidInput, err)).into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Copy)]
    enum Script {
        OpenFails,
        DeadlineFails,
        SendFails,
        ShortSend,
        Reply,
        Expire(io::ErrorKind),
        RecvFails,
    }

    #[derive(Default)]
    struct Tally {
        opened: AtomicUsize,
        dropped: AtomicUsize,
        events: Mutex<Vec<&'static str>>,
    }

    struct MockConnector {
        script: Script,
        tally: Arc<Tally>,
    }

    struct MockSocket {
        script: Script,
        tally: Arc<Tally>,
    }

    const SERVER: SocketAddr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 53), 53));

    impl Connector for MockConnector {
        type Socket = MockSocket;

        fn open(&self) -> io::Result<MockSocket> {
            if let Script::OpenFails = self.script {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "no sockets"));
            }
            self.tally.opened.fetch_add(1, Ordering::SeqCst);
            Ok(MockSocket {
                script: self.script,
                tally: self.tally.clone(),
            })
        }
    }

    impl Drop for MockSocket {
        fn drop(&mut self) {
            self.tally.dropped.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl DatagramSocket for MockSocket {
        fn set_receive_deadline(&self, _timeout: Duration) -> io::Result<()> {
            match self.script {
                Script::DeadlineFails => Err(io::Error::new(io::ErrorKind::InvalidInput, "bad timeout")),
                _ => Ok(()),
            }
        }

        fn send_to(&self, buf: &[u8], _addr: SocketAddr) -> io::Result<usize> {
            self.tally.events.lock().unwrap().push("send");
            match self.script {
                Script::SendFails => Err(io::Error::new(io::ErrorKind::Other, "unreachable")),
                Script::ShortSend => Ok(buf.len() - 1),
                _ => Ok(buf.len()),
            }
        }

        fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
            self.tally.events.lock().unwrap().push("recv");
            match self.script {
                Script::Reply => {
                    buf[..3].copy_from_slice(&[1, 2, 3]);
                    Ok((3, SERVER))
                }
                Script::Expire(kind) => Err(io::Error::new(kind, "deadline")),
                _ => Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused")),
            }
        }
    }

    fn run(script: Script, query: &[u8]) -> (ResolutionOutcome, Arc<Tally>) {
        let tally = Arc::new(Tally::default());
        let connector = MockConnector {
            script,
            tally: tally.clone(),
        };
        let session = ResolverSession::with_connector(connector, &ResolverConfig::default()).unwrap();
        let server = NameserverEndpoint::with_port(Ipv4Addr::new(10, 0, 0, 53), 53);
        (session.resolve(query, server), tally)
    }

    #[test]
    fn reply_is_returned_raw() {
        let (outcome, tally) = run(Script::Reply, b"query");
        match outcome {
            ResolutionOutcome::Received(reply) => {
                assert_eq!(reply.bytes, vec![1, 2, 3]);
                assert_eq!(reply.source, SERVER);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(*tally.events.lock().unwrap(), vec!["send", "recv"]);
    }

    #[test]
    fn deadline_expiry_is_a_timeout() {
        for kind in [io::ErrorKind::WouldBlock, io::ErrorKind::TimedOut] {
            let (outcome, _) = run(Script::Expire(kind), b"query");
            assert!(outcome.is_timed_out(), "{:?}", kind);
        }
    }

    #[test]
    fn failures_are_classified() {
        let (outcome, tally) = run(Script::OpenFails, b"query");
        assert!(matches!(outcome, ResolutionOutcome::TransportError(TransportError::Setup(_))));
        assert_eq!(tally.opened.load(Ordering::SeqCst), 0);

        let (outcome, _) = run(Script::DeadlineFails, b"query");
        assert!(matches!(outcome, ResolutionOutcome::TransportError(TransportError::Setup(_))));

        let (outcome, tally) = run(Script::SendFails, b"query");
        assert!(matches!(outcome, ResolutionOutcome::TransportError(TransportError::Send(_))));
        assert_eq!(*tally.events.lock().unwrap(), vec!["send"]);

        let (outcome, _) = run(Script::ShortSend, b"query");
        assert!(matches!(outcome, ResolutionOutcome::TransportError(TransportError::Send(_))));

        let (outcome, _) = run(Script::RecvFails, b"query");
        assert!(matches!(outcome, ResolutionOutcome::TransportError(TransportError::Receive(_))));
    }

    #[test]
    fn socket_released_on_every_path() {
        for script in [
            Script::DeadlineFails,
            Script::SendFails,
            Script::ShortSend,
            Script::Reply,
            Script::Expire(io::ErrorKind::WouldBlock),
            Script::RecvFails,
        ] {
            let (_, tally) = run(script, b"query");
            assert_eq!(tally.opened.load(Ordering::SeqCst), 1);
            assert_eq!(tally.dropped.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn bad_query_never_opens_a_socket() {
        let (outcome, tally) = run(Script::Reply, b"");
        assert!(matches!(
            outcome,
            ResolutionOutcome::TransportError(TransportError::InvalidQuery { len: 0, max: 1024 })
        ));

        let (outcome, _) = run(Script::Reply, &[0u8; 1025]);
        assert!(matches!(
            outcome,
            ResolutionOutcome::TransportError(TransportError::InvalidQuery { len: 1025, .. })
        ));
        assert_eq!(tally.opened.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = ResolverConfig {
            timeout: Duration::ZERO,
            ..ResolverConfig::default()
        };
        assert_eq!(ResolverSession::new(&config).unwrap_err(), ConfigError::ZeroTimeout);
    }

    #[test]
    fn outcome_into_result() {
        assert!(matches!(ResolutionOutcome::TimedOut.into_result(), Ok(None)));
        let (outcome, _) = run(Script::RecvFails, b"query");
        assert!(outcome.into_result().is_err());
    }
}
