use std::io::{self, Read};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::{Duration, Instant};

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use thiserror::Error;
use tracing::debug;

/// Buffer de recepção: o maior datagrama IPv4 possível (total length é u16).
pub const RECV_BUFFER_SIZE: usize = u16::MAX as usize;

/// Falha ao abrir o socket RAW; sempre fatal.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error(
        "permission denied opening raw ICMP socket (run as root/Administrator or grant CAP_NET_RAW)"
    )]
    PermissionDenied(#[source] io::Error),

    #[error("failed to open raw ICMP socket: {0}")]
    Open(#[source] io::Error),
}

#[derive(Debug, Error)]
#[error("send to {destination} failed: {source}")]
pub struct SendError {
    pub destination: Ipv4Addr,
    #[source]
    pub source: io::Error,
}

#[derive(Debug, Error)]
pub enum ReceiveError {
    /// Prazo esgotado sem datagrama. Resultado esperado sob perda.
    #[error("timed out")]
    TimedOut,

    #[error("receive failed: {0}")]
    Io(#[source] io::Error),
}

/// Datagrama recebido, com o cabeçalho IPv4 no início.
#[derive(Debug, Clone)]
pub struct Received {
    pub bytes: Vec<u8>,
    pub sender: Ipv4Addr,
}

/// Ponto de envio/recepção usado pela sessão.
pub trait Transport {
    /// Uma única tentativa de envio, sem retry.
    fn send(&mut self, packet: &[u8], destination: Ipv4Addr) -> Result<(), SendError>;

    /// Bloqueia até chegar um datagrama ou até `deadline`.
    fn receive(&mut self, deadline: Instant) -> Result<Received, ReceiveError>;
}

/// Socket ICMP RAW (IPv4). Fechado no `Drop`.
#[derive(Debug)]
pub struct RawTransport {
    sock: Socket,
}

impl RawTransport {
    /// Cria o socket RAW.
    /// Domain::IPV4 -> AF_INET, Type::from(SOCK_RAW), Protocol::ICMPV4 -> IPPROTO_ICMP
    /// Nota: Type::RAW só existe com a feature "all" do socket2.
    pub fn open() -> Result<Self, TransportError> {
        let raw = Type::from(libc::SOCK_RAW);
        let sock = Socket::new(Domain::IPV4, raw, Some(Protocol::ICMPV4)).map_err(|e| {
            if is_permission_error(&e) {
                TransportError::PermissionDenied(e)
            } else {
                TransportError::Open(e)
            }
        })?;
        debug!("raw ICMP socket opened");
        Ok(Self { sock })
    }
}

impl Transport for RawTransport {
    fn send(&mut self, packet: &[u8], destination: Ipv4Addr) -> Result<(), SendError> {
        // Porta 0 é ignorada para ICMP
        let addr = SockAddr::from(SocketAddrV4::new(destination, 0));
        self.sock
            .send_to(packet, &addr)
            .map(|_| ())
            .map_err(|source| SendError { destination, source })
    }

    fn receive(&mut self, deadline: Instant) -> Result<Received, ReceiveError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        // set_read_timeout rejeita Duration::ZERO
        if remaining < Duration::from_millis(1) {
            return Err(ReceiveError::TimedOut);
        }
        self.sock
            .set_read_timeout(Some(remaining))
            .map_err(ReceiveError::Io)?;

        // peek_sender não consome o datagrama; o read a seguir lê o mesmo
        let sender = self.sock.peek_sender().map_err(classify)?;
        let sender = sender
            .as_socket_ipv4()
            .map(|sa| *sa.ip())
            .unwrap_or(Ipv4Addr::UNSPECIFIED);

        // Buffer novo a cada recepção
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        let n = (&self.sock).read(&mut buf).map_err(classify)?;
        buf.truncate(n);

        Ok(Received { bytes: buf, sender })
    }
}

impl Drop for RawTransport {
    fn drop(&mut self) {
        debug!("raw ICMP socket closed");
    }
}

fn classify(e: io::Error) -> ReceiveError {
    match e.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => ReceiveError::TimedOut,
        _ => ReceiveError::Io(e),
    }
}

fn is_permission_error(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::PermissionDenied
        || matches!(e.raw_os_error(), Some(libc::EPERM) | Some(libc::EACCES))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn would_block_and_timed_out_map_to_timeout() {
        let e = io::Error::from(io::ErrorKind::WouldBlock);
        assert!(matches!(classify(e), ReceiveError::TimedOut));
        let e = io::Error::from(io::ErrorKind::TimedOut);
        assert!(matches!(classify(e), ReceiveError::TimedOut));
    }

    #[test]
    fn other_errors_stay_io() {
        let e = io::Error::from(io::ErrorKind::ConnectionReset);
        assert!(matches!(classify(e), ReceiveError::Io(_)));
    }

    #[test]
    fn eperm_is_permission_error() {
        assert!(is_permission_error(&io::Error::from_raw_os_error(libc::EPERM)));
        assert!(is_permission_error(&io::Error::from_raw_os_error(libc::EACCES)));
        assert!(!is_permission_error(&io::Error::from(io::ErrorKind::AddrInUse)));
    }

    #[test]
    fn receive_buffer_holds_largest_ipv4_datagram() {
        let largest = crate::reply::encode_echo_reply(
            Ipv4Addr::LOCALHOST,
            64,
            1,
            0,
            crate::icmp::MAX_PAYLOAD_SIZE,
        );
        assert_eq!(largest.len(), RECV_BUFFER_SIZE);
    }

    #[test]
    fn send_error_names_destination() {
        let e = SendError {
            destination: Ipv4Addr::new(192, 0, 2, 1),
            source: io::Error::from(io::ErrorKind::NetworkUnreachable),
        };
        assert!(e.to_string().starts_with("send to 192.0.2.1 failed"));
    }
}
