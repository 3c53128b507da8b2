//! Motor de ICMP Echo (ping) sobre socket RAW IPv4.
//!
//! `icmp` monta os requests, `reply` classifica o que chega, `transport`
//! encapsula o socket e `session` orquestra os probes e as estatísticas.

pub mod config;
pub mod icmp;
pub mod reply;
pub mod session;
pub mod transport;

pub use config::PingConfig;
pub use reply::{EchoReply, MatchResult};
pub use session::{PingSession, ProbeOutcome, SessionStats};
pub use transport::{RawTransport, ReceiveError, Received, SendError, Transport, TransportError};
