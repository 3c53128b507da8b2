use std::io::{self, Write};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::PingConfig;
use crate::icmp;
use crate::reply::{self, MatchResult};
use crate::transport::{ReceiveError, Transport};

/// Resultado de um único probe.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Success {
        rtt: Duration,
        ttl: u8,
        bytes: usize,
        from: Ipv4Addr,
        sequence: u16,
    },
    Timeout,
    SendFailed { reason: String },
    UnexpectedReply { reason: String },
    ReceiveFailed { reason: String },
}

impl ProbeOutcome {
    /// true quando o envio saiu (tudo exceto `SendFailed`).
    pub fn was_sent(&self) -> bool {
        !matches!(self, Self::SendFailed { .. })
    }
}

/// Contadores da sessão.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionStats {
    pub sent: u64,
    pub received: u64,
    pub lost: u64,
    min_rtt: Option<Duration>,
    max_rtt: Option<Duration>,
    rtt_sum: Duration,
}

impl SessionStats {
    /// Cada probe incrementa exatamente um de `received`/`lost`.
    pub fn record(&mut self, outcome: &ProbeOutcome) {
        if outcome.was_sent() {
            self.sent += 1;
        }
        match outcome {
            ProbeOutcome::Success { rtt, .. } => {
                self.received += 1;
                self.rtt_sum += *rtt;
                self.min_rtt = Some(self.min_rtt.map_or(*rtt, |m| m.min(*rtt)));
                self.max_rtt = Some(self.max_rtt.map_or(*rtt, |m| m.max(*rtt)));
            }
            _ => self.lost += 1,
        }
    }

    pub fn min_rtt(&self) -> Option<Duration> {
        self.min_rtt
    }

    pub fn max_rtt(&self) -> Option<Duration> {
        self.max_rtt
    }

    pub fn avg_rtt(&self) -> Option<Duration> {
        if self.received == 0 {
            return None;
        }
        u32::try_from(self.received)
            .ok()
            .map(|n| self.rtt_sum / n)
    }
}

/// Sessão de ping contra um único destino.
pub struct PingSession<T: Transport> {
    transport: T,
    destination: Ipv4Addr,
    config: PingConfig,
    running: Option<Arc<AtomicBool>>,
}

impl<T: Transport> PingSession<T> {
    pub fn new(transport: T, destination: Ipv4Addr, config: PingConfig) -> Self {
        Self {
            transport,
            destination,
            config,
            running: None,
        }
    }

    /// Flag compartilhada com o handler de Ctrl+C; `false` encerra antes do
    /// próximo probe.
    pub fn with_interrupt(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = Some(running);
        self
    }

    pub fn config(&self) -> &PingConfig {
        &self.config
    }

    /// Devolve o transporte; o socket fecha quando ele for descartado.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Executa todos os probes, escreve uma linha por probe e o resumo em
    /// `out`, e devolve as estatísticas.
    pub fn run<W: Write>(&mut self, out: &mut W) -> io::Result<SessionStats> {
        let mut stats = SessionStats::default();
        let mut seq: u16 = 0;

        for i in 0..self.config.count {
            if self.interrupted() {
                debug!(probes_done = i, "interrupted");
                break;
            }

            let outcome = self.probe(seq);
            stats.record(&outcome);
            write_outcome(out, seq, &outcome)?;

            seq = seq.wrapping_add(1);

            // Sem sleep depois do último
            if i + 1 < self.config.count && !self.config.interval.is_zero() {
                std::thread::sleep(self.config.interval);
            }
        }

        write_summary(out, &stats)?;
        Ok(stats)
    }

    /// Um ciclo envio -> espera -> classificação.
    pub fn probe(&mut self, seq: u16) -> ProbeOutcome {
        let ident = self.config.identifier;
        let pkt = icmp::build_echo_request(ident, seq, self.config.payload_size);

        // Marca o instante do envio para calcular o RTT depois
        let t0 = Instant::now();

        if let Err(e) = self.transport.send(&pkt, self.destination) {
            debug!(seq, error = %e, "send failed");
            return ProbeOutcome::SendFailed {
                reason: e.to_string(),
            };
        }

        let deadline = t0 + self.config.timeout;
        let received = match self.transport.receive(deadline) {
            Ok(r) => r,
            Err(ReceiveError::TimedOut) => return ProbeOutcome::Timeout,
            Err(e) => {
                debug!(seq, error = %e, "receive failed");
                return ProbeOutcome::ReceiveFailed {
                    reason: e.to_string(),
                };
            }
        };
        let rtt = t0.elapsed();

        match reply::validate(&received.bytes, ident) {
            MatchResult::Valid(r) => {
                if r.sequence != seq {
                    // Resposta atrasada de um probe anterior; conta, mas avisa
                    warn!(expected = seq, got = r.sequence, "reply for another sequence");
                }
                if !r.checksum_valid {
                    debug!(seq, "reply checksum mismatch");
                }
                if !r.payload_intact {
                    debug!(seq, "reply payload differs from request pattern");
                }
                let from = if received.sender.is_unspecified() {
                    r.source
                } else {
                    received.sender
                };
                ProbeOutcome::Success {
                    rtt,
                    ttl: r.ttl,
                    bytes: r.icmp_len,
                    from,
                    sequence: r.sequence,
                }
            }
            MatchResult::Foreign(reason) => {
                debug!(seq, sender = %received.sender, %reason, "foreign reply");
                ProbeOutcome::UnexpectedReply {
                    reason: reason.to_string(),
                }
            }
            MatchResult::Malformed(reason) => {
                debug!(seq, sender = %received.sender, %reason, "malformed reply");
                ProbeOutcome::UnexpectedReply {
                    reason: reason.to_string(),
                }
            }
        }
    }

    fn interrupted(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|r| !r.load(Ordering::SeqCst))
    }
}

/// Escreve a linha correspondente a um probe.
pub fn write_outcome<W: Write>(out: &mut W, seq: u16, outcome: &ProbeOutcome) -> io::Result<()> {
    match outcome {
        ProbeOutcome::Success {
            rtt,
            ttl,
            bytes,
            from,
            sequence,
        } => writeln!(
            out,
            "Reply from {}: bytes={} time={}ms TTL={} seq={}",
            from,
            bytes,
            rtt.as_millis(),
            ttl,
            sequence
        ),
        ProbeOutcome::Timeout => writeln!(out, "Request timed out: seq={seq}"),
        ProbeOutcome::SendFailed { reason } => writeln!(out, "send failed: seq={seq}: {reason}"),
        ProbeOutcome::UnexpectedReply { reason } => {
            writeln!(out, "unexpected reply: seq={seq}: {reason}")
        }
        ProbeOutcome::ReceiveFailed { reason } => {
            writeln!(out, "receive failed: seq={seq}: {reason}")
        }
    }
}

/// Resumo final: contadores e, se houve resposta, rtt min/avg/max.
pub fn write_summary<W: Write>(out: &mut W, stats: &SessionStats) -> io::Result<()> {
    writeln!(out)?;
    writeln!(
        out,
        "packets: sent: {}, recv: {}, lost: {}",
        stats.sent, stats.received, stats.lost
    )?;
    if let (Some(min), Some(avg), Some(max)) = (stats.min_rtt(), stats.avg_rtt(), stats.max_rtt()) {
        writeln!(
            out,
            "rtt min/avg/max = {:.3}/{:.3}/{:.3} ms",
            min.as_secs_f64() * 1000.0,
            avg.as_secs_f64() * 1000.0,
            max.as_secs_f64() * 1000.0
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(ms: u64) -> ProbeOutcome {
        ProbeOutcome::Success {
            rtt: Duration::from_millis(ms),
            ttl: 64,
            bytes: 40,
            from: Ipv4Addr::LOCALHOST,
            sequence: 0,
        }
    }

    #[test]
    fn send_failure_counts_lost_but_not_sent() {
        let mut stats = SessionStats::default();
        stats.record(&ProbeOutcome::SendFailed {
            reason: "no route".into(),
        });
        assert_eq!((stats.sent, stats.received, stats.lost), (0, 0, 1));
    }

    #[test]
    fn post_send_losses_count_sent() {
        let mut stats = SessionStats::default();
        stats.record(&ProbeOutcome::Timeout);
        stats.record(&ProbeOutcome::UnexpectedReply {
            reason: "foreign".into(),
        });
        stats.record(&ProbeOutcome::ReceiveFailed {
            reason: "reset".into(),
        });
        assert_eq!((stats.sent, stats.received, stats.lost), (3, 0, 3));
        assert_eq!(stats.avg_rtt(), None);
    }

    #[test]
    fn rtt_aggregates() {
        let mut stats = SessionStats::default();
        stats.record(&success(10));
        stats.record(&success(30));
        stats.record(&ProbeOutcome::Timeout);
        assert_eq!(stats.min_rtt(), Some(Duration::from_millis(10)));
        assert_eq!(stats.max_rtt(), Some(Duration::from_millis(30)));
        assert_eq!(stats.avg_rtt(), Some(Duration::from_millis(20)));
    }

    #[test]
    fn success_line_format() {
        let mut out = Vec::new();
        write_outcome(&mut out, 0, &success(15)).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Reply from 127.0.0.1: bytes=40 time=15ms TTL=64 seq=0\n"
        );
    }

    #[test]
    fn summary_without_replies_has_no_rtt_line() {
        let mut stats = SessionStats::default();
        stats.record(&ProbeOutcome::Timeout);
        let mut out = Vec::new();
        write_summary(&mut out, &stats).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "\npackets: sent: 1, recv: 0, lost: 1\n"
        );
    }

    #[test]
    fn summary_with_replies_prints_rtt() {
        let mut stats = SessionStats::default();
        stats.record(&success(2));
        let mut out = Vec::new();
        write_summary(&mut out, &stats).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with("rtt min/avg/max = 2.000/2.000/2.000 ms\n"));
    }
}
