use std::fmt;
use std::net::Ipv4Addr;

use crate::icmp::{self, ECHO_REPLY, ICMP_HEADER_SIZE};

/// Menor cabeçalho IPv4 possível (IHL=5).
pub const MIN_IPV4_HEADER: usize = 20;

/// Visão decodificada de um Echo Reply recebido (IPv4 + ICMP).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoReply {
    pub ip_header_length: usize,
    pub ttl: u8,
    pub source: Ipv4Addr,
    pub icmp_type: u8,
    pub code: u8,
    pub identifier: u16,
    pub sequence: u16,
    /// Bytes depois do cabeçalho IP (cabeçalho ICMP + payload).
    pub icmp_len: usize,
    pub checksum_valid: bool,
    pub payload_intact: bool,
}

/// Por que um datagrama não é uma resposta para esta sessão.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeignReason {
    NotEchoReply { icmp_type: u8, code: u8 },
    IdentifierMismatch { found: u16 },
}

impl fmt::Display for ForeignReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotEchoReply { icmp_type, code } => {
                write!(f, "not an echo reply (type={icmp_type} code={code})")
            }
            Self::IdentifierMismatch { found } => {
                write!(f, "identifier mismatch (got {found})")
            }
        }
    }
}

/// Datagrama que não dá para decodificar com segurança.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    TooShort { len: usize },
    BadHeaderLength { ihl: usize },
    Truncated { len: usize, needed: usize },
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { len } => write!(f, "datagram too short ({len} bytes)"),
            Self::BadHeaderLength { ihl } => write!(f, "bad IPv4 header length ({ihl})"),
            Self::Truncated { len, needed } => {
                write!(f, "truncated datagram ({len} of {needed} bytes)")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    Valid(EchoReply),
    Foreign(ForeignReason),
    Malformed(MalformedReason),
}

/// Classifica um datagrama recebido no socket RAW.
///
/// Só devolve `Valid` para type=0, code=0 e identifier igual ao da sessão.
/// Nada é lido além de `data.len()`: buffers curtos viram `Malformed` antes
/// de qualquer acesso ao cabeçalho ICMP.
pub fn validate(data: &[u8], expected_ident: u16) -> MatchResult {
    let len = data.len();
    if len < MIN_IPV4_HEADER {
        return MatchResult::Malformed(MalformedReason::TooShort { len });
    }

    let ihl = (data[0] & 0x0F) as usize * 4;
    if ihl < MIN_IPV4_HEADER {
        return MatchResult::Malformed(MalformedReason::BadHeaderLength { ihl });
    }

    let needed = ihl + ICMP_HEADER_SIZE;
    if len < needed {
        return MatchResult::Malformed(MalformedReason::Truncated { len, needed });
    }

    let icmp = &data[ihl..];
    let icmp_type = icmp[0];
    let code = icmp[1];
    if icmp_type != ECHO_REPLY || code != 0 {
        return MatchResult::Foreign(ForeignReason::NotEchoReply { icmp_type, code });
    }

    let identifier = u16::from_be_bytes([icmp[4], icmp[5]]);
    if identifier != expected_ident {
        return MatchResult::Foreign(ForeignReason::IdentifierMismatch { found: identifier });
    }

    MatchResult::Valid(EchoReply {
        ip_header_length: ihl,
        ttl: data[8],
        source: Ipv4Addr::new(data[12], data[13], data[14], data[15]),
        icmp_type,
        code,
        identifier,
        sequence: u16::from_be_bytes([icmp[6], icmp[7]]),
        icmp_len: icmp.len(),
        checksum_valid: icmp::verify_checksum(icmp),
        payload_intact: icmp::payload_matches(&icmp[ICMP_HEADER_SIZE..]),
    })
}

/// Monta um datagrama IPv4 + Echo Reply como o kernel entrega no socket RAW.
/// Usado pelos testes e pelo transporte simulado; o payload segue o mesmo
/// limite de `build_echo_request`.
pub fn encode_echo_reply(
    source: Ipv4Addr,
    ttl: u8,
    ident: u16,
    seq: u16,
    payload_size: usize,
) -> Vec<u8> {
    let mut icmp = icmp::build_echo_request(ident, seq, payload_size);
    icmp[0] = ECHO_REPLY;
    icmp[2..4].fill(0);
    let csum = icmp::checksum(&icmp);
    icmp[2..4].copy_from_slice(&csum.to_be_bytes());

    // build_echo_request limita o payload, então o total cabe em u16
    let total_len = u16::try_from(MIN_IPV4_HEADER + icmp.len()).unwrap_or(u16::MAX);
    let mut pkt = Vec::with_capacity(usize::from(total_len));
    pkt.extend_from_slice(&[0x45, 0x00]);
    pkt.extend_from_slice(&total_len.to_be_bytes());
    // Identification, flags/fragment offset
    pkt.extend_from_slice(&[0x00, 0x00, 0x40, 0x00]);
    // TTL, protocol=ICMP, checksum zerado
    pkt.extend_from_slice(&[ttl, 1, 0, 0]);
    pkt.extend_from_slice(&source.octets());
    pkt.extend_from_slice(&Ipv4Addr::UNSPECIFIED.octets());
    let csum = icmp::checksum(&pkt);
    pkt[10..12].copy_from_slice(&csum.to_be_bytes());

    pkt.extend_from_slice(&icmp);
    pkt
}
