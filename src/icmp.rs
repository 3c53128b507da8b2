/// Tamanho fixo do cabeçalho ICMP (type, code, checksum, identifier, sequence).
pub const ICMP_HEADER_SIZE: usize = 8;

/// Maior payload que cabe num datagrama IPv4: 65535 - 20 (IP) - 8 (ICMP).
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize - 20 - ICMP_HEADER_SIZE;

/// Type do Echo Request.
pub const ECHO_REQUEST: u8 = 8;

/// Type do Echo Reply.
pub const ECHO_REPLY: u8 = 0;

/// Calcula o checksum da Internet (RFC 1071).
///
/// Soma palavras de 16 bits big-endian; um byte ímpar no final vira o byte
/// alto de uma palavra completada com zero. Os carries são dobrados de volta
/// até sumirem e o resultado é o complemento de um.
pub fn checksum(mut data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    while data.len() >= 2 {
        sum = sum.wrapping_add(u16::from_be_bytes([data[0], data[1]]) as u32);
        data = &data[2..];
    }
    if let [last] = data {
        sum = sum.wrapping_add((*last as u32) << 8);
    }
    while (sum >> 16) != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}

/// Um buffer com checksum correto soma para zero.
pub fn verify_checksum(data: &[u8]) -> bool {
    checksum(data) == 0
}

/// Byte `j` do payload: 'A'..'Z' em ciclo.
pub fn payload_byte(j: usize) -> u8 {
    b'A' + (j % 26) as u8
}

/// Confere se o payload segue o padrão gerado por `build_echo_request`.
pub fn payload_matches(payload: &[u8]) -> bool {
    payload
        .iter()
        .enumerate()
        .all(|(j, &b)| b == payload_byte(j))
}

/// Monta um pacote ICMPv4 Echo Request (type=8, code=0) com `payload_size`
/// bytes de padrão. Payloads acima de `MAX_PAYLOAD_SIZE` são cortados.
pub fn build_echo_request(ident: u16, seq: u16, payload_size: usize) -> Vec<u8> {
    let payload_size = payload_size.min(MAX_PAYLOAD_SIZE);
    let mut pkt = Vec::with_capacity(ICMP_HEADER_SIZE + payload_size);

    // Type, Code, checksum zerado
    pkt.extend_from_slice(&[ECHO_REQUEST, 0, 0, 0]);

    // Identifier e Sequence (big-endian)
    pkt.extend_from_slice(&ident.to_be_bytes());
    pkt.extend_from_slice(&seq.to_be_bytes());

    pkt.extend((0..payload_size).map(payload_byte));

    let csum = checksum(&pkt);
    pkt[2..4].copy_from_slice(&csum.to_be_bytes());

    pkt
}
