use std::time::Duration;

/// Parâmetros de uma sessão de ping.
#[derive(Debug, Clone)]
pub struct PingConfig {
    /// Número de probes
    pub count: u32,
    /// Bytes de payload depois do cabeçalho ICMP
    pub payload_size: usize,
    /// Intervalo fixo entre probes
    pub interval: Duration,
    /// Espera máxima por resposta de cada probe
    pub timeout: Duration,
    /// Token da sessão gravado no campo identifier
    pub identifier: u16,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            count: 4,
            payload_size: 32,
            interval: Duration::from_secs(1),
            timeout: Duration::from_millis(1000),
            identifier: default_identifier(),
        }
    }
}

/// Identificador padrão: 16 bits baixos do PID.
pub fn default_identifier() -> u16 {
    std::process::id() as u16
}
