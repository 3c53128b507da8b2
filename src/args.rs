use anyhow::{Context, Result};
use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};
use std::time::Duration;

use echoprobe::PingConfig;
use echoprobe::config::default_identifier;

/// Envia ICMP Echo Requests para um host IPv4 e mede RTT e perda
#[derive(Parser, Debug, Clone)]
#[command(name = "echoprobe")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Host de destino (IPv4 ou nome)
    pub host: String,

    /// Número de probes
    #[arg(short = 'c', long = "count", default_value = "4")]
    pub count: u32,

    /// Bytes de payload (máximo 65507, o que cabe num datagrama IPv4)
    #[arg(
        short = 's',
        long = "size",
        default_value = "32",
        value_parser = clap::value_parser!(u16).range(..=65507)
    )]
    pub size: u16,

    /// Intervalo entre probes, em segundos
    #[arg(short = 'i', long = "interval", default_value = "1.0")]
    pub interval: f64,

    /// Timeout de cada probe, em milissegundos
    #[arg(short = 'W', long = "timeout", default_value = "1000")]
    pub timeout: u64,

    /// Identifier ICMP da sessão (padrão: PID)
    #[arg(long = "ident")]
    pub ident: Option<u16>,

    /// Mais logs (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    pub fn interval_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.interval.max(0.0)).unwrap_or(Duration::ZERO)
    }
}

impl From<&Args> for PingConfig {
    fn from(args: &Args) -> Self {
        Self {
            count: args.count,
            payload_size: usize::from(args.size),
            interval: args.interval_duration(),
            timeout: Duration::from_millis(args.timeout),
            identifier: args.ident.unwrap_or_else(default_identifier),
        }
    }
}

/// Resolve o host e fica com o primeiro endereço IPv4.
pub fn resolve_ipv4(host: &str) -> Result<Ipv4Addr> {
    if let Ok(addr) = host.parse::<Ipv4Addr>() {
        return Ok(addr);
    }
    (host, 0)
        .to_socket_addrs()
        .with_context(|| format!("resolve host {host} failed"))?
        .find_map(|sa| match sa.ip() {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(_) => None,
        })
        .with_context(|| format!("no IPv4 address for {host}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_config_defaults() {
        let args = Args::parse_from(["echoprobe", "127.0.0.1"]);
        let config = PingConfig::from(&args);
        let defaults = PingConfig::default();
        assert_eq!(config.count, defaults.count);
        assert_eq!(config.payload_size, defaults.payload_size);
        assert_eq!(config.interval, defaults.interval);
        assert_eq!(config.timeout, defaults.timeout);
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from([
            "echoprobe", "-c", "10", "-s", "56", "-i", "0.2", "-W", "250", "--ident", "4321",
            "example.net",
        ]);
        let config = PingConfig::from(&args);
        assert_eq!(args.host, "example.net");
        assert_eq!(config.count, 10);
        assert_eq!(config.payload_size, 56);
        assert_eq!(config.interval, Duration::from_millis(200));
        assert_eq!(config.timeout, Duration::from_millis(250));
        assert_eq!(config.identifier, 4321);
    }

    #[test]
    fn size_is_bounded_by_ipv4_datagram() {
        let max = Args::try_parse_from(["echoprobe", "-s", "65507", "127.0.0.1"]).unwrap();
        assert_eq!(PingConfig::from(&max).payload_size, echoprobe::icmp::MAX_PAYLOAD_SIZE);

        assert!(Args::try_parse_from(["echoprobe", "-s", "65508", "127.0.0.1"]).is_err());
        assert!(Args::try_parse_from(["echoprobe", "-s", "1000000", "127.0.0.1"]).is_err());
    }

    #[test]
    fn negative_interval_clamps_to_zero() {
        let mut args = Args::parse_from(["echoprobe", "127.0.0.1"]);
        args.interval = -1.0;
        assert_eq!(args.interval_duration(), Duration::ZERO);
    }

    #[test]
    fn literal_address_skips_resolver() {
        assert_eq!(resolve_ipv4("192.0.2.10").unwrap(), Ipv4Addr::new(192, 0, 2, 10));
    }
}
