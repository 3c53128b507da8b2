// Tratamento de erros ergonômico
use anyhow::{Context, Result};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use echoprobe::{PingConfig, PingSession, RawTransport};

mod args;

/// Resolve o destino, abre o socket RAW e executa a sessão.
/// Requer root/Administrador (ou CAP_NET_RAW) para o socket RAW.
fn main() -> Result<()> {
    let args = args::Args::parse();
    init_tracing(args.verbose);

    let config = PingConfig::from(&args);
    let dst = args::resolve_ipv4(&args.host)?;

    // Ctrl+C encerra antes do próximo probe e ainda mostra o resumo
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("failed to install Ctrl+C handler")?;

    let transport = RawTransport::open()?;

    tracing::debug!(%dst, ident = config.identifier, "starting session");
    println!(
        "Ping {} [{}] with {} bytes of data:\n",
        args.host, dst, config.payload_size
    );

    let mut session = PingSession::new(transport, dst, config).with_interrupt(running);
    let stdout = io::stdout();
    session
        .run(&mut stdout.lock())
        .context("failed to write report")?;

    Ok(())
}

/// Logs vão para stderr; RUST_LOG tem precedência sobre -v.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}
