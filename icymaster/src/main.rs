use std::sync::Arc;

use anyhow::Context;
use icymaster::{MasterServer, ProcessLauncher};
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: master [port]";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let port = match args.as_slice() {
        // Sans argument : port éphémère, annoncé sur stdout.
        [] => 0,
        [port] => match icyproto::strict::parse_port(port) {
            Some(port) => port,
            None => {
                eprintln!("master: invalid port {port:?}");
                eprintln!("{USAGE}");
                std::process::exit(1);
            }
        },
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(port, args.is_empty()).await {
        eprintln!("master: {e:#}");
        std::process::exit(1);
    }
}

async fn run(port: u16, announce: bool) -> anyhow::Result<()> {
    let launcher = Arc::new(ProcessLauncher::from_env());
    let server = MasterServer::bind(port, launcher)
        .await
        .with_context(|| format!("cannot bind control port {port}"))?;
    let bound = server.local_port().context("local address lookup")?;
    if announce {
        println!("{bound}");
    }
    info!("✅ master listening on port {bound}");

    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.cancel();
        }
    });
    server.serve().await;
    Ok(())
}
