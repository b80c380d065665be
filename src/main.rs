//! EmberKV server entry point.
//!
//! Sets up logging, binds the TCP listener and hands connections to the
//! accept loop until Ctrl+C.

use emberkv::config::{help_text, parse_args, CliAction, Config};
use emberkv::connection::ConnectionStats;
use emberkv::server::accept_loop;
use emberkv::storage::Store;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn print_banner(config: &Config) {
    println!(
        r#"
EmberKV v{} - In-Memory Key-Value Server
──────────────────────────────────────────
Server started on {}
Ready to accept connections.
"#,
        emberkv::VERSION,
        config.bind_address()
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match parse_args(std::env::args().skip(1)) {
        Ok(CliAction::Run(config)) => config,
        Ok(CliAction::Help) => {
            println!("{}", help_text());
            return Ok(());
        }
        Ok(CliAction::Version) => {
            println!("EmberKV version {}", emberkv::VERSION);
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("{}", help_text());
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let storage = Arc::new(Store::new());
    let stats = Arc::new(ConnectionStats::new());

    let listener = TcpListener::bind(config.bind_address()).await?;
    print_banner(&config);
    info!("Listening on {}", config.bind_address());

    // No graceful drain: open connections are dropped with the runtime
    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received, stopping server...");
    };

    tokio::select! {
        _ = accept_loop(listener, storage, Arc::clone(&stats)) => {}
        _ = shutdown => {}
    }

    info!(
        connections = stats
            .connections_accepted
            .load(std::sync::atomic::Ordering::Relaxed),
        "Server shutdown complete"
    );
    Ok(())
}
