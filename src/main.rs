//! memkv server entry point.
//!
//! Reads configuration, sets up logging and the shared storage engine, then
//! accepts clients until Ctrl+C.

use memkv::commands::CommandHandler;
use memkv::config::{Config, Startup};
use memkv::connection::{handle_connection, ConnectionStats};
use memkv::storage::StorageEngine;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn print_help() {
    println!(
        r#"
memkv - An in-memory, Redis-compatible key/value server

USAGE:
    memkv [OPTIONS]

OPTIONS:
    -h, --host <HOST>               Host to bind to (default: 127.0.0.1)
    -p, --port <PORT>               Port to listen on (default: 6379)
        --max-connections <N>       Concurrent client limit (default: 1024)
        --idle-timeout <SECS>       Drop silent clients after SECS (default: 0, off)
    -v, --version                   Print version information
        --help                      Print this help message

ENVIRONMENT:
    MEMKV_HOST, MEMKV_PORT, MEMKV_MAX_CONNECTIONS, MEMKV_IDLE_TIMEOUT_SECS
    RUST_LOG                        Log filter (default: info)

CONNECTING:
    $ redis-cli -p 6379
    127.0.0.1:6379> SADD colors red
    OK
    127.0.0.1:6379> SWITHMEMBER red
    1) "colors"
"#
    );
}

fn print_banner(config: &Config) {
    println!(
        r#"
memkv v{}
──────────────────────────────────────────────
Server started on {}
Connection limit: {}
Ready to accept connections.

Use Ctrl+C to shutdown gracefully.
"#,
        memkv::VERSION,
        config.bind_address(),
        config.max_connections,
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match Config::load() {
        Ok(Startup::Serve(config)) => config,
        Ok(Startup::PrintHelp) => {
            print_help();
            return Ok(());
        }
        Ok(Startup::PrintVersion) => {
            println!("memkv version {}", memkv::VERSION);
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            print_help();
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    print_banner(&config);

    let storage = Arc::new(StorageEngine::new());
    let stats = Arc::new(ConnectionStats::new());

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!(address = %config.bind_address(), "Listening");

    let shutdown = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received, stopping server..."),
            Err(e) => error!(error = %e, "Failed to listen for Ctrl+C"),
        }
    };

    tokio::select! {
        _ = accept_loop(listener, Arc::clone(&storage), Arc::clone(&stats), &config) => {}
        _ = shutdown => {}
    }

    info!(
        connections = stats.connections_accepted.load(Ordering::Relaxed),
        commands = stats.commands_processed.load(Ordering::Relaxed),
        command_errors = stats.command_errors.load(Ordering::Relaxed),
        protocol_errors = stats.protocol_errors.load(Ordering::Relaxed),
        bytes_read = stats.bytes_read.load(Ordering::Relaxed),
        bytes_written = stats.bytes_written.load(Ordering::Relaxed),
        keys = storage.len().unwrap_or(0),
        "Server shutdown complete"
    );
    Ok(())
}

/// Accepts clients, holding one semaphore permit per live connection.
async fn accept_loop(
    listener: TcpListener,
    storage: Arc<StorageEngine>,
    stats: Arc<ConnectionStats>,
    config: &Config,
) {
    let limit = Arc::new(Semaphore::new(config.max_connections));
    let idle_timeout = config.idle_timeout;

    loop {
        let permit = match Arc::clone(&limit).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };

        match listener.accept().await {
            Ok((stream, addr)) => {
                let handler = CommandHandler::new(Arc::clone(&storage));
                let stats = Arc::clone(&stats);

                tokio::spawn(async move {
                    handle_connection(stream, addr, handler, stats, idle_timeout).await;
                    drop(permit);
                });
            }
            Err(e) => {
                warn!(error = %e, "Failed to accept connection");
                // Back off briefly on resource errors such as EMFILE.
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }
}
