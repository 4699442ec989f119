//! CLI command implementations
//!
//! `serve` loads the configuration, sets the log threshold and runs the
//! HTTP server until Ctrl-C. `watch` is a thin client that prints the
//! count and window events of a running server as they arrive.

use std::path::Path;

use futures_util::StreamExt;

use crate::client::{ClientError, ClientSyncRepository, HttpSyncTransport};
use crate::http_server::{HttpServer, ServerConfig};
use crate::observability::{log_event, log_event_with_fields, Event, Logger};
use crate::sync::WindowRequest;

use super::args::{Command, FilterArgs};
use super::errors::{CliError, CliResult};

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Serve { config, port } => serve(config.as_deref(), port),
        Command::Watch {
            url,
            filter,
            position,
            size,
        } => watch(&url, &filter, position, size),
    }
}

/// Resolve the server configuration: file (or defaults), then overrides
pub fn load_config(config_path: Option<&Path>, port: Option<u16>) -> CliResult<ServerConfig> {
    let mut config = match config_path {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(port) = port {
        config = config.with_port(port);
    }
    config.validate()?;
    Ok(config)
}

/// Run the server
pub fn serve(config_path: Option<&Path>, port: Option<u16>) -> CliResult<()> {
    log_event(Event::BootStart);

    let config = load_config(config_path, port)?;
    Logger::set_min_severity(config.log_severity()?);
    let port = config.port.to_string();
    log_event_with_fields(Event::ConfigLoaded, &[
        ("host", config.host.as_str()),
        ("port", port.as_str()),
    ]);

    let server = HttpServer::with_config(config);

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::serve_failed(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(async {
        server
            .start()
            .await
            .map_err(|e| CliError::serve_failed(format!("HTTP server failed: {}", e)))
    })?;

    Ok(())
}

/// Print live updates until the server closes a stream or Ctrl-C
pub fn watch(url: &str, filter: &FilterArgs, position: u64, size: u64) -> CliResult<()> {
    let window = WindowRequest::new(position, size)
        .map_err(|e| CliError::config_error(e.to_string()))?;
    let transport = HttpSyncTransport::new(url)?;
    let repo = ClientSyncRepository::new(transport, filter.to_filter());

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::watch_failed(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(print_updates(&repo, window))
}

async fn print_updates(repo: &ClientSyncRepository<HttpSyncTransport>, window: WindowRequest) -> CliResult<()> {
    let mut counts = repo.count_stream();
    let mut windows = repo.window_stream(window);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            count = counts.next() => match count {
                Some(count) => println!("count {}", count?),
                None => return Err(ClientError::StreamClosed.into()),
            },
            page = windows.next() => match page {
                Some(page) => {
                    let page = page?;
                    println!("window [{}, {}) {} items", window.position, window.end(), page.len());
                    for (index, order) in page.iter() {
                        println!(
                            "  {:>6} #{:<6} {} {:<18} {:<20} {:<10} {:>9.2}",
                            index,
                            order.id,
                            order.order_date,
                            order.customer,
                            order.delivery_address,
                            order.status,
                            order.amount
                        );
                    }
                }
                None => return Err(ClientError::StreamClosed.into()),
            },
        }
    }
}
