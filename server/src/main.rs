use log::LevelFilter;

use four_row_core::logger::{system_logger, LoggerOptions};

const DEFAULT_PORT: u16 = 5555;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    system_logger(LoggerOptions {
        log_level: LevelFilter::Debug,
        log_file: None,
    })?
    .apply()?;

    let port = parse_args();
    let (handle, addr) = server::start(port).await?;
    log::info!("server started on all interfaces, {addr}");

    tokio::signal::ctrl_c().await?;
    log::info!("shutting down");
    handle.shutdown().await;
    Ok(())
}

/// Minimal flag loop; only the listen port is configurable.
fn parse_args() -> u16 {
    let args: Vec<String> = std::env::args().collect();
    let mut port = DEFAULT_PORT;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" => {
                i += 1;
                port = args
                    .get(i)
                    .and_then(|arg| arg.parse().ok())
                    .unwrap_or_else(|| {
                        eprintln!("--port requires a valid port number");
                        std::process::exit(1);
                    });
            }
            "--help" | "-h" => {
                println!("Usage: server [--port <PORT>]");
                println!();
                println!("Options:");
                println!("  --port <PORT>   Listen port (default: {DEFAULT_PORT})");
                println!("  --help, -h      Show this help");
                std::process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                std::process::exit(1);
            }
        }
        i += 1;
    }
    port
}
