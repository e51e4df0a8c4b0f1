use clap::Parser;
use control_rest::{
    limits::{ConnLimits, DEFAULT_PORT},
    memory::{seed_demo, MemoryControls, MemoryPlayers},
    Api, Server,
};
use std::{process::ExitCode, sync::Arc, time::Duration};

/// Serves an in-memory control plane over the loopback REST API.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TCP port on 127.0.0.1 (0 picks a free port)
    #[arg(short, long, env = "CONTROL_REST_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Close connections that send nothing within this many milliseconds
    #[arg(long, value_name = "MS")]
    read_timeout_ms: Option<u64>,

    /// Largest accepted request, in bytes
    #[arg(long, value_name = "BYTES")]
    max_request_size: Option<usize>,

    /// Header names kept per request, further headers are ignored
    #[arg(long, value_name = "COUNT")]
    max_headers: Option<usize>,

    /// Start with no controls and no players
    #[arg(long)]
    no_demo: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let controls = Arc::new(MemoryControls::new());
    let players = Arc::new(MemoryPlayers::new());
    if !args.no_demo {
        seed_demo(&controls, &players);
        log::debug!("Registered {} demo controls", controls.len());
    }

    let defaults = ConnLimits::default();
    let mut server = Server::builder()
        .handler(Api::new(controls, players))
        .connection_limits(ConnLimits {
            max_request_size: args.max_request_size.unwrap_or(defaults.max_request_size),
            socket_read_timeout: args.read_timeout_ms.map(Duration::from_millis),
            max_headers: args.max_headers.unwrap_or(defaults.max_headers),
            ..defaults
        })
        .build();

    // Already logged by the server
    if server.start(args.port).is_err() {
        return ExitCode::FAILURE;
    }

    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {err}");
    }
    server.stop();

    ExitCode::SUCCESS
}
