use clap::Parser;
use log::info;
use server::config::ServerConfig;
use server::network::Server;
use std::time::Duration;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// Maximum number of open rooms
    #[clap(long, default_value = "100")]
    max_rooms: usize,
    /// Seconds a dropped player's seat is held for a reconnect
    #[clap(long, default_value = "30")]
    reconnect_timeout: u64,
    /// Countdown steps before kick-off
    #[clap(long, default_value = "3")]
    countdown: u32,
    /// Match length in seconds
    #[clap(long, default_value = "60")]
    match_duration: f32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        println!("Tip: Set RUST_LOG=info to see server logs");
    }

    let args = Args::parse();

    let config = ServerConfig {
        bind_addr: format!("{}:{}", args.host, args.port),
        max_rooms: args.max_rooms,
        countdown: args.countdown,
        match_duration: args.match_duration,
        reconnect_timeout: Duration::from_secs(args.reconnect_timeout),
        ..ServerConfig::default()
    };

    let server = Server::bind(config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
