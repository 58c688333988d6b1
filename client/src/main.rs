use clap::Parser;
use client::app::{Client, ClientConfig};
use log::info;
use macroquad::window::Conf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Name shown to the opponent
    #[arg(short = 'n', long)]
    nickname: Option<String>,

    /// Room code to join; creates a new room when omitted
    #[arg(short = 'j', long)]
    join: Option<String>,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,

    /// Window width
    #[arg(short = 'w', long, default_value = "800")]
    width: i32,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "450")]
    height: i32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    if args.fake_ping > 0 {
        info!("Simulating {}ms latency", args.fake_ping);
    }
    info!("Controls: A/D or arrows to move, W/Up to jump, Space/X to kick, R rematch, Esc leave");

    let conf = Conf {
        window_title: "Head Soccer".to_string(),
        window_width: args.width,
        window_height: args.height,
        ..Default::default()
    };
    let config = ClientConfig {
        server: args.server,
        nickname: args.nickname,
        join: args.join,
        fake_ping_ms: args.fake_ping,
    };

    macroquad::Window::from_config(conf, async move {
        let mut client = Client::new(config);
        client.run().await;
    });

    Ok(())
}
