//! Join the network under a random address and report the nodes in range.
//!
//! Run with:
//!   cargo run -p xbee --example discover --features cli -- \
//!     --link tcp://192.168.1.20:2000 --identifier porch
//!
//! Each discovered node is printed to stdout as one JSON line.

use std::time::Duration;

use clap::Parser;
use rand::Rng;
use tracing::info;
use xbee::cli::{init_logging, parse_address, LogFormat, LogLevel};
use xbee::{LinkStream, Radio};

#[derive(Parser, Debug)]
#[command(name = "discover", about = "Discover XBee nodes in range")]
struct Args {
    /// Serial bridge: tcp://host:port, host:port or unix:/path.
    #[arg(long, env = "XBEE_LINK")]
    link: String,

    /// Node identifier to announce.
    #[arg(long, default_value = "discover")]
    identifier: String,

    /// Local 16-bit address (random when omitted).
    #[arg(long, value_parser = parse_address)]
    address: Option<u16>,

    /// Seconds between discovery rounds.
    #[arg(long, default_value_t = 1)]
    interval: u64,

    /// Stop after this many rounds (run forever when omitted).
    #[arg(long)]
    rounds: Option<u64>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.log_format, args.log_level);

    let radio = Radio::open(LinkStream::connect(&args.link)?)?;

    let address = args.address.unwrap_or_else(random_address);
    radio.set_address(address)?;
    radio.set_identifier(&args.identifier)?;
    info!(address, identifier = %args.identifier, "joined");

    let mut round = 0u64;
    while args.rounds.is_none_or(|limit| round < limit) {
        std::thread::sleep(Duration::from_secs(args.interval));
        for node in radio.discover()? {
            println!("{}", serde_json::to_string(&node)?);
        }
        round += 1;
    }

    Ok(())
}

// Avoid the broadcast (0xFFFF) and "use 64-bit" (0xFFFE) addresses.
fn random_address() -> u16 {
    rand::thread_rng().gen_range(0..0xFFFE)
}
