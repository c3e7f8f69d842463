//! Echo every byte a peer streams to us back to that peer.
//!
//! Run with:
//!   cargo run -p xbee --example stream-echo --features cli -- \
//!     --link unix:/tmp/xbee.sock --local 0x3344 --peer 0x1122

use std::io::{Read, Write};

use clap::Parser;
use tracing::{info, warn};
use xbee::cli::{init_logging, parse_address, LogFormat, LogLevel};
use xbee::{LinkStream, Radio, RadioConfig};

#[derive(Parser, Debug)]
#[command(name = "stream-echo", about = "Echo a peer's byte stream")]
struct Args {
    /// Serial bridge: tcp://host:port, host:port or unix:/path.
    #[arg(long, env = "XBEE_LINK")]
    link: String,

    /// Local 16-bit address.
    #[arg(long, value_parser = parse_address)]
    local: u16,

    /// Peer 16-bit address.
    #[arg(long, value_parser = parse_address)]
    peer: u16,

    /// Bytes per radio frame.
    #[arg(long, default_value_t = xbee::radio::DEFAULT_MAX_PAYLOAD)]
    chunk: usize,

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

    let radio = Radio::open_with_config(LinkStream::connect(&args.link)?, RadioConfig::default())?;
    radio.set_address(args.local)?;
    info!(local = args.local, peer = args.peer, "echoing");

    let mut stream = radio.stream(args.peer).with_max_payload(args.chunk);
    let mut buf = [0u8; 256];
    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            info!("radio closed");
            return Ok(());
        }
        if let Err(err) = stream.write_all(&buf[..n]) {
            warn!(error = %err, "echo failed");
        }
    }
}
