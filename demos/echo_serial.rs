// ABOUTME: Demo binary driving a SerialTransport echo service off stdin/stdout framed bytes
// ABOUTME: Run with: cargo run --example echo_serial -- --prefix '\xAA\x55' --suffix '\x0D\x0A'

//! A minimal echo service reachable over the serial transport, feeding
//! stdin through a `FrameResynchronizer` and writing framed responses to
//! stdout — a stand-in for a real UART for manual testing.
//!
//! ```bash
//! cargo run --example echo_serial -- --prefix '\xAA\x55' --suffix '\x0D\x0A'
//! ```

use std::io::{Read, Write};
use std::sync::Arc;

use argh::FromArgs;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use rpc_core::transport::serial::resync::FrameResynchronizer;
use rpc_core::transport::serial::{parse_packet_marker, SerialTransport};
use rpc_core::{Core, CoreConfig, Dispatch, DispatchOutcome, RpcError};

/// Runs an echo RPC service over a framed stdin/stdout byte stream
#[derive(FromArgs)]
struct CliArgs {
    /// whether to enable debug logging
    #[argh(switch, short = 'd')]
    debugging: bool,

    /// packet prefix marker, e.g. '\xAA\x55' (default: empty)
    #[argh(option)]
    prefix: Option<String>,

    /// packet suffix marker, e.g. '\x0D\x0A' (default: empty)
    #[argh(option)]
    suffix: Option<String>,
}

struct EchoService;

impl Dispatch for EchoService {
    fn call(&self, _method_index: u8, payload: &[u8]) -> Result<DispatchOutcome, RpcError> {
        Ok(DispatchOutcome::Response(payload.to_vec()))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli_args: CliArgs = argh::from_env();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if cli_args.debugging { Level::DEBUG } else { Level::INFO })
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let prefix = parse_packet_marker(cli_args.prefix.as_deref().unwrap_or(""))?;
    let suffix = parse_packet_marker(cli_args.suffix.as_deref().unwrap_or(""))?;

    let core = Arc::new(Core::new(CoreConfig::default()));
    core.register_service("echo", Arc::new(EchoService))?;

    let transport = Arc::new(SerialTransport::with_payload_max(
        prefix.clone(),
        suffix.clone(),
        core.config().serial_payload_max,
    ));
    transport.set_tx(Arc::new(|bytes: &[u8]| {
        let mut stdout = std::io::stdout();
        let _ = stdout.write_all(bytes);
        let _ = stdout.flush();
    }));
    core.add_transport(transport.clone() as Arc<dyn rpc_core::Transport>)?;

    info!("echo_serial reading framed bytes from stdin");
    let mut resync = FrameResynchronizer::new(prefix, suffix, core.config().serial_payload_max);
    let mut chunk = [0u8; 256];
    let stdin = std::io::stdin();
    let mut handle = stdin.lock();
    loop {
        let n = handle.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        for frame in resync.feed(&chunk[..n]) {
            transport.feed_packet(&frame)?;
        }
    }
    Ok(())
}
