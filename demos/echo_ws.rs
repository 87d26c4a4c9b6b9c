// ABOUTME: Demo binary wiring a WsTransport onto an owned axum server with an echo service
// ABOUTME: Run with: cargo run --example echo_ws -- --port 8080

//! A minimal echo service reachable over the WebSocket transport, for
//! manual testing against any RPC-frame-speaking client.
//!
//! ```bash
//! cargo run --example echo_ws -- --port 8080
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use argh::FromArgs;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use rpc_core::{Core, CoreConfig, Dispatch, DispatchOutcome, RpcError};
use rpc_core::transport::ws::WsTransport;

/// Runs an echo RPC service over WebSocket
#[derive(FromArgs)]
struct CliArgs {
    /// whether to enable debug logging
    #[argh(switch, short = 'd')]
    debugging: bool,

    /// port to listen on (default: 8080)
    #[argh(option, short = 'p')]
    port: Option<u16>,
}

struct EchoService;

impl Dispatch for EchoService {
    fn call(&self, _method_index: u8, payload: &[u8]) -> Result<DispatchOutcome, RpcError> {
        Ok(DispatchOutcome::Response(payload.to_vec()))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli_args: CliArgs = argh::from_env();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if cli_args.debugging { Level::DEBUG } else { Level::INFO })
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let port = cli_args.port.unwrap_or(8080);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    let core = Arc::new(Core::new(CoreConfig::default()));
    core.register_service("echo", Arc::new(EchoService))?;

    let transport = Arc::new(WsTransport::new());
    core.add_transport(transport.clone())?;

    info!("echo_ws listening on ws://{addr}/ws");
    transport.serve(addr).await?;
    Ok(())
}
