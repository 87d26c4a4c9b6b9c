// ABOUTME: Single-client WebSocket transport built on axum's ws upgrade
// ABOUTME: One writer task per connection fed by a bounded mpsc channel; newest connection wins

use std::sync::{Arc, Mutex};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router as AxumRouter;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::RpcError;
use crate::transport::{InboundSink, Transport};

const OUTBOUND_QUEUE_DEPTH: usize = 32;

struct WsState {
    on_recv: Mutex<Option<InboundSink>>,
    outbound: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    generation: std::sync::atomic::AtomicU64,
}

/// WebSocket RPC transport. Single client at a time: accepting a new
/// connection closes out the previous one's writer task by bumping a
/// generation counter the old writer checks before every send.
pub struct WsTransport {
    state: Arc<WsState>,
}

impl WsTransport {
    pub fn new() -> Self {
        WsTransport {
            state: Arc::new(WsState {
                on_recv: Mutex::new(None),
                outbound: Mutex::new(None),
                generation: std::sync::atomic::AtomicU64::new(0),
            }),
        }
    }

    /// Builds an axum route for `path` that this transport handles. Mount
    /// this onto a caller-supplied `axum::Router` to adopt an externally
    /// owned HTTP server, or use `serve` to own a listener outright.
    pub fn route(self: &Arc<Self>, path: &str) -> AxumRouter {
        AxumRouter::new()
            .route(path, get(ws_handler))
            .with_state(self.clone())
    }

    /// Owns an HTTP server on `addr` serving only the `/ws` route. Runs
    /// until the returned future is dropped/cancelled.
    pub async fn serve(self: &Arc<Self>, addr: std::net::SocketAddr) -> Result<(), RpcError> {
        let app = self.route("/ws");
        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;
        Ok(())
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl From<axum::Error> for RpcError {
    fn from(e: axum::Error) -> Self {
        RpcError::Io(e.to_string())
    }
}

async fn ws_handler(
    State(transport): State<Arc<WsTransport>>,
    upgrade: WebSocketUpgrade,
) -> Response {
    upgrade.on_upgrade(move |socket| handle_socket(transport, socket))
}

async fn handle_socket(transport: Arc<WsTransport>, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(OUTBOUND_QUEUE_DEPTH);
    let generation = transport
        .state
        .generation
        .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
        + 1;

    *transport.state.outbound.lock().expect("ws outbound lock poisoned") = Some(tx);

    let writer_state = transport.state.clone();
    let writer = tokio::spawn(async move {
        while let Some(bytes) = rx.recv().await {
            if writer_state.generation.load(std::sync::atomic::Ordering::SeqCst) != generation {
                break;
            }
            if sink.send(Message::Binary(bytes)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(Ok(msg)) = stream.next().await {
        if let Message::Binary(bytes) = msg {
            let sink_fn = transport.state.on_recv.lock().expect("ws on_recv lock poisoned").clone();
            if let Some(sink_fn) = sink_fn {
                sink_fn(&bytes);
            }
        }
    }

    debug!("ws client disconnected");
    writer.abort();
    let mut outbound = transport.state.outbound.lock().expect("ws outbound lock poisoned");
    if outbound.is_some() {
        *outbound = None;
    }
}

impl Transport for WsTransport {
    fn send(&self, bytes: &[u8]) -> Result<(), RpcError> {
        let outbound = self.state.outbound.lock().expect("ws outbound lock poisoned");
        match outbound.as_ref() {
            Some(tx) => tx.try_send(bytes.to_vec()).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => RpcError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => RpcError::NotConnected,
            }),
            None => Err(RpcError::NotConnected),
        }
    }

    fn start(&self, on_recv: InboundSink) -> Result<(), RpcError> {
        let mut slot = self.state.on_recv.lock().expect("ws on_recv lock poisoned");
        if slot.is_some() {
            return Err(RpcError::InvalidState);
        }
        *slot = Some(on_recv);
        Ok(())
    }

    fn stop(&self) {
        *self.state.on_recv.lock().expect("ws on_recv lock poisoned") = None;
        self.state.generation.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        *self.state.outbound.lock().expect("ws outbound lock poisoned") = None;
    }
}
