// ABOUTME: Transport abstraction and the concrete WebSocket/BLE/Serial implementations
// ABOUTME: TransportSet fans outbound frames out to every registered transport

pub mod ble;
pub mod serial;
pub mod set;
pub mod ws;

use std::sync::Arc;

use crate::error::RpcError;

/// Callback a transport invokes once per complete inbound RPC frame it
/// reassembles off the wire. Frame parsing/dispatch happens downstream in
/// the `Router`; the transport's only job is handing over complete bytes.
pub type InboundSink = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// A channel capable of sending frames to zero or more connected peers and
/// receiving framed bytes back through an `InboundSink`.
///
/// Unlike the reference's function-pointer-struct-plus-`ctx` pair, the
/// implementing type owns all of its state directly.
pub trait Transport: Send + Sync {
    /// Sends `bytes` (a complete frame) to whatever this transport considers
    /// its current peer(s). Fails with `NotConnected` if there is no peer,
    /// `InvalidState` if called before `start`/after `stop`.
    fn send(&self, bytes: &[u8]) -> Result<(), RpcError>;

    /// Begins accepting connections/data, invoking `on_recv` for each
    /// complete inbound frame. Fails with `InvalidState` if already started.
    fn start(&self, on_recv: InboundSink) -> Result<(), RpcError>;

    /// Stops accepting connections/data. Idempotent.
    fn stop(&self);
}
