// ABOUTME: BLE/GATT transport expressed against an adapter trait for the platform's radio stack
// ABOUTME: Owns connection bookkeeping and attribute-layer length validation; delegates the radio

use std::sync::{Mutex, RwLock};

use crate::config::BLE_FRAME_MAX;
use crate::error::RpcError;
use crate::frame::HEADER_LEN;
use crate::transport::{InboundSink, Transport};

/// Opaque handle to a live GATT connection, as assigned by the platform's
/// BLE stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnHandle(pub u16);

/// The platform-specific radio/GATT binding `BleTransport` drives. Actual
/// advertising, MTU negotiation, and attribute-table registration are a
/// platform concern left to whatever BLE stack the embedding application
/// links — this trait is the seam.
pub trait GattAdapter: Send + Sync {
    fn start_advertising(&self) -> Result<(), RpcError>;
    fn stop_advertising(&self);
    fn notify(&self, conn: ConnHandle, data: &[u8]) -> Result<(), RpcError>;
}

/// GATT-based RPC transport: one TX characteristic (client write), one RX
/// characteristic (server notify), exactly one connection at a time.
pub struct BleTransport<A: GattAdapter> {
    adapter: A,
    conn: RwLock<Option<ConnHandle>>,
    on_recv: Mutex<Option<InboundSink>>,
    frame_max: usize,
}

impl<A: GattAdapter> BleTransport<A> {
    pub fn new(adapter: A) -> Self {
        Self::with_frame_max(adapter, BLE_FRAME_MAX)
    }

    pub fn with_frame_max(adapter: A, frame_max: usize) -> Self {
        BleTransport {
            adapter,
            conn: RwLock::new(None),
            on_recv: Mutex::new(None),
            frame_max,
        }
    }

    /// The platform binding calls this when a central connects. Replaces
    /// any previously recorded connection, matching the reference's
    /// single-connection rule.
    pub fn on_connect(&self, conn: ConnHandle) {
        *self.conn.write().expect("ble conn lock poisoned") = Some(conn);
    }

    /// The platform binding calls this when the connection drops.
    /// Advertising restart is the embedding application's responsibility,
    /// driven off this same event.
    pub fn on_disconnect(&self, conn: ConnHandle) {
        let mut slot = self.conn.write().expect("ble conn lock poisoned");
        if *slot == Some(conn) {
            *slot = None;
        }
    }

    /// The platform binding calls this for every write to the TX
    /// characteristic. Rejects writes shorter than the frame header or
    /// longer than `frame_max` at the attribute layer, mirroring
    /// `BLE_ATT_ERR_INVALID_ATTR_VALUE_LEN`, before handing the bytes to
    /// the inbound funnel.
    pub fn on_write(&self, bytes: &[u8]) -> Result<(), RpcError> {
        if bytes.len() < HEADER_LEN || bytes.len() > self.frame_max {
            return Err(RpcError::MalformedFrame);
        }
        let sink = self.on_recv.lock().expect("ble on_recv lock poisoned").clone();
        if let Some(sink) = sink {
            sink(bytes);
        }
        Ok(())
    }

    pub fn current_connection(&self) -> Option<ConnHandle> {
        *self.conn.read().expect("ble conn lock poisoned")
    }
}

impl<A: GattAdapter> Transport for BleTransport<A> {
    fn send(&self, bytes: &[u8]) -> Result<(), RpcError> {
        let conn = self.current_connection().ok_or(RpcError::NotConnected)?;
        self.adapter.notify(conn, bytes)
    }

    fn start(&self, on_recv: InboundSink) -> Result<(), RpcError> {
        let mut slot = self.on_recv.lock().expect("ble on_recv lock poisoned");
        if slot.is_some() {
            return Err(RpcError::InvalidState);
        }
        *slot = Some(on_recv);
        self.adapter.start_advertising()
    }

    fn stop(&self) {
        *self.on_recv.lock().expect("ble on_recv lock poisoned") = None;
        *self.conn.write().expect("ble conn lock poisoned") = None;
        self.adapter.stop_advertising();
    }
}
