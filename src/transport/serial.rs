// ABOUTME: Byte-stream transport over configurable prefix/suffix packet markers
// ABOUTME: The serial driver itself stays external; this owns framing, marker parsing, and tx dispatch

pub mod resync;

use std::sync::Mutex;

use crate::config::{DEFAULT_SERIAL_PAYLOAD_MAX, SERIAL_MARKER_MAX};
use crate::error::RpcError;
use crate::frame::HEADER_LEN;
use crate::transport::{InboundSink, Transport};

/// Parses a marker literal with a single escape form `\xNN`; every other
/// character contributes its own byte. Fails if the parsed marker would
/// exceed `SERIAL_MARKER_MAX` bytes or contains a malformed `\x` escape.
pub fn parse_packet_marker(literal: &str) -> Result<Vec<u8>, RpcError> {
    let mut out = Vec::new();
    let mut chars = literal.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek() == Some(&'x') {
            chars.next();
            let hi = chars.next().ok_or(RpcError::MalformedFrame)?;
            let lo = chars.next().ok_or(RpcError::MalformedFrame)?;
            let byte = u8::from_str_radix(&format!("{hi}{lo}"), 16).map_err(|_| RpcError::MalformedFrame)?;
            out.push(byte);
        } else {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        }
        if out.len() > SERIAL_MARKER_MAX {
            return Err(RpcError::MalformedFrame);
        }
    }
    Ok(out)
}

/// Callback the application registers to actually write bytes to the UART.
pub type SerialTx = std::sync::Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Serial RPC transport. Does not own the UART: the application feeds
/// inbound bytes via `feed_packet`/`feed_raw_packet` from its own read
/// task, and registers a `tx` callback for outbound bytes.
pub struct SerialTransport {
    prefix: Vec<u8>,
    suffix: Vec<u8>,
    payload_max: usize,
    tx: Mutex<Option<SerialTx>>,
    on_recv: Mutex<Option<InboundSink>>,
}

impl SerialTransport {
    pub fn new(prefix: Vec<u8>, suffix: Vec<u8>) -> Self {
        Self::with_payload_max(prefix, suffix, DEFAULT_SERIAL_PAYLOAD_MAX)
    }

    pub fn with_payload_max(prefix: Vec<u8>, suffix: Vec<u8>, payload_max: usize) -> Self {
        SerialTransport {
            prefix,
            suffix,
            payload_max,
            tx: Mutex::new(None),
            on_recv: Mutex::new(None),
        }
    }

    pub fn set_tx(&self, tx: SerialTx) {
        *self.tx.lock().expect("serial tx lock poisoned") = Some(tx);
    }

    /// Accepts an already-unwrapped RPC frame. Validates the header's
    /// self-consistency (`payload_len` matches the bytes present) and that
    /// the payload does not exceed `serial_payload_max` before delivery to
    /// the inbound funnel.
    pub fn feed_packet(&self, bytes: &[u8]) -> Result<(), RpcError> {
        let frame = crate::frame::Frame::parse(bytes)?;
        if frame.payload.len() > self.payload_max {
            return Err(RpcError::ValueTooLarge);
        }
        self.deliver(bytes);
        Ok(())
    }

    /// Accepts `prefix || frame || suffix`: verifies both markers
    /// byte-for-byte, verifies `payload_len` does not exceed
    /// `serial_payload_max`, and delivers the stripped inner frame.
    pub fn feed_raw_packet(&self, bytes: &[u8]) -> Result<(), RpcError> {
        if !bytes.starts_with(&self.prefix) {
            return Err(RpcError::MalformedFrame);
        }
        if !bytes.ends_with(&self.suffix) || bytes.len() < self.prefix.len() + self.suffix.len() {
            return Err(RpcError::MalformedFrame);
        }
        let inner = &bytes[self.prefix.len()..bytes.len() - self.suffix.len()];
        let frame = crate::frame::Frame::parse(inner)?;
        if frame.payload.len() > self.payload_max {
            return Err(RpcError::ValueTooLarge);
        }
        self.deliver(inner);
        Ok(())
    }

    fn deliver(&self, bytes: &[u8]) {
        let sink = self.on_recv.lock().expect("serial on_recv lock poisoned").clone();
        if let Some(sink) = sink {
            sink(bytes);
        }
    }
}

impl Transport for SerialTransport {
    /// Wraps `prefix || bytes || suffix` and invokes the registered `tx`
    /// callback once. Fails with `NotConnected` if no callback is registered.
    fn send(&self, bytes: &[u8]) -> Result<(), RpcError> {
        let tx = self.tx.lock().expect("serial tx lock poisoned").clone();
        let tx = tx.ok_or(RpcError::NotConnected)?;
        let mut wrapped = Vec::with_capacity(self.prefix.len() + bytes.len() + self.suffix.len());
        wrapped.extend_from_slice(&self.prefix);
        wrapped.extend_from_slice(bytes);
        wrapped.extend_from_slice(&self.suffix);
        tx(&wrapped);
        Ok(())
    }

    fn start(&self, on_recv: InboundSink) -> Result<(), RpcError> {
        let mut slot = self.on_recv.lock().expect("serial on_recv lock poisoned");
        if slot.is_some() {
            return Err(RpcError::InvalidState);
        }
        *slot = Some(on_recv);
        Ok(())
    }

    fn stop(&self) {
        *self.on_recv.lock().expect("serial on_recv lock poisoned") = None;
        *self.tx.lock().expect("serial tx lock poisoned") = None;
    }
}
