// ABOUTME: Bounded registry of active transports with identity-based add/remove and fan-out send
// ABOUTME: broadcast is last-error-wins: every transport is tried, no short-circuit on failure

use std::sync::{Arc, RwLock};

use crate::config::MAX_TRANSPORTS;
use crate::error::RpcError;
use crate::transport::Transport;

/// Holds the set of transports a `Core` currently broadcasts frames to.
pub struct TransportSet {
    transports: RwLock<Vec<Arc<dyn Transport>>>,
}

impl TransportSet {
    pub fn new() -> Self {
        TransportSet {
            transports: RwLock::new(Vec::with_capacity(MAX_TRANSPORTS)),
        }
    }

    /// Appends `transport`. Fails with `TableFull` once `MAX_TRANSPORTS`
    /// entries are already registered.
    pub fn add(&self, transport: Arc<dyn Transport>) -> Result<(), RpcError> {
        let mut transports = self.transports.write().expect("transport set poisoned");
        if transports.len() >= MAX_TRANSPORTS {
            return Err(RpcError::TableFull);
        }
        transports.push(transport);
        Ok(())
    }

    /// Removes the entry identical (by `Arc::ptr_eq`) to `transport`,
    /// compacting the remaining entries into a contiguous prefix.
    pub fn remove(&self, transport: &Arc<dyn Transport>) {
        let mut transports = self.transports.write().expect("transport set poisoned");
        transports.retain(|t| !Arc::ptr_eq(t, transport));
    }

    /// Sends `bytes` on every registered transport. Every transport is
    /// attempted regardless of earlier failures; the returned result is
    /// `Ok(())` only if all succeeded, otherwise the last error observed.
    pub fn broadcast(&self, bytes: &[u8]) -> Result<(), RpcError> {
        let transports = self.transports.read().expect("transport set poisoned");
        let mut last_err = None;
        for transport in transports.iter() {
            if let Err(e) = transport.send(bytes) {
                last_err = Some(e);
            }
        }
        match last_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Stops every registered transport and empties the registry. Used by
    /// `Core::shutdown`.
    pub fn stop_and_clear(&self) {
        let mut transports = self.transports.write().expect("transport set poisoned");
        for transport in transports.drain(..) {
            transport.stop();
        }
    }

    pub fn len(&self) -> usize {
        self.transports.read().expect("transport set poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TransportSet {
    fn default() -> Self {
        Self::new()
    }
}
