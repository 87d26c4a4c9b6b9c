// ABOUTME: Service registry and frame dispatch — parses inbound frames and routes to services
// ABOUTME: Owns the active-stream-method-id task-local slot set around stream dispatch calls

use std::sync::{Arc, RwLock};

use tracing::{debug, trace};

use crate::config::{MAX_SERVICES, STREAM_METHOD_ID_NONE};
use crate::error::RpcError;
use crate::frame::{Frame, HEADER_LEN};
use crate::pool::FramePool;

/// What a service's dispatch produced for one call.
pub enum DispatchOutcome {
    /// A unary response payload, ready to be wrapped in a frame and sent.
    Response(Vec<u8>),
    /// The handler will push its results later via `Core::stream_emit`.
    Stream,
}

/// The capability a registered service provides: given a method index within
/// its own namespace and the raw request payload, produce an outcome.
///
/// Replaces the reference's function-pointer-plus-opaque-context pair with a
/// trait object that owns its own state.
pub trait Dispatch: Send + Sync {
    fn call(&self, method_index: u8, payload: &[u8]) -> Result<DispatchOutcome, RpcError>;
}

struct ServiceEntry {
    #[allow(dead_code)] // carried for diagnostics/logging, not read on the hot path
    name: String,
    dispatch: Arc<dyn Dispatch>,
}

tokio::task_local! {
    static ACTIVE_STREAM_METHOD_ID: std::cell::Cell<u16>;
}

/// Parses frames, resolves the target service from `method_id`'s upper bits,
/// and dispatches. Holds the service table and the stream-in-flight slot;
/// frame emission goes out through the `TransportSet` it is constructed with.
///
/// Response frames are acquired from the same bounded `FramePool` that
/// backs `Core::stream_emit`, mirroring `esprpc_handle_request`'s use of
/// `pool_malloc` for both the request-response path and stream emission —
/// a dispatch that returns an oversized payload is rejected rather than
/// allocating an unbounded heap buffer.
pub struct Router {
    services: RwLock<Vec<Option<ServiceEntry>>>,
    pool: FramePool,
}

impl Router {
    pub fn new(pool: FramePool) -> Self {
        let mut slots = Vec::with_capacity(MAX_SERVICES);
        slots.resize_with(MAX_SERVICES, || None);
        Router {
            services: RwLock::new(slots),
            pool,
        }
    }

    /// Registers a service, returning its assigned service index.
    /// Fails with `TableFull` once all `MAX_SERVICES` slots are occupied.
    pub fn register_service(
        &self,
        name: impl Into<String>,
        dispatch: Arc<dyn Dispatch>,
    ) -> Result<u8, RpcError> {
        let mut services = self.services.write().expect("router service table poisoned");
        let slot = services.iter().position(|s| s.is_none()).ok_or(RpcError::TableFull)?;
        services[slot] = Some(ServiceEntry {
            name: name.into(),
            dispatch,
        });
        Ok(slot as u8)
    }

    /// Clears every registered service. Used by `Core::shutdown`.
    pub fn clear(&self) {
        let mut services = self.services.write().expect("router service table poisoned");
        for slot in services.iter_mut() {
            *slot = None;
        }
    }

    /// Parses one frame out of `bytes`, dispatches it, and returns the
    /// response frame bytes to send (if any). Silently drops frames whose
    /// service index is unregistered or whose dispatch returns
    /// `UnknownMethod`/any error — matching the reference's "no response on
    /// failure" policy; only malformed input and a dispatch that
    /// successfully produces a response are distinguishable by the caller.
    pub fn handle(&self, bytes: &[u8]) -> Result<Option<Vec<u8>>, RpcError> {
        let frame = Frame::parse(bytes)?;
        let service_index = Frame::service_index(frame.method_id);
        let method_index = Frame::method_index(frame.method_id);

        let dispatch = {
            let services = self.services.read().expect("router service table poisoned");
            match services.get(service_index as usize).and_then(|s| s.as_ref()) {
                Some(entry) => entry.dispatch.clone(),
                None => {
                    trace!(service_index, "dropping frame for unregistered service");
                    return Ok(None);
                }
            }
        };

        match dispatch.call(method_index, frame.payload) {
            Ok(DispatchOutcome::Response(response)) => {
                if response.is_empty() {
                    return Ok(None);
                }
                let total = HEADER_LEN + response.len();
                if total > self.pool.block_size() {
                    debug!(total, service_index, method_index, "dispatch response too large for pool block, dropping");
                    return Err(RpcError::FrameTooLarge);
                }
                let mut block = self.pool.acquire()?;
                let n = Frame::emit(frame.method_id, frame.invoke_id, &response, &mut block[..total])?;
                Ok(Some(block[..n].to_vec()))
            }
            Ok(DispatchOutcome::Stream) => Ok(None),
            Err(e) => {
                debug!(?e, service_index, method_index, "dispatch returned error, dropping");
                Ok(None)
            }
        }
    }

    /// Runs `f` with the stream-in-flight slot set to `method_id` for the
    /// duration of the call, clearing it back to the sentinel afterward.
    /// Uses a `tokio::task_local!` rather than a thread-local: Tokio tasks
    /// migrate between worker threads, so a thread-local would leak the
    /// wrong value across an `.await` point that hops threads.
    pub async fn with_stream_method_id<F, Fut, T>(&self, method_id: u16, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        ACTIVE_STREAM_METHOD_ID
            .scope(std::cell::Cell::new(method_id), f())
            .await
    }

    /// Reads the current stream-in-flight slot, or the sentinel if not
    /// presently inside a stream-dispatch call.
    pub fn stream_get_method_id(&self) -> u16 {
        ACTIVE_STREAM_METHOD_ID
            .try_with(|cell| cell.get())
            .unwrap_or(STREAM_METHOD_ID_NONE)
    }

    /// Overwrites the current task's stream-in-flight slot. Only meaningful
    /// inside a `with_stream_method_id` scope; a no-op outside one.
    pub fn stream_set_method_id(&self, method_id: u16) {
        let _ = ACTIVE_STREAM_METHOD_ID.try_with(|cell| cell.set(method_id));
    }
}

/// A growable response buffer for demo/test `Dispatch` implementations.
/// Starts at the reference's 1024-byte sizing convention; not mandated for
/// real generated dispatch code, which may size its own buffers.
pub struct ResponseWriter {
    buf: Vec<u8>,
}

impl ResponseWriter {
    pub const DEFAULT_CAPACITY: usize = 1024;

    pub fn new() -> Self {
        ResponseWriter {
            buf: Vec::with_capacity(Self::DEFAULT_CAPACITY),
        }
    }

    pub fn writer(&mut self) -> crate::codec::WriteCursor<'_> {
        self.buf.resize(Self::DEFAULT_CAPACITY, 0);
        crate::codec::WriteCursor::new(&mut self.buf)
    }

    /// Finalizes the buffer to exactly the bytes written through the last
    /// `writer()` cursor's final position.
    pub fn finish(mut self, written: usize) -> Vec<u8> {
        self.buf.truncate(written);
        self.buf
    }
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoDispatch;
    impl Dispatch for EchoDispatch {
        fn call(&self, _method_index: u8, payload: &[u8]) -> Result<DispatchOutcome, RpcError> {
            Ok(DispatchOutcome::Response(payload.to_vec()))
        }
    }

    struct FailingDispatch;
    impl Dispatch for FailingDispatch {
        fn call(&self, _method_index: u8, _payload: &[u8]) -> Result<DispatchOutcome, RpcError> {
            Err(RpcError::UnknownMethod)
        }
    }

    fn test_pool() -> FramePool {
        FramePool::new(4, 128)
    }

    #[test]
    fn registration_fills_table_then_fails_with_table_full() {
        let router = Router::new(test_pool());
        for _ in 0..MAX_SERVICES {
            router.register_service("svc", Arc::new(EchoDispatch)).unwrap();
        }
        let err = router
            .register_service("overflow", Arc::new(EchoDispatch))
            .unwrap_err();
        assert_eq!(err, RpcError::TableFull);
    }

    #[test]
    fn unary_success_builds_response_frame() {
        let router = Router::new(test_pool());
        let index = router.register_service("UserService", Arc::new(EchoDispatch)).unwrap();
        assert_eq!(index, 0);

        let method_id = Frame::make_method_id(0, 1);
        let mut input = [0u8; 9];
        Frame::emit(method_id, 7, &[0x2A, 0x00, 0x00, 0x00], &mut input).unwrap();

        let response = router.handle(&input).unwrap().unwrap();
        let frame = Frame::parse(&response).unwrap();
        assert_eq!(frame.method_id, method_id);
        assert_eq!(frame.invoke_id, 7);
        assert_eq!(frame.payload, &[0x2A, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn unknown_service_is_dropped_silently() {
        let router = Router::new(test_pool());
        let method_id = Frame::make_method_id(7, 0);
        let mut input = [0u8; 5];
        Frame::emit(method_id, 1, &[], &mut input).unwrap();
        assert_eq!(router.handle(&input).unwrap(), None);
    }

    #[test]
    fn malformed_frame_is_reported_as_error_not_dropped() {
        let router = Router::new(test_pool());
        let input = [0x01u8, 0x00, 0x00, 0xFF, 0x00];
        assert_eq!(router.handle(&input).unwrap_err(), RpcError::MalformedFrame);
    }

    #[test]
    fn failing_dispatch_drops_response() {
        let router = Router::new(test_pool());
        router.register_service("svc", Arc::new(FailingDispatch)).unwrap();
        let method_id = Frame::make_method_id(0, 0);
        let mut input = [0u8; 5];
        Frame::emit(method_id, 1, &[], &mut input).unwrap();
        assert_eq!(router.handle(&input).unwrap(), None);
    }

    #[test]
    fn response_larger_than_pool_block_is_rejected_as_frame_too_large() {
        let router = Router::new(FramePool::new(4, 8));
        router.register_service("svc", Arc::new(EchoDispatch)).unwrap();
        let method_id = Frame::make_method_id(0, 0);
        let mut input = [0u8; HEADER_LEN + 16];
        Frame::emit(method_id, 1, &[0u8; 16], &mut input).unwrap();
        assert_eq!(router.handle(&input).unwrap_err(), RpcError::FrameTooLarge);
    }

    #[tokio::test]
    async fn stream_method_id_is_scoped_and_cleared_after() {
        let router = Arc::new(Router::new(test_pool()));
        let r = router.clone();
        router
            .with_stream_method_id(0x20, || async move {
                assert_eq!(r.stream_get_method_id(), 0x20);
            })
            .await;
        assert_eq!(router.stream_get_method_id(), STREAM_METHOD_ID_NONE);
    }
}
