// ABOUTME: Core struct — the public surface wiring Router, TransportSet, and FramePool together
// ABOUTME: Core::new is infallible; shutdown clears registries, Drop handles frame pool teardown

use std::sync::Arc;

use tracing::{info, trace};

use crate::config::CoreConfig;
use crate::error::RpcError;
use crate::frame::{Frame, HEADER_LEN};
use crate::pool::FramePool;
use crate::router::{Dispatch, Router};
use crate::transport::set::TransportSet;
use crate::transport::Transport;

/// The RPC core: a service registry, a transport registry, and the frame
/// pool used for stream emissions, wired together behind one handle.
///
/// Construction cannot fail in Rust the way the reference's `init()` can
/// fail to allocate its mutex — `std::sync::Mutex` needs no fallible setup —
/// so `Core::new` is infallible where the reference's `init()` returns a
/// status code.
pub struct Core {
    router: Router,
    transports: TransportSet,
    pool: FramePool,
    config: CoreConfig,
}

impl Core {
    pub fn new(config: CoreConfig) -> Self {
        info!(
            pool_block_size = config.pool_block_size,
            "initializing rpc core"
        );
        let pool = FramePool::new(config.pool_capacity, config.pool_block_size);
        Core {
            router: Router::new(pool.clone()),
            transports: TransportSet::new(),
            pool,
            config,
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Stops and clears every registered transport, then clears the service
    /// registry. The frame pool's blocks return to the allocator on `Drop`,
    /// same as the rest of `Core`.
    pub fn shutdown(&self) {
        info!("shutting down rpc core");
        self.transports.stop_and_clear();
        self.router.clear();
    }

    /// Registers a service implementation, returning its assigned index.
    pub fn register_service(
        &self,
        name: impl Into<String>,
        dispatch: Arc<dyn Dispatch>,
    ) -> Result<u8, RpcError> {
        self.router.register_service(name, dispatch)
    }

    /// Registers a transport and starts it with this core's inbound funnel.
    pub fn add_transport(self: &Arc<Self>, transport: Arc<dyn Transport>) -> Result<(), RpcError> {
        self.transports.add(transport.clone())?;
        let core = self.clone();
        transport.start(Arc::new(move |bytes: &[u8]| {
            core.handle_request(bytes);
        }))
    }

    pub fn remove_transport(&self, transport: &Arc<dyn Transport>) {
        transport.stop();
        self.transports.remove(transport);
    }

    /// Broadcasts an already-framed buffer verbatim to every transport.
    pub fn send(&self, bytes: &[u8]) -> Result<(), RpcError> {
        self.transports.broadcast(bytes)
    }

    /// Parses and dispatches one inbound frame. Framing/dispatch errors are
    /// logged and dropped silently, matching the reference's inbound-path
    /// policy; only a successful dispatch that yields a response results in
    /// an outbound broadcast.
    pub fn handle_request(&self, bytes: &[u8]) {
        match self.router.handle(bytes) {
            Ok(Some(response)) => {
                if let Err(e) = self.transports.broadcast(&response) {
                    trace!(?e, "response broadcast failed on at least one transport");
                }
            }
            Ok(None) => {}
            Err(e) => {
                trace!(?e, "dropping inbound frame");
            }
        }
    }

    pub fn stream_set_method_id(&self, method_id: u16) {
        self.router.stream_set_method_id(method_id);
    }

    pub fn stream_get_method_id(&self) -> u16 {
        self.router.stream_get_method_id()
    }

    /// Runs `f` with the stream-in-flight slot set to `method_id`, as the
    /// router requires around any stream-returning dispatch call.
    pub async fn with_stream_method_id<F, Fut, T>(&self, method_id: u16, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        self.router.with_stream_method_id(method_id, f).await
    }

    /// Pushes a stream event frame (`invoke_id == 0`) for `method_id` to
    /// every transport. Fails with `FrameTooLarge` if the framed payload
    /// would not fit in one pool block, and with `OutOfMemory` if the pool
    /// is exhausted; in neither case is any transport's `send` invoked.
    pub fn stream_emit(&self, method_id: u16, payload: &[u8]) -> Result<(), RpcError> {
        let total = HEADER_LEN + payload.len();
        if total > self.pool.block_size() {
            return Err(RpcError::FrameTooLarge);
        }
        let mut block = self.pool.acquire()?;
        let method_id_byte = (method_id & 0xFF) as u8;
        let n = Frame::emit(method_id_byte, 0, payload, &mut block[..total])?;
        self.transports.broadcast(&block[..n])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::DispatchOutcome;
    use std::sync::Mutex as StdMutex;

    struct EchoDispatch;
    impl Dispatch for EchoDispatch {
        fn call(&self, _method_index: u8, payload: &[u8]) -> Result<DispatchOutcome, RpcError> {
            Ok(DispatchOutcome::Response(payload.to_vec()))
        }
    }

    struct RecordingTransport {
        sent: StdMutex<Vec<Vec<u8>>>,
    }

    impl Transport for RecordingTransport {
        fn send(&self, bytes: &[u8]) -> Result<(), RpcError> {
            self.sent.lock().unwrap().push(bytes.to_vec());
            Ok(())
        }
        fn start(&self, _on_recv: crate::transport::InboundSink) -> Result<(), RpcError> {
            Ok(())
        }
        fn stop(&self) {}
    }

    #[test]
    fn unary_request_flows_through_handle_request_to_transport() {
        let core = Arc::new(Core::new(CoreConfig::default()));
        core.register_service("svc", Arc::new(EchoDispatch)).unwrap();
        let transport = Arc::new(RecordingTransport {
            sent: StdMutex::new(Vec::new()),
        });
        core.add_transport(transport.clone()).unwrap();

        let method_id = Frame::make_method_id(0, 0);
        let mut input = [0u8; HEADER_LEN + 3];
        Frame::emit(method_id, 9, b"hey", &mut input).unwrap();
        core.handle_request(&input);

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let frame = Frame::parse(&sent[0]).unwrap();
        assert_eq!(frame.invoke_id, 9);
        assert_eq!(frame.payload, b"hey");
    }

    #[test]
    fn stream_emit_broadcasts_zero_invoke_id_frame() {
        let core = Arc::new(Core::new(CoreConfig::default()));
        let transport = Arc::new(RecordingTransport {
            sent: StdMutex::new(Vec::new()),
        });
        core.add_transport(transport.clone()).unwrap();

        core.stream_emit(0x20, &[0x01, 0x02, 0x03]).unwrap();
        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0], vec![0x20, 0x00, 0x00, 0x03, 0x00, 0x01, 0x02, 0x03]);
    }

    struct OversizedDispatch;
    impl Dispatch for OversizedDispatch {
        fn call(&self, _method_index: u8, _payload: &[u8]) -> Result<DispatchOutcome, RpcError> {
            Ok(DispatchOutcome::Response(vec![0u8; 100]))
        }
    }

    #[test]
    fn dispatch_response_larger_than_pool_block_is_dropped_without_sending() {
        let core = Arc::new(Core::new(CoreConfig::default().with_pool_block_size(8)));
        core.register_service("svc", Arc::new(OversizedDispatch)).unwrap();
        let transport = Arc::new(RecordingTransport {
            sent: StdMutex::new(Vec::new()),
        });
        core.add_transport(transport.clone()).unwrap();

        let method_id = Frame::make_method_id(0, 0);
        let mut input = [0u8; HEADER_LEN];
        Frame::emit(method_id, 1, &[], &mut input).unwrap();
        core.handle_request(&input);

        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn stream_emit_too_large_for_block_is_rejected_without_sending() {
        let core = Arc::new(
            Core::new(CoreConfig::default().with_pool_block_size(8)),
        );
        let transport = Arc::new(RecordingTransport {
            sent: StdMutex::new(Vec::new()),
        });
        core.add_transport(transport.clone()).unwrap();

        let payload = vec![0u8; 100];
        let err = core.stream_emit(0x01, &payload).unwrap_err();
        assert_eq!(err, RpcError::FrameTooLarge);
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn stream_emit_with_pool_exhausted_is_out_of_memory_and_sends_nothing() {
        let core = Arc::new(Core::new(CoreConfig::default().with_pool_capacity(1)));
        let transport = Arc::new(RecordingTransport {
            sent: StdMutex::new(Vec::new()),
        });
        core.add_transport(transport.clone()).unwrap();

        let held = core.pool.acquire().unwrap();
        let err = core.stream_emit(0x01, &[1, 2, 3]).unwrap_err();
        assert_eq!(err, RpcError::OutOfMemory);
        assert!(transport.sent.lock().unwrap().is_empty());
        drop(held);
    }

    #[tokio::test]
    async fn stream_method_id_scope_is_visible_during_dispatch() {
        let core = Arc::new(Core::new(CoreConfig::default()));
        let seen = Arc::new(StdMutex::new(None));
        let seen2 = seen.clone();
        let core2 = core.clone();
        core.with_stream_method_id(0x20, || async move {
            *seen2.lock().unwrap() = Some(core2.stream_get_method_id());
        })
        .await;
        assert_eq!(*seen.lock().unwrap(), Some(0x20));
        assert_eq!(core.stream_get_method_id(), crate::config::STREAM_METHOD_ID_NONE);
    }
}
