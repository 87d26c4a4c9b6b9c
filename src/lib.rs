//! A lightweight, multi-transport RPC framework core for constrained devices.
//!
//! A binary frame protocol (5-byte header plus payload), a no-alloc-on-the-
//! wire primitive/string/list/map codec, a bounded frame pool for outbound
//! buffers, a service dispatch registry, and three transports (WebSocket,
//! BLE/GATT, serial) fan requests in and responses/stream events back out
//! through a single [`Core`].
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rpc_core::{Core, CoreConfig, Dispatch, DispatchOutcome, RpcError};
//!
//! struct Echo;
//! impl Dispatch for Echo {
//!     fn call(&self, _method_index: u8, payload: &[u8]) -> Result<DispatchOutcome, RpcError> {
//!         Ok(DispatchOutcome::Response(payload.to_vec()))
//!     }
//! }
//!
//! let core = Arc::new(Core::new(CoreConfig::default()));
//! core.register_service("echo", Arc::new(Echo)).unwrap();
//! ```

pub mod api;
pub mod codec;
pub mod config;
pub mod error;
pub mod frame;
pub mod pool;
pub mod router;
pub mod transport;

pub use api::Core;
pub use codec::{ReadCursor, WriteCursor};
pub use config::CoreConfig;
pub use error::{Result, RpcError};
pub use frame::{Frame, FrameKind};
pub use pool::{FramePool, OutboundBlock};
pub use router::{Dispatch, DispatchOutcome, ResponseWriter};
pub use transport::{InboundSink, Transport};
