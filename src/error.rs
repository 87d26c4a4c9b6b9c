// ABOUTME: Error taxonomy for the RPC core — frame/codec/registry/transport failures
// ABOUTME: One flat enum so drop-and-log call sites and registration call sites share a vocabulary

use thiserror::Error;

/// Error type shared across the whole crate.
///
/// Mirrors the taxonomy the spec pins down: most variants correspond to a
/// silent-drop-on-the-inbound-path action, a handful are returned directly to
/// a caller (registration, stream emit). `Io` and `QueueFull` are ambient
/// additions for the real transports (§7 ADDED in SPEC_FULL.md) and carry no
/// protocol-level meaning of their own.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// Frame header too short, or `payload_len` exceeds the bytes available.
    #[error("malformed frame")]
    MalformedFrame,

    /// `method_id`'s service index has no registered service.
    #[error("unknown service")]
    UnknownService,

    /// Dispatch did not recognize the method index within its service.
    #[error("unknown method")]
    UnknownMethod,

    /// Not enough bytes remained in the read cursor for the requested value.
    #[error("short read")]
    ShortRead,

    /// Not enough room remained in the write cursor for the requested value.
    #[error("short write")]
    ShortWrite,

    /// A value (currently: string length) exceeded what the wire form can carry.
    #[error("value too large to encode")]
    ValueTooLarge,

    /// A registration call found its table already at capacity.
    #[error("table full")]
    TableFull,

    /// Allocation failed (frame pool exhausted and the backing allocator failed).
    #[error("out of memory")]
    OutOfMemory,

    /// A transport has no connected peer to send to.
    #[error("not connected")]
    NotConnected,

    /// A transport was asked to act before being started, or after being stopped.
    #[error("invalid transport state")]
    InvalidState,

    /// A stream frame's header plus payload would exceed the pool block size.
    #[error("frame too large")]
    FrameTooLarge,

    /// A transport's bounded outbound queue had no room for another frame.
    #[error("outbound queue full")]
    QueueFull,

    /// Ambient I/O failure from a real transport (socket, etc).
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for RpcError {
    fn from(e: std::io::Error) -> Self {
        RpcError::Io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;
