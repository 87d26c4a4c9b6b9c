// ABOUTME: Compile-time defaults and the per-instance CoreConfig override struct
// ABOUTME: Mirrors the reference's Kconfig-style constants as defaultable fields

/// Service-table capacity; bounds the 3-bit service-index field in `method_id`.
pub const MAX_SERVICES: usize = 8;

/// Transport-table capacity.
pub const MAX_TRANSPORTS: usize = 4;

/// Largest frame (header + payload) the frame pool can hand out.
pub const FRAME_POOL_BLOCK_SIZE: usize = 2048;

/// Number of blocks the frame pool pre-allocates; `acquire` beyond this
/// many concurrently-held blocks fails with `OutOfMemory`.
pub const FRAME_POOL_CAPACITY: usize = 4;

/// Default largest payload accepted on the serial feed path.
pub const DEFAULT_SERIAL_PAYLOAD_MAX: usize = 1024;

/// Largest inbound/outbound GATT frame.
pub const BLE_FRAME_MAX: usize = 512;

/// Maximum bytes in a single serial packet marker (prefix or suffix).
pub const SERIAL_MARKER_MAX: usize = 16;

/// Sentinel value for "not currently inside a stream call".
pub const STREAM_METHOD_ID_NONE: u16 = 0xFFFF;

/// Per-instance overrides for the compile-time constants above.
///
/// The embedded original hard-wires these via `#define`/Kconfig; this crate
/// targets both genuinely constrained builds and a desktop dev loop, so they
/// are plain fields with the §6 defaults, overridable per `Core`.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub pool_block_size: usize,
    pub pool_capacity: usize,
    pub serial_payload_max: usize,
    pub ble_frame_max: usize,
    pub serial_prefix: Vec<u8>,
    pub serial_suffix: Vec<u8>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        CoreConfig {
            pool_block_size: FRAME_POOL_BLOCK_SIZE,
            pool_capacity: FRAME_POOL_CAPACITY,
            serial_payload_max: DEFAULT_SERIAL_PAYLOAD_MAX,
            ble_frame_max: BLE_FRAME_MAX,
            serial_prefix: Vec::new(),
            serial_suffix: Vec::new(),
        }
    }
}

impl CoreConfig {
    pub fn with_pool_block_size(mut self, size: usize) -> Self {
        self.pool_block_size = size;
        self
    }

    pub fn with_pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity;
        self
    }

    pub fn with_serial_payload_max(mut self, max: usize) -> Self {
        self.serial_payload_max = max;
        self
    }

    pub fn with_ble_frame_max(mut self, max: usize) -> Self {
        self.ble_frame_max = max;
        self
    }

    pub fn with_serial_markers(mut self, prefix: Vec<u8>, suffix: Vec<u8>) -> Self {
        self.serial_prefix = prefix;
        self.serial_suffix = suffix;
        self
    }
}
