// ABOUTME: Fixed-size block allocator handing out pool-owned buffers for outbound frames
// ABOUTME: Box<[u8; N]> free-list stack behind a mutex; blocks return to the pool on Drop

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

use crate::error::RpcError;

struct Inner {
    free: Mutex<Vec<Box<[u8]>>>,
    block_size: usize,
}

/// Fixed-size block pool for outbound frame buffers.
///
/// The reference implementation carves blocks out of a static arena and
/// threads a free list through the blocks themselves via pointer aliasing.
/// This version keeps the fixed-capacity, fixed-size-block shape but backs
/// the free list with a `Vec<Box<[u8]>>`: every block is a heap allocation
/// made once at construction and recycled via `acquire`/`release` rather than
/// an embedded intrusive pointer.
#[derive(Clone)]
pub struct FramePool {
    inner: Arc<Inner>,
}

impl FramePool {
    /// Builds a pool of `capacity` blocks, each `block_size` bytes.
    pub fn new(capacity: usize, block_size: usize) -> Self {
        let mut free = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            free.push(vec![0u8; block_size].into_boxed_slice());
        }
        FramePool {
            inner: Arc::new(Inner {
                free: Mutex::new(free),
                block_size,
            }),
        }
    }

    pub fn block_size(&self) -> usize {
        self.inner.block_size
    }

    /// Takes a block from the free list. Fails with `OutOfMemory` once the
    /// pool is exhausted; the reference's allocator failure has no richer
    /// classification either.
    pub fn acquire(&self) -> Result<OutboundBlock, RpcError> {
        let mut free = self.inner.free.lock().expect("frame pool mutex poisoned");
        let block = free.pop().ok_or(RpcError::OutOfMemory)?;
        Ok(OutboundBlock {
            block: Some(block),
            pool: self.inner.clone(),
        })
    }

    /// Number of blocks currently available. Test/diagnostic use only.
    pub fn available(&self) -> usize {
        self.inner.free.lock().expect("frame pool mutex poisoned").len()
    }
}

/// An RAII handle to a pool-owned block. Returns its block to the pool's
/// free list when dropped; never panics or leaks on double-use since the
/// block is only reachable through this single owning handle.
pub struct OutboundBlock {
    block: Option<Box<[u8]>>,
    pool: Arc<Inner>,
}

impl Deref for OutboundBlock {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.block.as_deref().expect("block taken before drop")
    }
}

impl DerefMut for OutboundBlock {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.block.as_deref_mut().expect("block taken before drop")
    }
}

impl Drop for OutboundBlock {
    fn drop(&mut self) {
        if let Some(block) = self.block.take() {
            let mut free = self.pool.free.lock().expect("frame pool mutex poisoned");
            free.push(block);
        }
    }
}
