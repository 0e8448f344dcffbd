//! Reusable byte buffers.
//!
//! A small free-list of `BytesMut` shared by every in-flight request. The
//! pool only saves allocations; handing out a fresh buffer is always
//! correct.

use bytes::BytesMut;
use std::sync::Mutex;

/// Upper bound on idle buffers kept by a pool.
pub const DEFAULT_POOL_CAPACITY: usize = 64;

/// Thread-safe pool of byte buffers.
#[derive(Debug)]
pub struct BufferPool {
    /// Idle buffers ready to be handed out.
    free: Mutex<Vec<BytesMut>>,
    /// Capacity given to freshly allocated buffers.
    buffer_size: usize,
    /// Maximum number of idle buffers retained.
    max_idle: usize,
}

impl BufferPool {
    /// Create a pool whose new buffers start with `buffer_size` bytes of capacity.
    pub fn new(buffer_size: usize) -> Self {
        Self::with_capacity(buffer_size, DEFAULT_POOL_CAPACITY)
    }

    /// Create a pool retaining at most `max_idle` idle buffers.
    pub fn with_capacity(buffer_size: usize, max_idle: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(max_idle)),
            buffer_size,
            max_idle,
        }
    }

    /// Take a buffer out of the pool.
    ///
    /// The buffer may still hold bytes from its previous user; callers
    /// clear it before writing.
    pub fn acquire(&self) -> BytesMut {
        let reused = self
            .free
            .lock()
            .expect("buffer pool mutex poisoned")
            .pop();
        reused.unwrap_or_else(|| BytesMut::with_capacity(self.buffer_size))
    }

    /// Return a buffer to the pool. The caller gives up the buffer for good.
    pub fn release(&self, buf: BytesMut) {
        let mut free = self.free.lock().expect("buffer pool mutex poisoned");
        if free.len() < self.max_idle {
            free.push(buf);
        }
    }

    /// Number of idle buffers currently held.
    pub fn idle(&self) -> usize {
        self.free.lock().expect("buffer pool mutex poisoned").len()
    }
}
