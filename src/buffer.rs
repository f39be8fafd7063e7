//! Monitor buffer abstraction and status-ring replenishment.
//!
//! `MonBuffer` plays the role the network buffer plays in the hardware
//! driver: a byte region with reserved headroom whose ownership moves through
//! the pipeline exactly once. Functions that may fail after taking ownership
//! either consume the buffer or return it in the error position so the
//! caller can free it.

use std::sync::atomic::{AtomicIsize, Ordering};
use std::sync::Arc;

use log::debug;

use crate::errors::AllocError;

/// Status ring buffer size.
pub const STATUS_BUF_SIZE: usize = 2048;

/// Headroom reserved at the front of freshly allocated buffers.
pub const MON_BUF_HEADROOM: usize = 128;

/// Upper bound on alloc/map retries when replenishing a status ring entry.
pub const ALLOC_MAP_RETRY_LIMIT: u32 = 100;

/// An owned byte buffer with adjustable head and tail, mirroring a DMA-able
/// network buffer. Cloning duplicates the bytes and, in tests, shares the
/// live-count token so ownership balance can be asserted.
#[derive(Debug)]
pub struct MonBuffer {
    data: Vec<u8>,
    head: usize,
    len: usize,
    mapped: bool,
    token: Option<Arc<AtomicIsize>>,
}

impl MonBuffer {
    /// Allocate an empty buffer with `headroom` reserved bytes and room for
    /// `size` data bytes.
    pub fn with_capacity(size: usize, headroom: usize) -> Self {
        MonBuffer {
            data: vec![0u8; headroom + size],
            head: headroom,
            len: 0,
            mapped: false,
            token: None,
        }
    }

    /// Build a buffer holding `bytes`, with default headroom in front.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut data = vec![0u8; MON_BUF_HEADROOM + bytes.len()];
        data[MON_BUF_HEADROOM..].copy_from_slice(bytes);
        MonBuffer {
            data,
            head: MON_BUF_HEADROOM,
            len: bytes.len(),
            mapped: false,
            token: None,
        }
    }

    /// Attach a shared live counter, incremented now and decremented on drop.
    /// Used by tests to prove every buffer handed to the pipeline is either
    /// delivered or freed.
    pub fn with_token(mut self, token: Arc<AtomicIsize>) -> Self {
        token.fetch_add(1, Ordering::SeqCst);
        self.token = Some(token);
        self
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn headroom(&self) -> usize {
        self.head
    }

    pub fn data(&self) -> &[u8] {
        &self.data[self.head..self.head + self.len]
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.head..self.head + self.len]
    }

    /// Advance the head, discarding `n` leading bytes. Returns `None` when
    /// fewer than `n` bytes are present.
    pub fn pull_head(&mut self, n: usize) -> Option<()> {
        if n > self.len {
            return None;
        }
        self.head += n;
        self.len -= n;
        Some(())
    }

    /// Grow the front of the buffer by `n` bytes of headroom and return the
    /// newly exposed region. Fails when headroom is exhausted.
    pub fn push_head(&mut self, n: usize) -> Option<&mut [u8]> {
        if n > self.head {
            return None;
        }
        self.head -= n;
        self.len += n;
        Some(&mut self.data[self.head..self.head + n])
    }

    /// Append bytes at the tail, growing the backing store if needed.
    pub fn put_tail(&mut self, bytes: &[u8]) {
        let end = self.head + self.len;
        if end + bytes.len() > self.data.len() {
            self.data.resize(end + bytes.len(), 0);
        }
        self.data[end..end + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
    }

    /// Trim the buffer down to `len` data bytes.
    pub fn trim_to(&mut self, len: usize) {
        if len < self.len {
            self.len = len;
        }
    }

    pub(crate) fn set_mapped(&mut self, mapped: bool) {
        self.mapped = mapped;
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped
    }
}

impl Clone for MonBuffer {
    fn clone(&self) -> Self {
        if let Some(token) = &self.token {
            token.fetch_add(1, Ordering::SeqCst);
        }
        MonBuffer {
            data: self.data.clone(),
            head: self.head,
            len: self.len,
            mapped: false,
            token: self.token.clone(),
        }
    }
}

impl Drop for MonBuffer {
    fn drop(&mut self) {
        if let Some(token) = &self.token {
            token.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Buffer supplier for the status ring. The production implementation wraps
/// the platform allocator; tests substitute one with scripted failures.
pub trait BufferAllocator: Send + Sync {
    /// Allocate one status buffer, or fail transiently.
    fn alloc(&self) -> Result<MonBuffer, AllocError>;

    /// Make the buffer visible to hardware. May fail independently of
    /// allocation.
    fn map(&self, buf: &mut MonBuffer) -> Result<(), AllocError>;

    fn unmap(&self, buf: &mut MonBuffer);
}

/// Plain heap-backed allocator.
#[derive(Debug, Default)]
pub struct HeapAllocator;

impl BufferAllocator for HeapAllocator {
    fn alloc(&self) -> Result<MonBuffer, AllocError> {
        Ok(MonBuffer::with_capacity(STATUS_BUF_SIZE, MON_BUF_HEADROOM))
    }

    fn map(&self, buf: &mut MonBuffer) -> Result<(), AllocError> {
        buf.set_mapped(true);
        Ok(())
    }

    fn unmap(&self, buf: &mut MonBuffer) {
        buf.set_mapped(false);
    }
}

/// Allocate and map a replacement status buffer, retrying transient failures
/// up to [`ALLOC_MAP_RETRY_LIMIT`] times. A buffer whose mapping fails is
/// freed before the next attempt; it never leaks.
pub fn prepare_status_buffer(
    allocator: &dyn BufferAllocator,
    alloc_fail: &mut u32,
    map_fail: &mut u32,
) -> Result<MonBuffer, AllocError> {
    for attempt in 0..ALLOC_MAP_RETRY_LIMIT {
        let mut buf = match allocator.alloc() {
            Ok(buf) => buf,
            Err(_) => {
                *alloc_fail += 1;
                debug!("status buffer alloc failed, attempt {}", attempt + 1);
                continue;
            }
        };
        match allocator.map(&mut buf) {
            Ok(()) => return Ok(buf),
            Err(_) => {
                *map_fail += 1;
                debug!("status buffer map failed, attempt {}", attempt + 1);
                // buf dropped here, freeing it before retrying
            }
        }
    }
    Err(AllocError::Exhausted(ALLOC_MAP_RETRY_LIMIT))
}
