//! Reuse pools for receive buffers and decoded objects.
//!
//! Each pool is a single-shard `buffer_pool::Pool`, leaked to `'static` when
//! the pool is created so that [`Pooled`] handles can find their way home.
//! Handles move by value, so each object has exactly one owner at a time.
//! Dropping a handle returns the object through its [`Reuse`] hook; objects
//! the hook rejects, or that arrive while the free list is full, are dropped.
//!
//! Pooled objects are reset on return: owned byte storage is dropped rather
//! than truncated, so nothing decoded from an earlier datagram is reachable
//! from an acquired object.
//!
//! Pools are created once per process and live until it exits.

use crate::header::PacketHeader;
use crate::packet::Packet;
use buffer_pool::Pool;
use bytes::BytesMut;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::trace;

pub use buffer_pool::{Pooled, Reuse};

/// Default receive buffer size, one Ethernet MTU.
pub const DEFAULT_BUFFER_SIZE: usize = 1500;

/// Default cap on idle objects kept by each pool.
pub const DEFAULT_MAX_RETAINED: usize = 2048;

// ============================================================================
// Pooled Types
// ============================================================================

/// Fixed-capacity receive buffer handed out by [`BufferPool`].
///
/// Derefs to the underlying `BytesMut`.
#[derive(Debug, Default)]
pub struct RecvBuffer(BytesMut);

impl RecvBuffer {
    fn zeroed(size: usize) -> Self {
        let mut buf = BytesMut::with_capacity(size);
        buf.resize(size, 0);
        Self(buf)
    }

    pub fn into_inner(self) -> BytesMut {
        self.0
    }
}

impl From<BytesMut> for RecvBuffer {
    fn from(buf: BytesMut) -> Self {
        Self(buf)
    }
}

impl Deref for RecvBuffer {
    type Target = BytesMut;

    fn deref(&self) -> &BytesMut {
        &self.0
    }
}

impl DerefMut for RecvBuffer {
    fn deref_mut(&mut self) -> &mut BytesMut {
        &mut self.0
    }
}

/// `trim` is the pool's buffer size. Buffers that were grown, split or came
/// from elsewhere are rejected; the rest get their full length back.
impl Reuse for RecvBuffer {
    fn reuse(&mut self, trim: usize) -> bool {
        if self.0.capacity() != trim {
            return false;
        }
        self.0.resize(trim, 0);
        true
    }

    fn capacity(&self) -> usize {
        self.0.capacity()
    }
}

impl Reuse for PacketHeader {
    fn reuse(&mut self, _trim: usize) -> bool {
        *self = PacketHeader::default();
        true
    }

    fn capacity(&self) -> usize {
        std::mem::size_of::<Self>()
    }
}

impl Reuse for Packet {
    fn reuse(&mut self, _trim: usize) -> bool {
        *self = Packet::default();
        true
    }

    fn capacity(&self) -> usize {
        std::mem::size_of::<Self>()
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Point-in-time counters for one pool.
///
/// Counts cover handles returned through `release`; a handle that is simply
/// dropped still goes back to the pool but is not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Objects created because the free list was empty
    pub allocated: u64,
    /// Acquisitions served from the free list
    pub reused: u64,
    /// Objects accepted back into the free list
    pub released: u64,
    /// Objects dropped on release (full pool or wrong capacity)
    pub discarded: u64,
    /// Objects currently idle in the free list
    pub idle: usize,
}

#[derive(Default)]
struct Counters {
    allocated: AtomicU64,
    reused: AtomicU64,
    released: AtomicU64,
    discarded: AtomicU64,
    idle: AtomicUsize,
}

impl Counters {
    /// Claim one idle slot. Returns false when the free list is empty.
    fn take_idle(&self) -> bool {
        self.idle
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Account for one release against a free list capped at `max`.
    fn settle_release(&self, max: usize) {
        let kept = self
            .idle
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                (n < max).then_some(n + 1)
            })
            .is_ok();
        if kept {
            self.released.fetch_add(1, Ordering::Relaxed);
        } else {
            self.discarded.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn snapshot(&self) -> PoolStats {
        PoolStats {
            allocated: self.allocated.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            idle: self.idle.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// Buffer Pool
// ============================================================================

type RecvBufferPool = Pool<1, RecvBuffer>;

/// Pool of fixed-capacity receive buffers.
pub struct BufferPool {
    pool: &'static RecvBufferPool,
    buffer_size: usize,
    max_retained: usize,
    counters: Counters,
}

impl BufferPool {
    pub fn new(buffer_size: usize, max_retained: usize) -> Self {
        let pool = RecvBufferPool::new(max_retained, buffer_size, "quicd_wire.buffers");
        Self {
            pool: Box::leak(Box::new(pool)),
            buffer_size,
            max_retained,
            counters: Counters::default(),
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Take a buffer whose length and capacity both equal `buffer_size`.
    ///
    /// Contents are unspecified; callers overwrite them with a receive.
    pub fn acquire(&self) -> Pooled<RecvBuffer> {
        let mut buf = self.pool.get();
        if buf.capacity() == self.buffer_size {
            self.counters.take_idle();
            self.counters.reused.fetch_add(1, Ordering::Relaxed);
        } else {
            *buf = RecvBuffer::zeroed(self.buffer_size);
            self.counters.allocated.fetch_add(1, Ordering::Relaxed);
        }
        buf
    }

    /// Return a buffer to the pool.
    ///
    /// Buffers whose capacity no longer equals `buffer_size` are dropped
    /// instead of pooled.
    pub fn release(&self, buf: Pooled<RecvBuffer>) {
        if buf.capacity() != self.buffer_size {
            trace!(
                capacity = buf.capacity(),
                expected = self.buffer_size,
                "dropping buffer with foreign capacity"
            );
            self.counters.discarded.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.counters.settle_release(self.max_retained);
    }

    /// Offer a buffer that did not come from this pool.
    pub fn release_owned(&self, buf: BytesMut) {
        self.release(self.pool.from_owned(RecvBuffer::from(buf)));
    }

    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot()
    }
}

// ============================================================================
// Object Pool
// ============================================================================

/// Pool of resettable objects.
pub struct ObjectPool<T: 'static> {
    pool: &'static Pool<1, T>,
    max_retained: usize,
    counters: Counters,
}

impl<T: Default + Reuse + 'static> ObjectPool<T> {
    pub fn new(max_retained: usize) -> Self {
        let pool = Pool::<1, T>::new(max_retained, 0, std::any::type_name::<T>());
        Self {
            pool: Box::leak(Box::new(pool)),
            max_retained,
            counters: Counters::default(),
        }
    }

    /// Take a zero-valued object.
    pub fn acquire(&self) -> Pooled<T> {
        let obj = self.pool.get();
        if self.counters.take_idle() {
            self.counters.reused.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.allocated.fetch_add(1, Ordering::Relaxed);
        }
        obj
    }

    /// Return an object; it is reset as the handle drops.
    pub fn release(&self, obj: Pooled<T>) {
        self.counters.settle_release(self.max_retained);
        drop(obj);
    }

    /// Reset and pool an object that did not come from this pool.
    pub fn release_owned(&self, obj: T) {
        self.release(self.pool.from_owned(obj));
    }

    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot()
    }
}

// ============================================================================
// Pool Bundle
// ============================================================================

/// Sizing for [`Pools`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub buffer_size: usize,
    pub max_retained_buffers: usize,
    pub max_retained_objects: usize,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_retained_buffers: DEFAULT_MAX_RETAINED,
            max_retained_objects: DEFAULT_MAX_RETAINED,
        }
    }
}

/// The three pools used on the decode path. Share through `Arc`.
pub struct Pools {
    pub buffers: BufferPool,
    pub headers: ObjectPool<PacketHeader>,
    pub packets: ObjectPool<Packet>,
}

impl Pools {
    pub fn new(settings: &PoolSettings) -> Self {
        Self {
            buffers: BufferPool::new(settings.buffer_size, settings.max_retained_buffers),
            headers: ObjectPool::new(settings.max_retained_objects),
            packets: ObjectPool::new(settings.max_retained_objects),
        }
    }
}

impl Default for Pools {
    fn default() -> Self {
        Self::new(&PoolSettings::default())
    }
}
