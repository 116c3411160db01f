//! Object pool for frame buffers and envelope values.
//!
//! Pools are plain values owned by whoever constructs the server or client
//! and shared through an `Arc`; there is no process-wide pool. Ownership is
//! explicit: [`Pool::acquire`] hands out an object that no other caller can
//! receive until it comes back through [`Pool::release`].

use object_pool::Pool as ObjectPool;
use tracing::trace;

/// Largest retained size a released object may have and still be pooled.
pub const DEFAULT_MAX_RETAINED_BYTES: usize = 64 * 1024;

/// Upper bound on idle objects kept per pool.
pub const DEFAULT_MAX_IDLE: usize = 1024;

/// A value that can be recycled through a [`Pool`].
pub trait Poolable: Default {
    /// Return the value to its empty state. Contents left by a previous
    /// holder must never be visible to the next one.
    fn reset(&mut self);

    /// Heap bytes this value keeps alive while pooled.
    fn retained_bytes(&self) -> usize {
        0
    }
}

impl Poolable for Vec<u8> {
    fn reset(&mut self) {
        self.clear();
    }

    fn retained_bytes(&self) -> usize {
        self.capacity()
    }
}

/// Retention policy for a [`Pool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum number of idle objects kept. Extra releases are dropped.
    pub max_idle: usize,
    /// Objects retaining more heap than this are dropped on release so one
    /// outlier cannot inflate steady-state memory.
    pub max_retained_bytes: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle: DEFAULT_MAX_IDLE,
            max_retained_bytes: DEFAULT_MAX_RETAINED_BYTES,
        }
    }
}

/// Thread-safe pool of reusable `T`.
pub struct Pool<T: Poolable> {
    inner: ObjectPool<T>,
    config: PoolConfig,
}

impl<T: Poolable> Pool<T> {
    /// Create an empty pool with default retention policy.
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    /// Create an empty pool with explicit retention policy.
    pub fn with_config(config: PoolConfig) -> Self {
        Self {
            inner: ObjectPool::new(0, T::default),
            config,
        }
    }

    /// Take an object out of the pool, allocating a fresh one on a miss.
    pub fn acquire(&self) -> T {
        match self.inner.try_pull() {
            Some(reusable) => reusable.detach().1,
            None => T::default(),
        }
    }

    /// Reset `value` and return it to the pool, or drop it if the retention
    /// policy rejects it.
    pub fn release(&self, mut value: T) {
        value.reset();

        let retained = value.retained_bytes();
        if retained > self.config.max_retained_bytes {
            trace!(retained, max = self.config.max_retained_bytes, "dropping oversized pooled object");
            return;
        }
        if self.inner.len() >= self.config.max_idle {
            return;
        }
        self.inner.attach(value);
    }

    /// Number of idle objects currently held.
    pub fn idle(&self) -> usize {
        self.inner.len()
    }

    /// Retention policy in effect.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}

impl<T: Poolable> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Poolable> std::fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("idle", &self.idle())
            .field("config", &self.config)
            .finish()
    }
}

/// Pool of byte buffers (frame read windows, encode scratch space).
pub type BufferPool = Pool<Vec<u8>>;
