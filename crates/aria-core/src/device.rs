//! Accelerator abstraction and memory accounting
//!
//! Every byte the pipeline keeps resident on the compute device (the loaded
//! splat scene, per-frame raster buffers) is reserved from a [`MemoryPool`].
//! Reservations are released when dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{AriaError, AriaResult};

/// Static description of a compute device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    /// Total device memory in bytes
    pub total_memory: u64,
}

/// A compute device the pipeline renders on
pub trait Accelerator: Send + Sync {
    /// Device description, `None` when no device is present
    fn info(&self) -> Option<DeviceInfo>;

    /// Memory pool backing reservations on this device
    fn memory(&self) -> Arc<MemoryPool>;

    /// Drop cached allocations held on behalf of the pipeline
    fn release_cached(&self);
}

#[derive(Debug, Default)]
struct PoolUsage {
    used: u64,
    peak: u64,
}

/// Byte-level accounting of device memory
#[derive(Debug)]
pub struct MemoryPool {
    capacity: u64,
    usage: Mutex<PoolUsage>,
}

impl MemoryPool {
    pub fn new(capacity: u64) -> Arc<Self> {
        Arc::new(MemoryPool {
            capacity,
            usage: Mutex::new(PoolUsage::default()),
        })
    }

    /// Reserve `bytes`, failing with `GpuMemory` when the pool cannot fit them
    pub fn reserve(self: &Arc<Self>, bytes: u64) -> AriaResult<Reservation> {
        let mut usage = self.usage.lock();
        let available = self.capacity.saturating_sub(usage.used);
        if bytes > available {
            return Err(AriaError::GpuMemory {
                required: bytes,
                available,
            });
        }
        usage.used += bytes;
        usage.peak = usage.peak.max(usage.used);
        Ok(Reservation {
            pool: Arc::clone(self),
            bytes,
        })
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn used(&self) -> u64 {
        self.usage.lock().used
    }

    pub fn available(&self) -> u64 {
        self.capacity.saturating_sub(self.used())
    }

    pub fn peak(&self) -> u64 {
        self.usage.lock().peak
    }

    fn release(&self, bytes: u64) {
        let mut usage = self.usage.lock();
        usage.used = usage.used.saturating_sub(bytes);
    }
}

/// RAII handle for reserved device memory
#[derive(Debug)]
pub struct Reservation {
    pool: Arc<MemoryPool>,
    bytes: u64,
}

impl Reservation {
    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.pool.release(self.bytes);
    }
}

/// Accelerator with a fixed, configured memory size.
///
/// Used for headless deployments and tests. `usable` may be smaller than
/// the reported total to model memory already taken by other processes.
pub struct SimulatedAccelerator {
    info: Option<DeviceInfo>,
    pool: Arc<MemoryPool>,
    releases: AtomicU64,
}

impl SimulatedAccelerator {
    pub fn new(name: &str, total_memory: u64) -> Self {
        Self::with_usable(name, total_memory, total_memory)
    }

    pub fn with_usable(name: &str, total_memory: u64, usable: u64) -> Self {
        SimulatedAccelerator {
            info: Some(DeviceInfo {
                name: name.to_string(),
                total_memory,
            }),
            pool: MemoryPool::new(usable.min(total_memory)),
            releases: AtomicU64::new(0),
        }
    }

    /// No device present
    pub fn absent() -> Self {
        SimulatedAccelerator {
            info: None,
            pool: MemoryPool::new(0),
            releases: AtomicU64::new(0),
        }
    }

    /// Number of times `release_cached` was invoked
    pub fn release_count(&self) -> u64 {
        self.releases.load(Ordering::Relaxed)
    }
}

impl Accelerator for SimulatedAccelerator {
    fn info(&self) -> Option<DeviceInfo> {
        self.info.clone()
    }

    fn memory(&self) -> Arc<MemoryPool> {
        Arc::clone(&self.pool)
    }

    fn release_cached(&self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
    }
}
