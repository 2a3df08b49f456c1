//! Resource guard - accelerator admission control
//!
//! Preflight runs before any checkpoint is read. Scene admission runs after
//! the scene is parsed and before it is handed to the render loop; an
//! admitted scene keeps its bytes reserved until the session drops it.

use std::sync::Arc;

use sysinfo::System;
use tracing::{debug, info, warn};

use aria_core::{Accelerator, AriaError, AriaResult, DeviceInfo, MemoryPool, Reservation};

use crate::config::EngineConfig;

pub struct ResourceGuard {
    accelerator: Arc<dyn Accelerator>,
    min_memory: u64,
    safety_fraction: f64,
}

impl ResourceGuard {
    pub fn new(accelerator: Arc<dyn Accelerator>, config: &EngineConfig) -> Self {
        Self::with_limits(accelerator, config.min_gpu_memory_bytes(), config.memory_safety_fraction)
    }

    pub fn with_limits(accelerator: Arc<dyn Accelerator>, min_memory: u64, safety_fraction: f64) -> Self {
        Self {
            accelerator,
            min_memory,
            safety_fraction,
        }
    }

    pub fn accelerator(&self) -> &Arc<dyn Accelerator> {
        &self.accelerator
    }

    /// Verify a device is present and meets the memory floor
    pub fn check_available(&self) -> AriaResult<DeviceInfo> {
        let info = self
            .accelerator
            .info()
            .ok_or_else(|| AriaError::GpuNotFound("no accelerator device present".into()))?;

        if info.total_memory < self.min_memory {
            warn!(
                device = %info.name,
                total_memory = info.total_memory,
                required = self.min_memory,
                "Accelerator below memory floor"
            );
            return Err(AriaError::GpuMemory {
                required: self.min_memory,
                available: info.total_memory,
            });
        }

        debug!(device = %info.name, total_memory = info.total_memory, "Accelerator preflight passed");
        Ok(info)
    }

    /// Largest scene footprint admitted on a device with `total_memory` bytes
    pub fn scene_budget(&self, total_memory: u64) -> u64 {
        (self.safety_fraction * total_memory as f64).floor() as u64
    }

    /// Admit a scene of `footprint` bytes and reserve its memory
    pub fn admit_scene(&self, footprint: u64) -> AriaResult<Reservation> {
        let info = self.check_available()?;
        let budget = self.scene_budget(info.total_memory);
        if footprint > budget {
            return Err(AriaError::GpuMemory {
                required: footprint,
                available: budget,
            });
        }

        let reservation = self.accelerator.memory().reserve(footprint)?;
        info!(
            device = %info.name,
            footprint,
            budget,
            "Scene admitted"
        );
        Ok(reservation)
    }

    /// Best-effort release of cached device memory
    pub fn release(&self) {
        self.accelerator.release_cached();
    }
}

/// Host CPU used as the compute device, sized by total system memory
pub struct HostAccelerator {
    info: Option<DeviceInfo>,
    pool: Arc<MemoryPool>,
}

impl HostAccelerator {
    pub fn detect() -> Self {
        let mut system = System::new();
        system.refresh_memory();
        let total = system.total_memory();

        let info = (total > 0).then(|| DeviceInfo {
            name: format!("host-cpu ({} threads)", host_threads()),
            total_memory: total,
        });
        Self {
            info,
            pool: MemoryPool::new(total),
        }
    }
}

fn host_threads() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

impl Accelerator for HostAccelerator {
    fn info(&self) -> Option<DeviceInfo> {
        self.info.clone()
    }

    fn memory(&self) -> Arc<MemoryPool> {
        Arc::clone(&self.pool)
    }

    fn release_cached(&self) {
        debug!(used = self.pool.used(), "Host accelerator has no cache to release");
    }
}
