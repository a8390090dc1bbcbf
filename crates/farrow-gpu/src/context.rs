//! OpenCL device discovery and shared runtime handles.

use std::sync::{Arc, OnceLock};

use opencl3::command_queue::{CommandQueue, CL_QUEUE_PROFILING_ENABLE};
use opencl3::context::Context;
use opencl3::device::{Device, CL_DEVICE_TYPE_ALL, CL_DEVICE_TYPE_GPU};
use opencl3::platform::{get_platforms, Platform};
use opencl3::program::Program;
use tracing::{debug, info};

use farrow_profiling::SystemInfo;

use crate::error::{GpuError, Result};
use crate::program_cache::{hash_source, SourceCache};

/// Which devices [`ComputeContext::new`] will accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePreference {
    /// Prefer a GPU, fall back to any OpenCL device.
    #[default]
    PreferGpu,
    /// Accept GPUs only.
    GpuOnly,
}

/// An OpenCL platform + device + profiling command queue, with a cache of
/// compiled programs.
pub struct ComputeContext {
    platform: Platform,
    device: Device,
    context: Context,
    queue: CommandQueue,
    programs: SourceCache<Arc<Program>>,
    platform_name: String,
    device_name: String,
}

// SAFETY: OpenCL handles are thread-safe when used with proper
// synchronization. The CommandQueue serializes operations internally, and
// the program cache guards its map with a Mutex.
unsafe impl Send for ComputeContext {}
unsafe impl Sync for ComputeContext {}

impl std::fmt::Debug for ComputeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputeContext")
            .field("platform_name", &self.platform_name)
            .field("device_name", &self.device_name)
            .finish()
    }
}

static SHARED: OnceLock<Arc<ComputeContext>> = OnceLock::new();

impl ComputeContext {
    /// Enumerate platforms and open a context on the first matching device.
    pub fn new(preference: DevicePreference) -> Result<Self> {
        let platforms = get_platforms().map_err(|_| GpuError::NoPlatform)?;
        if platforms.is_empty() {
            return Err(GpuError::NoPlatform);
        }

        let (platform, device) = select_device(&platforms, preference)?;
        let platform_name = platform.name().unwrap_or_default();
        let device_name = device.name().unwrap_or_default();
        info!(platform = %platform_name, device = %device_name, "opening OpenCL context");

        let context = Context::from_device(&device)
            .map_err(|e| GpuError::Context(e.to_string()))?;
        let queue = CommandQueue::create_default_with_properties(
            &context,
            CL_QUEUE_PROFILING_ENABLE,
            0,
        )
        .map_err(|e| GpuError::Queue(e.to_string()))?;

        Ok(Self {
            platform,
            device,
            context,
            queue,
            programs: SourceCache::new(),
            platform_name,
            device_name,
        })
    }

    /// The process-wide shared context, created on first use with the
    /// default device preference.
    pub fn shared() -> Result<Arc<ComputeContext>> {
        Self::shared_with(DevicePreference::default())
    }

    /// The process-wide shared context, created on first use.
    ///
    /// `preference` only matters for the call that performs the first
    /// initialization; later calls return the existing context. Concurrent
    /// first calls may each open a context; the first to finish wins and
    /// the rest are dropped.
    pub fn shared_with(preference: DevicePreference) -> Result<Arc<ComputeContext>> {
        if let Some(ctx) = SHARED.get() {
            return Ok(Arc::clone(ctx));
        }
        let ctx = Arc::new(Self::new(preference)?);
        Ok(Arc::clone(SHARED.get_or_init(|| ctx)))
    }

    /// Compile `source`, or return the cached program for identical source.
    pub fn get_or_compile_program(&self, source: &str) -> Result<Arc<Program>> {
        let key = hash_source(source);
        self.programs.get_or_insert_with(key, || {
            debug!(key, "compiling OpenCL program");
            Program::create_and_build_from_source(&self.context, source, "")
                .map(Arc::new)
                .map_err(|log| GpuError::BuildFailed { log })
        })
    }

    pub fn cached_program_count(&self) -> usize {
        self.programs.len()
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn platform_name(&self) -> &str {
        &self.platform_name
    }

    pub fn device_memory_bytes(&self) -> u64 {
        self.device.global_mem_size().unwrap_or(0)
    }

    pub fn max_work_group_size(&self) -> usize {
        self.device.max_work_group_size().unwrap_or(1)
    }

    /// Snapshot device and platform details for reports.
    pub fn system_info(&self) -> SystemInfo {
        SystemInfo {
            device_name: self.device_name.clone(),
            device_vendor: self.device.vendor().unwrap_or_default(),
            device_version: self.device.version().unwrap_or_default(),
            driver_version: self.device.driver_version().unwrap_or_default(),
            platform_name: self.platform_name.clone(),
            platform_version: self.platform.version().unwrap_or_default(),
            device_memory_mb: self.device_memory_bytes() / (1024 * 1024),
            max_work_group_size: self.max_work_group_size(),
            compute_units: self.device.max_compute_units().unwrap_or(0),
            os_name: String::new(),
        }
        .with_host_os()
    }
}

fn select_device(
    platforms: &[Platform],
    preference: DevicePreference,
) -> Result<(Platform, Device)> {
    for platform in platforms {
        let name = platform.name().unwrap_or_default();
        debug!(platform = %name, "checking OpenCL platform for GPU devices");
        if let Some(id) = platform
            .get_devices(CL_DEVICE_TYPE_GPU)
            .unwrap_or_default()
            .into_iter()
            .next()
        {
            return Ok((*platform, Device::new(id)));
        }
    }

    if preference == DevicePreference::PreferGpu {
        for platform in platforms {
            if let Some(id) = platform
                .get_devices(CL_DEVICE_TYPE_ALL)
                .unwrap_or_default()
                .into_iter()
                .next()
            {
                let device = Device::new(id);
                debug!(device = %device.name().unwrap_or_default(), "no GPU found, falling back");
                return Ok((*platform, device));
            }
        }
    }

    Err(GpuError::NoDevice)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_platforms_means_no_device_for_either_preference() {
        for preference in [DevicePreference::PreferGpu, DevicePreference::GpuOnly] {
            assert!(matches!(select_device(&[], preference), Err(GpuError::NoDevice)));
        }
    }

    #[test]
    fn default_preference_allows_fallback() {
        assert_eq!(DevicePreference::default(), DevicePreference::PreferGpu);
    }
}
