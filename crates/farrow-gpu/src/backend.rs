//! Device backend abstraction.
//!
//! [`GpuBackend`] is the seam between the processing chain and a concrete
//! device API. Only OpenCL is implemented; the trait keeps the processor and
//! tests independent of it.

use farrow_delay::DelayParams;
use farrow_profiling::{GpuEventMetrics, SystemInfo};
use farrow_signal::{CoefficientTable, Sample};

use crate::context::DevicePreference;
use crate::error::Result;
use crate::opencl::OpenClBackend;

/// Owned device memory for interleaved complex samples.
///
/// Dropping the guard releases the device allocation.
pub struct DeviceBuffer {
    pub(crate) inner: DeviceBufferInner,
    pub(crate) len_floats: usize,
}

pub(crate) enum DeviceBufferInner {
    OpenCl(opencl3::memory::Buffer<f32>),
}

impl DeviceBuffer {
    /// Capacity in complex samples.
    pub fn len_complex(&self) -> usize {
        self.len_floats / 2
    }

    pub fn size_bytes(&self) -> usize {
        self.len_floats * std::mem::size_of::<f32>()
    }
}

impl std::fmt::Debug for DeviceBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("len_complex", &self.len_complex())
            .field("size_bytes", &self.size_bytes())
            .finish()
    }
}

/// A device execution path for the fractional-delay kernel.
///
/// Profiled variants perform the same operation and additionally return the
/// four-way timing breakdown of the device event; they block until the
/// operation completes so the metrics are final when they return.
pub trait GpuBackend {
    fn initialize(&mut self) -> Result<()>;
    fn is_initialized(&self) -> bool;

    fn backend_name(&self) -> &'static str;
    fn device_name(&self) -> String;
    fn device_memory_bytes(&self) -> u64;
    fn system_info(&self) -> Result<SystemInfo>;

    fn allocate_signal_buffer(&self, num_complex: usize) -> Result<DeviceBuffer>;

    fn copy_host_to_device(&self, dst: &mut DeviceBuffer, src: &[Sample]) -> Result<()>;
    fn copy_host_to_device_profiled(
        &self,
        dst: &mut DeviceBuffer,
        src: &[Sample],
        name: &str,
    ) -> Result<GpuEventMetrics>;

    fn copy_device_to_host(&self, src: &DeviceBuffer, dst: &mut [Sample]) -> Result<()>;
    fn copy_device_to_host_profiled(
        &self,
        src: &DeviceBuffer,
        dst: &mut [Sample],
        name: &str,
    ) -> Result<GpuEventMetrics>;

    /// Upload the 48×5 interpolation table. Must happen before execution.
    fn upload_coefficient_table(&mut self, table: &CoefficientTable) -> Result<()>;

    /// Run the fractional-delay kernel in place over `signal`.
    fn execute_fractional_delay(
        &mut self,
        signal: &mut DeviceBuffer,
        params: &[DelayParams],
        num_beams: usize,
        num_samples: usize,
    ) -> Result<()>;

    fn execute_fractional_delay_profiled(
        &mut self,
        signal: &mut DeviceBuffer,
        params: &[DelayParams],
        num_beams: usize,
        num_samples: usize,
        name: &str,
    ) -> Result<GpuEventMetrics>;
}

/// Open the default backend, initialized and ready for uploads.
pub fn create_backend(preference: DevicePreference) -> Result<Box<dyn GpuBackend>> {
    let mut backend = OpenClBackend::with_preference(preference);
    backend.initialize()?;
    Ok(Box::new(backend))
}
