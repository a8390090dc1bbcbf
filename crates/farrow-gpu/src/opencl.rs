//! OpenCL implementation of [`GpuBackend`].

use std::ptr;
use std::sync::Arc;

use opencl3::event::Event;
use opencl3::kernel::{ExecuteKernel, Kernel};
use opencl3::memory::{Buffer, ClMem, CL_MEM_READ_ONLY, CL_MEM_READ_WRITE};
use opencl3::types::CL_BLOCKING;
use tracing::{debug, warn};

use farrow_delay::DelayParams;
use farrow_profiling::{EventTimestamps, GpuEventMetrics, SystemInfo};
use farrow_signal::{CoefficientTable, Sample};

use crate::backend::{DeviceBuffer, DeviceBufferInner, GpuBackend};
use crate::context::{ComputeContext, DevicePreference};
use crate::error::{GpuError, Result};

/// Source of the fractional-delay kernel, compiled at first use.
pub const FRACTIONAL_DELAY_SRC: &str = include_str!("kernels/fractional_delay.cl");

const KERNEL_NAME: &str = "fractional_delay";
const PREFERRED_WORK_GROUP_SIZE: usize = 256;

/// OpenCL execution path. Created empty; [`GpuBackend::initialize`] opens
/// the shared context and compiles the kernel.
pub struct OpenClBackend {
    preference: DevicePreference,
    context: Option<Arc<ComputeContext>>,
    kernel: Option<Kernel>,
    table: Option<Buffer<f32>>,
    // Kernel output lands here, then is copied back over the signal buffer,
    // so the in-place contract holds without the kernel reading samples a
    // neighboring work item already overwrote.
    scratch: Option<(Buffer<f32>, usize)>,
}

impl Default for OpenClBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenClBackend {
    pub fn new() -> Self {
        Self::with_preference(DevicePreference::default())
    }

    /// Choose which devices initialization will accept. The preference is
    /// decisive only if this backend performs the first initialization of
    /// the process-wide context.
    pub fn with_preference(preference: DevicePreference) -> Self {
        Self { preference, context: None, kernel: None, table: None, scratch: None }
    }

    fn ctx(&self) -> Result<&Arc<ComputeContext>> {
        self.context.as_ref().ok_or(GpuError::NotInitialized)
    }

    fn create_float_buffer(&self, len_floats: usize, flags: u64) -> Result<Buffer<f32>> {
        let ctx = self.ctx()?;
        unsafe {
            Buffer::<f32>::create(ctx.context(), flags, len_floats, ptr::null_mut())
        }
        .map_err(|e| GpuError::Allocation {
            size_bytes: len_floats * std::mem::size_of::<f32>(),
            reason: e.to_string(),
        })
    }

    /// Reuse or grow the scratch output buffer to at least `len_floats`.
    fn scratch_for(&mut self, len_floats: usize) -> Result<()> {
        if matches!(self.scratch, Some((_, len)) if len >= len_floats) {
            return Ok(());
        }
        let buffer = self.create_float_buffer(len_floats, CL_MEM_READ_WRITE)?;
        self.scratch = Some((buffer, len_floats));
        Ok(())
    }

    fn write_floats(&self, dst: &mut Buffer<f32>, src: &[f32]) -> Result<Event> {
        let ctx = self.ctx()?;
        unsafe { ctx.queue().enqueue_write_buffer(dst, CL_BLOCKING, 0, src, &[]) }
            .map_err(|e| GpuError::Transfer(e.to_string()))
    }
}

fn check_transfer_len(buffer: &DeviceBuffer, host_len_complex: usize) -> Result<()> {
    if buffer.len_complex() != host_len_complex {
        return Err(GpuError::InvalidInput(format!(
            "device buffer holds {} complex samples, host slice has {}",
            buffer.len_complex(),
            host_len_complex
        )));
    }
    Ok(())
}

fn event_metrics(name: &str, event: &Event) -> Result<GpuEventMetrics> {
    let ts = EventTimestamps {
        queued: event
            .profiling_command_queued()
            .map_err(|e| GpuError::Dispatch(e.to_string()))?,
        submitted: event
            .profiling_command_submit()
            .map_err(|e| GpuError::Dispatch(e.to_string()))?,
        started: event
            .profiling_command_start()
            .map_err(|e| GpuError::Dispatch(e.to_string()))?,
        ended: event
            .profiling_command_end()
            .map_err(|e| GpuError::Dispatch(e.to_string()))?,
    };
    Ok(GpuEventMetrics::from_timestamps(name, ts))
}

impl GpuBackend for OpenClBackend {
    fn initialize(&mut self) -> Result<()> {
        if self.context.is_some() {
            warn!("OpenCL backend already initialized");
            return Ok(());
        }
        let ctx = ComputeContext::shared_with(self.preference)?;
        let program = ctx.get_or_compile_program(FRACTIONAL_DELAY_SRC)?;
        let kernel = Kernel::create(&program, KERNEL_NAME).map_err(|e| {
            GpuError::KernelCreate { name: KERNEL_NAME.into(), reason: e.to_string() }
        })?;
        debug!(device = %ctx.device_name(), "OpenCL backend ready");
        self.context = Some(ctx);
        self.kernel = Some(kernel);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.context.is_some() && self.kernel.is_some()
    }

    fn backend_name(&self) -> &'static str {
        "opencl"
    }

    fn device_name(&self) -> String {
        self.context
            .as_ref()
            .map(|c| c.device_name().to_string())
            .unwrap_or_default()
    }

    fn device_memory_bytes(&self) -> u64 {
        self.context.as_ref().map_or(0, |c| c.device_memory_bytes())
    }

    fn system_info(&self) -> Result<SystemInfo> {
        Ok(self.ctx()?.system_info())
    }

    fn allocate_signal_buffer(&self, num_complex: usize) -> Result<DeviceBuffer> {
        let len_floats = num_complex * 2;
        let buffer = self.create_float_buffer(len_floats, CL_MEM_READ_WRITE)?;
        Ok(DeviceBuffer { inner: DeviceBufferInner::OpenCl(buffer), len_floats })
    }

    fn copy_host_to_device(&self, dst: &mut DeviceBuffer, src: &[Sample]) -> Result<()> {
        check_transfer_len(dst, src.len())?;
        let DeviceBufferInner::OpenCl(buffer) = &mut dst.inner;
        self.write_floats(buffer, bytemuck::cast_slice(src))?;
        Ok(())
    }

    fn copy_host_to_device_profiled(
        &self,
        dst: &mut DeviceBuffer,
        src: &[Sample],
        name: &str,
    ) -> Result<GpuEventMetrics> {
        check_transfer_len(dst, src.len())?;
        let DeviceBufferInner::OpenCl(buffer) = &mut dst.inner;
        let event = self.write_floats(buffer, bytemuck::cast_slice(src))?;
        event_metrics(name, &event)
    }

    fn copy_device_to_host(&self, src: &DeviceBuffer, dst: &mut [Sample]) -> Result<()> {
        check_transfer_len(src, dst.len())?;
        let ctx = self.ctx()?;
        let DeviceBufferInner::OpenCl(buffer) = &src.inner;
        unsafe {
            ctx.queue().enqueue_read_buffer(
                buffer,
                CL_BLOCKING,
                0,
                bytemuck::cast_slice_mut(dst),
                &[],
            )
        }
        .map_err(|e| GpuError::Transfer(e.to_string()))?;
        Ok(())
    }

    fn copy_device_to_host_profiled(
        &self,
        src: &DeviceBuffer,
        dst: &mut [Sample],
        name: &str,
    ) -> Result<GpuEventMetrics> {
        check_transfer_len(src, dst.len())?;
        let ctx = self.ctx()?;
        let DeviceBufferInner::OpenCl(buffer) = &src.inner;
        let event = unsafe {
            ctx.queue().enqueue_read_buffer(
                buffer,
                CL_BLOCKING,
                0,
                bytemuck::cast_slice_mut(dst),
                &[],
            )
        }
        .map_err(|e| GpuError::Transfer(e.to_string()))?;
        event_metrics(name, &event)
    }

    fn upload_coefficient_table(&mut self, table: &CoefficientTable) -> Result<()> {
        let mut buffer =
            self.create_float_buffer(table.as_slice().len(), CL_MEM_READ_ONLY)?;
        self.write_floats(&mut buffer, table.as_slice())?;
        self.table = Some(buffer);
        Ok(())
    }

    fn execute_fractional_delay(
        &mut self,
        signal: &mut DeviceBuffer,
        params: &[DelayParams],
        num_beams: usize,
        num_samples: usize,
    ) -> Result<()> {
        let event = self.dispatch(signal, params, num_beams, num_samples)?;
        event.wait().map_err(|e| GpuError::Dispatch(e.to_string()))?;
        Ok(())
    }

    fn execute_fractional_delay_profiled(
        &mut self,
        signal: &mut DeviceBuffer,
        params: &[DelayParams],
        num_beams: usize,
        num_samples: usize,
        name: &str,
    ) -> Result<GpuEventMetrics> {
        let event = self.dispatch(signal, params, num_beams, num_samples)?;
        event.wait().map_err(|e| GpuError::Dispatch(e.to_string()))?;
        event_metrics(name, &event)
    }
}

impl OpenClBackend {
    /// Enqueue the kernel and the copy back over the signal buffer.
    ///
    /// Returns the kernel event; the copy-back is ordered behind it on the
    /// in-order queue, and the returned event's wait covers the dispatch.
    fn dispatch(
        &mut self,
        signal: &mut DeviceBuffer,
        params: &[DelayParams],
        num_beams: usize,
        num_samples: usize,
    ) -> Result<Event> {
        if params.len() != num_beams {
            return Err(GpuError::InvalidInput(format!(
                "{} delay parameter pairs for {} beams",
                params.len(),
                num_beams
            )));
        }
        let total = num_beams * num_samples;
        check_transfer_len(signal, total)?;

        let len_floats = signal.len_floats;
        self.scratch_for(len_floats)?;

        let ctx = Arc::clone(self.ctx()?);
        let table = self.table.as_ref().ok_or(GpuError::TableNotUploaded)?;

        // Per-beam (delay_integer, lagrange_row) pairs, read as int2.
        let mut param_buffer = unsafe {
            Buffer::<i32>::create(
                ctx.context(),
                CL_MEM_READ_ONLY,
                params.len() * 2,
                ptr::null_mut(),
            )
        }
        .map_err(|e| GpuError::Allocation {
            size_bytes: params.len() * 8,
            reason: e.to_string(),
        })?;
        unsafe {
            ctx.queue().enqueue_write_buffer(
                &mut param_buffer,
                CL_BLOCKING,
                0,
                bytemuck::cast_slice(params),
                &[],
            )
        }
        .map_err(|e| GpuError::Transfer(e.to_string()))?;

        let kernel = self.kernel.as_ref().ok_or(GpuError::NotInitialized)?;
        let DeviceBufferInner::OpenCl(signal_buffer) = &mut signal.inner;
        let (scratch, _) = self
            .scratch
            .as_mut()
            .ok_or_else(|| GpuError::Dispatch("scratch buffer missing".into()))?;

        let local = PREFERRED_WORK_GROUP_SIZE.min(ctx.max_work_group_size()).max(1);
        let global = total.div_ceil(local) * local;
        let num_beams_u32 = num_beams as u32;
        let num_samples_u32 = num_samples as u32;

        let kernel_event = unsafe {
            ExecuteKernel::new(kernel)
                .set_arg(&signal_buffer.get())
                .set_arg(&scratch.get())
                .set_arg(&param_buffer.get())
                .set_arg(&table.get())
                .set_arg(&num_beams_u32)
                .set_arg(&num_samples_u32)
                .set_global_work_size(global)
                .set_local_work_size(local)
                .enqueue_nd_range(ctx.queue())
        }
        .map_err(|e| GpuError::Dispatch(e.to_string()))?;

        let copy_event = unsafe {
            ctx.queue().enqueue_copy_buffer(
                scratch,
                signal_buffer,
                0,
                0,
                len_floats * std::mem::size_of::<f32>(),
                &[],
            )
        }
        .map_err(|e| GpuError::Transfer(e.to_string()))?;
        copy_event.wait().map_err(|e| GpuError::Transfer(e.to_string()))?;

        Ok(kernel_event)
    }
}
