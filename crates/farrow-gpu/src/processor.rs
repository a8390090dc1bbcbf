//! High-level device-side fractional delay over host signal buffers.

use tracing::debug;

use farrow_delay::DelayParams;
use farrow_profiling::{GpuEventMetrics, ProfilingEngine, SystemInfo};
use farrow_signal::{CoefficientTable, SignalBuffer};

use crate::backend::{create_backend, GpuBackend};
use crate::context::DevicePreference;
use crate::error::{GpuError, Result};

/// Runs the fractional-delay kernel against whole [`SignalBuffer`]s,
/// handling allocation and transfers.
pub struct FractionalDelayProcessor {
    backend: Box<dyn GpuBackend>,
    table_uploaded: bool,
}

impl FractionalDelayProcessor {
    /// Open the default backend and upload the analytic coefficient table.
    pub fn new() -> Result<Self> {
        Self::with_table(&CoefficientTable::generate())
    }

    /// Open the default backend and upload a caller-provided table.
    pub fn with_table(table: &CoefficientTable) -> Result<Self> {
        Self::with_table_on(table, DevicePreference::default())
    }

    /// As [`Self::with_table`], restricting which devices are acceptable.
    pub fn with_table_on(
        table: &CoefficientTable,
        preference: DevicePreference,
    ) -> Result<Self> {
        let mut processor =
            Self { backend: create_backend(preference)?, table_uploaded: false };
        processor.upload_table(table)?;
        Ok(processor)
    }

    /// Wrap an already-initialized backend. No table is uploaded.
    pub fn with_backend(backend: Box<dyn GpuBackend>) -> Self {
        Self { backend, table_uploaded: false }
    }

    pub fn upload_table(&mut self, table: &CoefficientTable) -> Result<()> {
        self.backend.upload_coefficient_table(table)?;
        self.table_uploaded = true;
        Ok(())
    }

    pub fn device_name(&self) -> String {
        self.backend.device_name()
    }

    pub fn system_info(&self) -> Result<SystemInfo> {
        self.backend.system_info()
    }

    /// Apply per-beam delays in place on the device.
    pub fn process(&mut self, buffer: &mut SignalBuffer, delays: &[f32]) -> Result<()> {
        let params = self.check_inputs(buffer, delays)?;
        let (num_beams, num_samples) = (buffer.num_beams(), buffer.num_samples());

        let mut device = self.backend.allocate_signal_buffer(buffer.len())?;
        self.backend.copy_host_to_device(&mut device, buffer.as_slice())?;
        self.backend
            .execute_fractional_delay(&mut device, &params, num_beams, num_samples)?;
        self.backend.copy_device_to_host(&device, buffer.as_mut_slice())?;
        Ok(())
    }

    /// As [`Self::process`], recording transfer and kernel timings.
    ///
    /// Records the events into `engine` under `h2d_transfer`,
    /// `fractional_delay_kernel` and `d2h_transfer`, and returns them in
    /// that order.
    pub fn process_profiled(
        &mut self,
        buffer: &mut SignalBuffer,
        delays: &[f32],
        engine: &mut ProfilingEngine,
    ) -> Result<Vec<GpuEventMetrics>> {
        let params = self.check_inputs(buffer, delays)?;
        let (num_beams, num_samples) = (buffer.num_beams(), buffer.num_samples());
        debug!(beams = num_beams, samples = num_samples, "profiled device run");

        engine.start_timer("gpu_total");
        let mut device = self.backend.allocate_signal_buffer(buffer.len())?;

        let h2d = self.backend.copy_host_to_device_profiled(
            &mut device,
            buffer.as_slice(),
            "h2d_transfer",
        )?;
        let kernel = self.backend.execute_fractional_delay_profiled(
            &mut device,
            &params,
            num_beams,
            num_samples,
            "fractional_delay_kernel",
        )?;
        let d2h = self.backend.copy_device_to_host_profiled(
            &device,
            buffer.as_mut_slice(),
            "d2h_transfer",
        )?;
        engine.stop_timer("gpu_total");

        let events = vec![h2d, kernel, d2h];
        for event in &events {
            engine.record_gpu_event_metrics(event);
        }
        Ok(events)
    }

    fn check_inputs(&self, buffer: &SignalBuffer, delays: &[f32]) -> Result<Vec<DelayParams>> {
        if !self.table_uploaded {
            return Err(GpuError::TableNotUploaded);
        }
        if !buffer.is_valid() {
            return Err(GpuError::InvalidInput(format!(
                "signal buffer dimensions out of range: {} beams x {} samples",
                buffer.num_beams(),
                buffer.num_samples()
            )));
        }
        if delays.len() != buffer.num_beams() {
            return Err(GpuError::InvalidInput(format!(
                "{} delays for {} beams",
                delays.len(),
                buffer.num_beams()
            )));
        }
        Ok(DelayParams::from_delays(delays))
    }
}
