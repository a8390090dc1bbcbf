//! `farrow` — fractional-delay processing driver.
//!
//! Generates (or loads) a multi-beam chirp, applies per-beam fractional
//! delays on the CPU reference path and on the OpenCL device path, compares
//! the two element by element, and writes profiling reports.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::RunConfig;
use farrow_delay::apply_fractional_delay;
use farrow_gpu::{DevicePreference, FractionalDelayProcessor};
use farrow_profiling::{ProfilingEngine, ProfilingReport, SystemInfo};
use farrow_signal::{ChirpGenerator, ChirpVariant, CoefficientTable, SignalBuffer};
use farrow_validate::compare_buffers;

#[derive(Parser)]
#[command(name = "farrow")]
#[command(about = "Multi-beam fractional-delay processing with CPU/GPU validation")]
#[command(version)]
struct Cli {
    /// Log level filter (e.g. info, debug, farrow_gpu=trace)
    #[arg(long, value_name = "FILTER", global = true, default_value = "info")]
    log: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the processing chain and validate GPU against CPU
    Run(RunArgs),
    /// Show the OpenCL device that would be used
    Info,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Variant {
    /// Identical chirp on every beam
    Basic,
    /// Constant phase offset per beam
    PhaseOffset,
    /// Integer sample delay per beam
    Delay,
    /// Phase shift from the steering angle
    Beamforming,
    /// Hamming-windowed chirp
    Windowed,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DeviceArg {
    /// Prefer a GPU, fall back to any OpenCL device
    Auto,
    /// Require a GPU device
    Gpu,
}

impl DeviceArg {
    fn preference(self) -> DevicePreference {
        match self {
            DeviceArg::Auto => DevicePreference::PreferGpu,
            DeviceArg::Gpu => DevicePreference::GpuOnly,
        }
    }
}

#[derive(Parser)]
struct RunArgs {
    /// JSON config file; flags below override it
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "N")]
    beams: Option<usize>,

    #[arg(long, value_name = "SECONDS")]
    duration: Option<f32>,

    #[arg(long, value_name = "HZ")]
    sample_rate: Option<f32>,

    #[arg(long, value_name = "HZ")]
    f_start: Option<f32>,

    #[arg(long, value_name = "HZ")]
    f_stop: Option<f32>,

    /// Comparison tolerance on per-sample magnitude difference
    #[arg(long, value_name = "EPS")]
    tolerance: Option<f32>,

    /// Per-beam delay ramp step in samples (beam b gets b * STEP)
    #[arg(long, value_name = "STEP")]
    delay_step: Option<f32>,

    /// Chirp variant to generate
    #[arg(long, value_enum, default_value_t = Variant::Basic)]
    variant: Variant,

    /// Per-beam step for the phase-offset (radians) and delay (samples)
    /// variants
    #[arg(long, value_name = "STEP", default_value_t = 0.1)]
    variant_step: f32,

    /// Binary signal file to process instead of a generated chirp
    #[arg(long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Write the CPU-processed buffer here
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// JSON coefficient table (analytic table when omitted)
    #[arg(long, value_name = "PATH")]
    coefficients: Option<PathBuf>,

    /// Directory for profiling reports (report.json, report.md)
    #[arg(long, value_name = "DIR")]
    report_dir: Option<PathBuf>,

    /// Which OpenCL devices are acceptable
    #[arg(long, value_enum, default_value_t = DeviceArg::Auto)]
    device: DeviceArg,

    /// Skip the device path entirely
    #[arg(long)]
    cpu_only: bool,
}

impl RunArgs {
    fn into_config(self) -> Result<(RunConfig, Variant, f32)> {
        let mut config = match &self.config {
            Some(path) => RunConfig::load(path)?,
            None => RunConfig::default(),
        };

        if let Some(v) = self.beams {
            config.num_beams = v;
        }
        if let Some(v) = self.duration {
            config.duration = v;
        }
        if let Some(v) = self.sample_rate {
            config.sample_rate = v;
        }
        if let Some(v) = self.f_start {
            config.f_start = v;
        }
        if let Some(v) = self.f_stop {
            config.f_stop = v;
        }
        if let Some(v) = self.tolerance {
            config.tolerance = v;
        }
        if let Some(v) = self.delay_step {
            config.delay_step = v;
            config.delays = None;
        }
        if self.input.is_some() {
            config.input_file = self.input;
        }
        if self.output.is_some() {
            config.output_file = self.output;
        }
        if self.coefficients.is_some() {
            config.coefficients_file = self.coefficients;
        }
        if self.report_dir.is_some() {
            config.report_dir = self.report_dir;
        }
        config.cpu_only |= self.cpu_only;

        config.validate()?;
        Ok((config, self.variant, self.variant_step))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log)),
        )
        .init();

    match cli.command {
        Command::Run(args) => run(args),
        Command::Info => show_device_info(),
    }
}

fn show_device_info() -> Result<()> {
    match FractionalDelayProcessor::new() {
        Ok(processor) => {
            let info = processor.system_info()?;
            println!("Device:          {} ({})", info.device_name, info.device_vendor);
            println!("Driver:          {}", info.driver_version);
            println!("Platform:        {} ({})", info.platform_name, info.platform_version);
            println!("Memory:          {} MB", info.device_memory_mb);
            println!("Compute units:   {}", info.compute_units);
            println!("Max work-group:  {}", info.max_work_group_size);
        }
        Err(e) => println!("No usable OpenCL device: {e}"),
    }
    Ok(())
}

fn run(args: RunArgs) -> Result<()> {
    let preference = args.device.preference();
    let (config, variant, variant_step) = args.into_config()?;
    let delays = config.beam_delays();

    let table = match &config.coefficients_file {
        Some(path) => CoefficientTable::load_from_file(path)
            .with_context(|| format!("loading coefficient table {}", path.display()))?,
        None => CoefficientTable::generate(),
    };

    let mut engine = ProfilingEngine::new();

    engine.start_timer("signal_generation");
    let input = match &config.input_file {
        Some(path) => SignalBuffer::load_from_file(path)
            .with_context(|| format!("loading signal file {}", path.display()))?,
        None => {
            let generator = ChirpGenerator::new(config.chirp_parameters())?;
            generator.generate(match variant {
                Variant::Basic => ChirpVariant::Basic,
                Variant::PhaseOffset => ChirpVariant::PhaseOffset(variant_step),
                Variant::Delay => ChirpVariant::Delay(variant_step),
                Variant::Beamforming => ChirpVariant::Beamforming,
                Variant::Windowed => ChirpVariant::Windowed,
            })?
        }
    };
    engine.stop_timer("signal_generation");
    if delays.len() != input.num_beams() {
        bail!("{} delays for {} beams in the input", delays.len(), input.num_beams());
    }
    info!(
        beams = input.num_beams(),
        samples = input.num_samples(),
        "processing {} complex samples",
        input.len()
    );

    engine.start_timer("cpu_reference");
    let mut cpu_result = input.clone();
    apply_fractional_delay(&mut cpu_result, &delays, &table)?;
    engine.stop_timer("cpu_reference");

    let mut report = ProfilingReport::new(SystemInfo::default().with_host_os());
    report.add_signal_parameter("beams", input.num_beams());
    report.add_signal_parameter("samples_per_beam", input.num_samples());
    report.add_signal_parameter("sample_rate_hz", config.sample_rate);
    report.add_signal_parameter("f_start_hz", config.f_start);
    report.add_signal_parameter("f_stop_hz", config.f_stop);
    report.add_signal_parameter("duration_s", config.duration);
    report.add_signal_parameter("delay_step_samples", config.delay_step);
    report.add_signal_parameter("tolerance", config.tolerance);

    let mut validated = true;
    if config.cpu_only {
        info!("device path disabled, CPU reference only");
    } else {
        match FractionalDelayProcessor::with_table_on(&table, preference) {
            Ok(mut processor) => {
                report.system_info = processor.system_info()?;
                info!(device = %processor.device_name(), "running device path");

                let mut gpu_result = input.clone();
                let events =
                    processor.process_profiled(&mut gpu_result, &delays, &mut engine)?;
                for event in events {
                    println!("{event}");
                    report.push_event(event);
                }

                let metrics = compare_buffers(&cpu_result, &gpu_result, config.tolerance)?;
                println!("{metrics}");
                validated = metrics.passed();
            }
            Err(e) => {
                warn!("no usable OpenCL device ({e}), falling back to CPU only");
            }
        }
    }

    if let Some(path) = &config.output_file {
        cpu_result
            .save_to_file(path)
            .with_context(|| format!("writing output buffer {}", path.display()))?;
        info!(path = %path.display(), "wrote processed buffer");
    }

    report.set_cpu_metrics(&engine);
    if let Some(dir) = &config.report_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating report directory {}", dir.display()))?;
        report.save_json(dir.join("report.json"))?;
        report.save_markdown(dir.join("report.md"))?;
        info!(dir = %dir.display(), "wrote profiling reports");
    }

    print!("{engine}");

    if !validated {
        bail!("GPU output diverged from the CPU reference beyond tolerance");
    }
    Ok(())
}
