//! Run configuration: file-based defaults overridden by CLI flags.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use farrow_signal::ChirpParameters;

/// One processing run, as read from a JSON config file. Missing fields fall
/// back to [`Default`].
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RunConfig {
    pub f_start: f32,
    pub f_stop: f32,
    pub sample_rate: f32,
    pub duration: f32,
    pub num_beams: usize,
    pub steering_angle: f32,
    pub tolerance: f32,
    /// Explicit per-beam delays in samples. When absent, beam `b` gets
    /// `b * delay_step`.
    pub delays: Option<Vec<f32>>,
    pub delay_step: f32,
    /// JSON coefficient table; the analytic table is used when absent.
    pub coefficients_file: Option<PathBuf>,
    /// Binary signal file to process instead of a generated chirp.
    pub input_file: Option<PathBuf>,
    /// Where to write the processed buffer, if anywhere.
    pub output_file: Option<PathBuf>,
    /// Directory for the JSON and Markdown profiling reports.
    pub report_dir: Option<PathBuf>,
    /// Skip the device path and run only the CPU reference.
    pub cpu_only: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            f_start: 100.0,
            f_stop: 500.0,
            sample_rate: 8000.0,
            duration: 1.0,
            num_beams: 8,
            steering_angle: 30.0,
            tolerance: 1e-5,
            delays: None,
            delay_step: 0.125,
            coefficients_file: None,
            input_file: None,
            output_file: None,
            report_dir: None,
            cpu_only: false,
        }
    }
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.chirp_parameters()
            .validate()
            .context("invalid signal parameters")?;
        if self.tolerance <= 0.0 {
            bail!("tolerance must be positive, got {}", self.tolerance);
        }
        if let Some(delays) = &self.delays {
            if delays.len() != self.num_beams {
                bail!(
                    "{} delays configured for {} beams",
                    delays.len(),
                    self.num_beams
                );
            }
        }
        Ok(())
    }

    pub fn chirp_parameters(&self) -> ChirpParameters {
        ChirpParameters {
            f_start: self.f_start,
            f_stop: self.f_stop,
            sample_rate: self.sample_rate,
            duration: self.duration,
            num_beams: self.num_beams,
            steering_angle: self.steering_angle,
        }
    }

    /// Effective per-beam delays.
    pub fn beam_delays(&self) -> Vec<f32> {
        match &self.delays {
            Some(d) => d.clone(),
            None => (0..self.num_beams)
                .map(|b| b as f32 * self.delay_step)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RunConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.num_beams, 8);
        assert_eq!(config.beam_delays(), vec![0.0, 0.125, 0.25, 0.375, 0.5, 0.625, 0.75, 0.875]);
    }

    #[test]
    fn explicit_delays_override_the_ramp() {
        let config = RunConfig {
            num_beams: 2,
            delays: Some(vec![1.5, -0.25]),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.beam_delays(), vec![1.5, -0.25]);
    }

    #[test]
    fn delay_count_mismatch_is_rejected() {
        let config = RunConfig {
            num_beams: 4,
            delays: Some(vec![0.0, 0.1]),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_signal_parameters_are_rejected() {
        let config = RunConfig { sample_rate: 100.0, ..Default::default() };
        assert!(config.validate().is_err());
        let config = RunConfig { tolerance: 0.0, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let config: RunConfig =
            serde_json::from_str(r#"{ "num_beams": 16, "cpu_only": true }"#).unwrap();
        assert_eq!(config.num_beams, 16);
        assert!(config.cpu_only);
        assert_eq!(config.f_start, 100.0);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: std::result::Result<RunConfig, _> =
            serde_json::from_str(r#"{ "num_beems": 16 }"#);
        assert!(result.is_err());
    }

    #[test]
    fn load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(&path, r#"{ "duration": 0.5, "delay_step": 0.25 }"#).unwrap();
        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.duration, 0.5);
        assert_eq!(config.beam_delays()[1], 0.25);
    }
}
