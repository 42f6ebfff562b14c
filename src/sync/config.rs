// src/sync/config.rs
use std::fs;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::sync::barcode::BarcodeFormat;
use crate::sync::dataset::LineRef;
use crate::sync::error::SyncError;
/// Where a probe's artifacts live, relative to the probe's base directory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeLayout {
    pub ttl_dir: PathBuf,
    pub spike_dir: PathBuf,
    pub lfp_dir: PathBuf,
    pub lfp_file: String,
    pub lfp_timestamps_file: String,
    pub metrics_file: String,
}
impl Default for ProbeLayout {
    fn default() -> Self {
        Self {
            ttl_dir: ["events", "Neuropix-PXI-100.0", "TTL_1"].iter().collect(),
            spike_dir: ["continuous", "Neuropix-PXI-100.0"].iter().collect(),
            lfp_dir: ["continuous", "Neuropix-PXI-100.1"].iter().collect(),
            lfp_file: "continuous.dat".into(),
            lfp_timestamps_file: "lfp_timestamps.npy".into(),
            metrics_file: "metrics.csv".into(),
        }
    }
}
impl ProbeLayout {
    pub fn ttl_dir(&self, probe_base: &Path) -> PathBuf {
        probe_base.join(&self.ttl_dir)
    }
    pub fn spike_dir(&self, probe_base: &Path) -> PathBuf {
        probe_base.join(&self.spike_dir)
    }
    pub fn lfp_dir(&self, probe_base: &Path) -> PathBuf {
        probe_base.join(&self.lfp_dir)
    }
    pub fn metrics_path(&self, probe_base: &Path) -> PathBuf {
        self.spike_dir(probe_base).join(&self.metrics_file)
    }
}
/// Options for one synchronization run, passed explicitly to every entry point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Reference line carrying the shared barcodes.
    pub reference_line_for_barcode: LineRef,
    /// Used when no line label contains `vsync`.
    pub fallback_vsync_line: LineRef,
    /// Used when no line is labelled `stim_running`.
    pub fallback_stim_line: LineRef,
    /// Allowed deviation (%) of an observed stimulus frame count from the expected one.
    #[serde(alias = "amplitude_tolerance_pct")]
    pub frame_count_tolerance_pct: f64,
    /// Nominal probe sample rate (Hz), used to turn probe TTL samples into seconds.
    pub probe_sample_rate: f64,
    pub lfp_channel_count: usize,
    /// Spikes drawn (with replacement) to average each unit's template.
    pub template_sample_count: usize,
    /// Seed for template sampling; `None` draws from OS entropy.
    pub seed: Option<u64>,
    pub barcode: BarcodeFormat,
    pub layout: ProbeLayout,
}
impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            reference_line_for_barcode: LineRef::Index(0),
            fallback_vsync_line: LineRef::Index(2),
            fallback_stim_line: LineRef::Index(5),
            frame_count_tolerance_pct: 0.0,
            probe_sample_rate: 30_000.0,
            lfp_channel_count: 384,
            template_sample_count: 1000,
            seed: None,
            barcode: BarcodeFormat::default(),
            layout: ProbeLayout::default(),
        }
    }
}
impl SyncConfig {
    pub fn from_json_str(json: &str) -> Result<Self, SyncError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
    pub fn from_json_file(path: &Path) -> Result<Self, SyncError> {
        let text = fs::read_to_string(path).map_err(|e| SyncError::io(path, e))?;
        Self::from_json_str(&text)
    }
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.probe_sample_rate <= 0.0 {
            return Err(SyncError::InvalidConfig(
                "probe sample rate must be positive".into(),
            ));
        }
        if self.lfp_channel_count == 0 {
            return Err(SyncError::InvalidConfig(
                "LFP channel count must be at least 1".into(),
            ));
        }
        if self.template_sample_count == 0 {
            return Err(SyncError::InvalidConfig(
                "template sample count must be at least 1".into(),
            ));
        }
        if !(0.0..=100.0).contains(&self.frame_count_tolerance_pct) {
            return Err(SyncError::InvalidConfig(format!(
                "frame count tolerance must be within 0..=100%, got {}",
                self.frame_count_tolerance_pct
            )));
        }
        self.barcode.validate()
    }
}
