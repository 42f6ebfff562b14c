use std::collections::BTreeMap;
use std::path::Path;
use log::{debug, info};
use ndarray::{Array1, Array2, Array3, Axis, Ix2, Ix3};
use rand::Rng;
use serde::Serialize;
use crate::sync::align::ClockTransform;
use crate::sync::error::SyncError;
use crate::sync::npy;
/// One sorted unit with its spikes on the reference clock.
#[derive(Clone, Debug, Serialize)]
pub struct Unit {
    pub cluster_id: i64,
    /// Reference-clock seconds, ascending.
    pub spike_times: Array1<f64>,
    /// Mean template waveform, time samples x channels.
    pub template: Array2<f64>,
    /// Channel holding the template's global minimum.
    pub peak_channel: usize,
    /// Probe-plane position of the peak channel.
    pub position: [f64; 2],
    /// Per-spike amplitudes, index-aligned with `spike_times`.
    pub amplitudes: Array1<f64>,
}
pub type Units = BTreeMap<i64, Unit>;
/// Raw spike-sorting output for one probe.
#[derive(Clone, Debug)]
pub struct SortingArtifacts {
    pub spike_clusters: Vec<i64>,
    pub spike_samples: Vec<i64>,
    pub spike_templates: Vec<i64>,
    /// Templates x time samples x channels.
    pub templates: Array3<f64>,
    /// Channels x (x, y).
    pub channel_positions: Array2<f64>,
    pub amplitudes: Vec<f64>,
}
impl SortingArtifacts {
    /// Reads the arrays as stored; `build_units` validates them before use.
    pub fn load(spike_dir: &Path) -> Result<Self, SyncError> {
        let templates = npy::read_floats(&spike_dir.join("templates.npy"))?;
        let templates_ndim = templates.ndim();
        let templates = templates
            .into_dimensionality::<Ix3>()
            .map_err(|_| SyncError::ShapeMismatch {
                what: "templates.npy dimensions",
                expected: 3,
                actual: templates_ndim,
            })?;
        let positions = npy::read_floats(&spike_dir.join("channel_positions.npy"))?;
        let positions_ndim = positions.ndim();
        let channel_positions = positions
            .into_dimensionality::<Ix2>()
            .map_err(|_| SyncError::ShapeMismatch {
                what: "channel_positions.npy dimensions",
                expected: 2,
                actual: positions_ndim,
            })?;
        Ok(Self {
            spike_clusters: npy::read_index_vec(&spike_dir.join("spike_clusters.npy"))?,
            spike_samples: npy::read_index_vec(&spike_dir.join("spike_times.npy"))?,
            spike_templates: npy::read_index_vec(&spike_dir.join("spike_templates.npy"))?,
            templates,
            channel_positions,
            amplitudes: npy::read_floats(&spike_dir.join("amplitudes.npy"))?
                .iter()
                .copied()
                .collect(),
        })
    }
    pub fn validate(&self) -> Result<(), SyncError> {
        let spikes = self.spike_clusters.len();
        for (what, len) in [
            ("spike_times.npy length", self.spike_samples.len()),
            ("spike_templates.npy length", self.spike_templates.len()),
            ("amplitudes.npy length", self.amplitudes.len()),
        ] {
            if len != spikes {
                return Err(SyncError::ShapeMismatch {
                    what,
                    expected: spikes,
                    actual: len,
                });
            }
        }
        let (template_count, samples, channels) = self.templates.dim();
        for (what, len) in [
            ("templates.npy time samples", samples),
            ("templates.npy channels", channels),
        ] {
            if len == 0 {
                return Err(SyncError::ShapeMismatch {
                    what,
                    expected: 1,
                    actual: 0,
                });
            }
        }
        if let Some(&bad) = self
            .spike_templates
            .iter()
            .find(|&&t| t < 0 || t as usize >= template_count)
        {
            return Err(SyncError::ShapeMismatch {
                what: "spike template index bound",
                expected: template_count,
                actual: bad.max(0) as usize,
            });
        }
        let (position_rows, position_cols) = self.channel_positions.dim();
        if position_rows < channels || position_cols < 2 {
            return Err(SyncError::ShapeMismatch {
                what: "channel_positions.npy rows",
                expected: channels,
                actual: position_rows,
            });
        }
        Ok(())
    }
    fn spikes_by_cluster(&self) -> BTreeMap<i64, Vec<usize>> {
        let mut groups: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (i, &cluster) in self.spike_clusters.iter().enumerate() {
            groups.entry(cluster).or_default().push(i);
        }
        groups
    }
    fn mean_template<R: Rng>(&self, spikes: &[usize], draws: usize, rng: &mut R) -> Array2<f64> {
        let draws = draws.max(1);
        let (_, samples, channels) = self.templates.dim();
        let mut sum = Array2::<f64>::zeros((samples, channels));
        for _ in 0..draws {
            let spike = spikes[rng.gen_range(0..spikes.len())];
            let template = self.spike_templates[spike] as usize;
            sum += &self.templates.index_axis(Axis(0), template);
        }
        sum / draws as f64
    }
}
/// Builds every unit from the artifacts, remapping spike samples through `transform`.
///
/// Each template is the mean of `template_draws` templates picked uniformly with
/// replacement from the unit's own spikes, even when the unit has fewer spikes than that.
/// The artifacts are validated first.
pub fn build_units<R: Rng>(
    artifacts: &SortingArtifacts,
    transform: &ClockTransform,
    template_draws: usize,
    rng: &mut R,
) -> Result<Units, SyncError> {
    artifacts.validate()?;
    let mut units = Units::new();
    for (cluster_id, mut spikes) in artifacts.spikes_by_cluster() {
        spikes.sort_by_key(|&i| artifacts.spike_samples[i]);
        let samples: Vec<i64> = spikes.iter().map(|&i| artifacts.spike_samples[i]).collect();
        let template = artifacts.mean_template(&spikes, template_draws, rng);
        let peak_channel = peak_channel(&template);
        let row = artifacts.channel_positions.row(peak_channel);
        units.insert(
            cluster_id,
            Unit {
                cluster_id,
                spike_times: transform.map_samples(&samples),
                template,
                peak_channel,
                position: [row[0], row[1]],
                amplitudes: spikes.iter().map(|&i| artifacts.amplitudes[i]).collect(),
            },
        );
    }
    debug!("built {} unit(s)", units.len());
    Ok(units)
}
/// Loads sorting output from `spike_dir` and builds units on the reference clock.
pub fn load_units<R: Rng>(
    spike_dir: &Path,
    transform: &ClockTransform,
    template_draws: usize,
    rng: &mut R,
) -> Result<Units, SyncError> {
    info!("loading spike sorting output from {}", spike_dir.display());
    let artifacts = SortingArtifacts::load(spike_dir)?;
    build_units(&artifacts, transform, template_draws, rng)
}
/// Channel of the first global minimum, scanning time-major.
fn peak_channel(template: &Array2<f64>) -> usize {
    let mut peak = (0, f64::INFINITY);
    for ((_, channel), &value) in template.indexed_iter() {
        if value < peak.1 {
            peak = (channel, value);
        }
    }
    peak.0
}
