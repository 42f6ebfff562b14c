// src/sync/dataset.rs
use std::fmt;
use serde::{Deserialize, Serialize};
/// A logical line on the sync board, either by its acquisition label or by raw bit index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LineRef {
    Label(String),
    Index(usize),
}
impl LineRef {
    pub fn label(label: impl Into<String>) -> Self {
        LineRef::Label(label.into())
    }
}
impl fmt::Display for LineRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineRef::Label(label) => write!(f, "'{label}'"),
            LineRef::Index(index) => write!(f, "#{index}"),
        }
    }
}
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeUnits {
    Samples,
    Seconds,
}
/// Read-only view of the master sync recording.
///
/// Implementors only supply raw sample counts; unit conversion is shared.
/// The dataset is shared across probe threads, hence the `Sync` bound.
pub trait SyncDataset: Sync {
    fn line_labels(&self) -> &[String];
    /// Number of addressable lines; valid indices are `0..line_count()`.
    fn line_count(&self) -> usize;
    fn raw_rising_edges(&self, line: usize) -> Vec<u64>;
    fn raw_falling_edges(&self, line: usize) -> Vec<u64>;
    /// Counter output frequency of the sync board, in Hz.
    fn sample_freq(&self) -> f64;
    fn rising_edges(&self, line: usize, units: EdgeUnits) -> Vec<f64> {
        convert(self.raw_rising_edges(line), units, self.sample_freq())
    }
    fn falling_edges(&self, line: usize, units: EdgeUnits) -> Vec<f64> {
        convert(self.raw_falling_edges(line), units, self.sample_freq())
    }
}
fn convert(samples: Vec<u64>, units: EdgeUnits, sample_freq: f64) -> Vec<f64> {
    match units {
        EdgeUnits::Samples => samples.into_iter().map(|s| s as f64).collect(),
        EdgeUnits::Seconds => samples.into_iter().map(|s| s as f64 / sample_freq).collect(),
    }
}
#[derive(Clone, Debug, Default)]
struct LineEdges {
    rising: Vec<u64>,
    falling: Vec<u64>,
}
/// In-memory sync recording.
#[derive(Clone, Debug)]
pub struct SyncRecording {
    labels: Vec<String>,
    sample_freq: f64,
    lines: Vec<LineEdges>,
}
impl SyncRecording {
    /// Builds a recording from explicit per-line `(rising, falling)` sample counts.
    pub fn from_line_edges(
        labels: Vec<String>,
        sample_freq: f64,
        edges: Vec<(Vec<u64>, Vec<u64>)>,
    ) -> Self {
        let lines = edges
            .into_iter()
            .map(|(rising, falling)| LineEdges { rising, falling })
            .collect();
        Self {
            labels,
            sample_freq,
            lines,
        }
    }
    /// Builds a recording from the board's event stream: one `(sample, bit-state word)`
    /// entry per change, bit `n` holding the level of line `n`. All lines start low.
    pub fn from_events(labels: Vec<String>, sample_freq: f64, events: &[(u64, u32)]) -> Self {
        let mut lines = vec![LineEdges::default(); u32::BITS as usize];
        let mut previous = 0u32;
        for &(sample, state) in events {
            let changed = state ^ previous;
            for (bit, line) in lines.iter_mut().enumerate() {
                let mask = 1u32 << bit;
                if changed & mask == 0 {
                    continue;
                }
                if state & mask != 0 {
                    line.rising.push(sample);
                } else {
                    line.falling.push(sample);
                }
            }
            previous = state;
        }
        Self {
            labels,
            sample_freq,
            lines,
        }
    }
}
impl SyncDataset for SyncRecording {
    fn line_labels(&self) -> &[String] {
        &self.labels
    }
    fn line_count(&self) -> usize {
        self.lines.len()
    }
    fn raw_rising_edges(&self, line: usize) -> Vec<u64> {
        self.lines
            .get(line)
            .map(|l| l.rising.clone())
            .unwrap_or_default()
    }
    fn raw_falling_edges(&self, line: usize) -> Vec<u64> {
        self.lines
            .get(line)
            .map(|l| l.falling.clone())
            .unwrap_or_default()
    }
    fn sample_freq(&self) -> f64 {
        self.sample_freq
    }
}
