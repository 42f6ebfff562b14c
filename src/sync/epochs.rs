// src/sync/epochs.rs
use log::{info, warn};
use serde::Serialize;
use crate::sync::config::SyncConfig;
use crate::sync::dataset::{EdgeUnits, LineRef, SyncDataset};
use crate::sync::edges::resolve_line;
use crate::sync::error::SyncError;
/// Frame ticks seen inside one stimulus-running interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObservedEpoch {
    /// Index of the epoch's first frame tick.
    pub start_frame: usize,
    pub frame_count: usize,
}
/// Where an expected stimulus was found in the frame-tick stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct StimulusEpoch {
    pub expected_frame_count: usize,
    pub start_frame: usize,
}
/// Counts frame ticks strictly inside each `(start, end)` interval.
///
/// `frame_ticks` must be sorted. Intervals holding no ticks are skipped.
pub fn observe_epochs(frame_ticks: &[f64], stim_runs: &[(f64, f64)]) -> Vec<ObservedEpoch> {
    let mut epochs = Vec::with_capacity(stim_runs.len());
    for &(start, end) in stim_runs {
        let first = frame_ticks.partition_point(|&t| t <= start);
        let last = frame_ticks.partition_point(|&t| t < end);
        if last <= first {
            warn!("stimulus run {start:.3}s..{end:.3}s holds no frame ticks; skipping");
            continue;
        }
        epochs.push(ObservedEpoch {
            start_frame: first,
            frame_count: last - first,
        });
    }
    epochs
}
/// Infers the start frame of each expected stimulus, in the order of `expected_counts`.
///
/// When the number of observed epochs matches, they are paired in encounter order.
/// Otherwise each expected count greedily claims the closest unclaimed epoch (first
/// wins on ties). Either way every paired epoch must lie within `tolerance_pct` percent
/// of its expected count, so at the default tolerance of 0 a single dropped vsync is
/// enough to fail. The greedy pass is order dependent when counts are ambiguous.
pub fn match_epochs(
    frame_ticks: &[f64],
    stim_runs: &[(f64, f64)],
    expected_counts: &[usize],
    tolerance_pct: f64,
) -> Result<Vec<usize>, SyncError> {
    let tolerance = tolerance_pct / 100.0;
    let check = |stimulus: usize, expected: usize, epoch: &ObservedEpoch| {
        let count = epoch.frame_count as f64;
        let expected_f = expected as f64;
        if count < expected_f * (1.0 - tolerance) || count > expected_f * (1.0 + tolerance) {
            Err(SyncError::EpochMatch {
                stimulus,
                expected,
                tolerance_pct,
            })
        } else {
            Ok(epoch.start_frame)
        }
    };
    let observed = observe_epochs(frame_ticks, stim_runs);
    if observed.len() == expected_counts.len() {
        return expected_counts
            .iter()
            .zip(&observed)
            .enumerate()
            .map(|(stimulus, (&expected, epoch))| check(stimulus, expected, epoch))
            .collect();
    }
    if observed.len() > expected_counts.len() {
        warn!("found extra stim presentations; inferring start frames");
    } else {
        warn!(
            "found {} stim presentation(s) for {} expected; inferring start frames",
            observed.len(),
            expected_counts.len()
        );
    }
    let mut pool = observed;
    let mut starts = Vec::with_capacity(expected_counts.len());
    for (stimulus, &expected) in expected_counts.iter().enumerate() {
        let Some((best, epoch)) = pool
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| e.frame_count.abs_diff(expected))
        else {
            return Err(SyncError::EpochMatch {
                stimulus,
                expected,
                tolerance_pct,
            });
        };
        let start = check(stimulus, expected, epoch)?;
        pool.remove(best);
        info!("found stim {stimulus} start at vsync {start}");
        starts.push(start);
    }
    Ok(starts)
}
/// Falling edges (s) of the display's frame-tick line.
///
/// The last line whose label contains `vsync` wins; otherwise `fallback` is used.
pub fn vsync_times(dataset: &dyn SyncDataset, fallback: &LineRef) -> Result<Vec<f64>, SyncError> {
    let line = match dataset.line_labels().iter().rposition(|l| l.contains("vsync")) {
        Some(index) => index,
        None => resolve_line(dataset, fallback)?,
    };
    Ok(dataset.falling_edges(line, EdgeUnits::Seconds))
}
/// Stimulus-running intervals (s): each rising edge paired with the next falling edge.
pub fn stim_intervals(
    dataset: &dyn SyncDataset,
    fallback: &LineRef,
) -> Result<Vec<(f64, f64)>, SyncError> {
    let line = match dataset.line_labels().iter().position(|l| l == "stim_running") {
        Some(index) => index,
        None => resolve_line(dataset, fallback)?,
    };
    let rising = dataset.rising_edges(line, EdgeUnits::Seconds);
    let falling = dataset.falling_edges(line, EdgeUnits::Seconds);
    Ok(pair_intervals(&rising, &falling))
}
fn pair_intervals(rising: &[f64], falling: &[f64]) -> Vec<(f64, f64)> {
    let mut intervals = Vec::with_capacity(rising.len());
    let mut falls = falling.iter().copied().peekable();
    for &on in rising {
        while falls.next_if(|&off| off <= on).is_some() {}
        match falls.next() {
            Some(off) => intervals.push((on, off)),
            None => {
                warn!("stimulus run starting at {on:.3}s never ends; ignoring it");
                break;
            }
        }
    }
    intervals
}
/// Locates each expected stimulus in the reference recording's frame ticks.
pub fn get_frame_offsets(
    dataset: &dyn SyncDataset,
    expected_counts: &[usize],
    config: &SyncConfig,
) -> Result<Vec<StimulusEpoch>, SyncError> {
    let ticks = vsync_times(dataset, &config.fallback_vsync_line)?;
    let runs = stim_intervals(dataset, &config.fallback_stim_line)?;
    let starts = match_epochs(
        &ticks,
        &runs,
        expected_counts,
        config.frame_count_tolerance_pct,
    )?;
    Ok(expected_counts
        .iter()
        .zip(starts)
        .map(|(&expected_frame_count, start_frame)| StimulusEpoch {
            expected_frame_count,
            start_frame,
        })
        .collect())
}
