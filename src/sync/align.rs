// src/sync/align.rs
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use log::{debug, warn};
use ndarray::Array1;
use serde::Serialize;
use crate::sync::barcode::Barcodes;
use crate::sync::error::SyncError;
/// Affine map from a subsystem clock onto reference seconds.
///
/// `scale` is the subsystem's sample rate as measured against the reference clock, so a
/// raw subsystem sample count `s` lands at `s / scale - offset` reference seconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ClockTransform {
    pub scale: f64,
    pub offset: f64,
    /// Rate the subsystem's edge times were divided by before decoding.
    pub nominal_rate: f64,
}
impl ClockTransform {
    pub fn samples_to_reference(&self, sample: f64) -> f64 {
        sample / self.scale - self.offset
    }
    /// Maps a time expressed in nominal subsystem seconds.
    pub fn seconds_to_reference(&self, seconds: f64) -> f64 {
        self.samples_to_reference(seconds * self.nominal_rate)
    }
    pub fn map_samples(&self, samples: &[i64]) -> Array1<f64> {
        samples
            .iter()
            .map(|&s| self.samples_to_reference(s as f64))
            .collect()
    }
    /// Ratio of measured to nominal subsystem rate; drifts far from 1 point at bad data.
    pub fn rate_ratio(&self) -> f64 {
        self.scale / self.nominal_rate
    }
}
/// The two barcode times on each clock the transform was pinned to.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MatchedEndpoints {
    pub reference: [f64; 2],
    pub subsystem: [f64; 2],
}
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ClockAlignment {
    pub transform: ClockTransform,
    pub anchors: MatchedEndpoints,
    /// Barcodes in the run the anchors were taken from.
    pub matched: usize,
}
/// Estimates the subsystem → reference transform from two decoded barcode sequences.
///
/// Codes are matched by value. Matched pairs are split wherever the reference order
/// stops increasing, and the longest consistent run supplies the anchors: its first and
/// last pairs. The fit is exact through those two points; intermediate barcodes only
/// vouch for the run and do not refine the line.
pub fn estimate_transform(
    reference: &Barcodes,
    subsystem: &Barcodes,
    nominal_rate: f64,
) -> Result<ClockAlignment, SyncError> {
    let index = reference_index(reference);
    let pairs: Vec<(usize, usize)> = subsystem
        .codes
        .iter()
        .enumerate()
        .filter_map(|(sub_idx, code)| index.get(code).map(|&ref_idx| (ref_idx, sub_idx)))
        .collect();
    let run = longest_increasing_run(&pairs);
    if run.len() < 2 {
        return Err(SyncError::InsufficientOverlap { matched: run.len() });
    }
    let (r0, s0) = run[0];
    let (r1, s1) = run[run.len() - 1];
    let anchors = MatchedEndpoints {
        reference: [reference.times[r0], reference.times[r1]],
        subsystem: [subsystem.times[s0], subsystem.times[s1]],
    };
    let ref_span = anchors.reference[1] - anchors.reference[0];
    let sub_span = anchors.subsystem[1] - anchors.subsystem[0];
    if ref_span <= 0.0 || sub_span <= 0.0 {
        return Err(SyncError::InsufficientOverlap { matched: 1 });
    }
    let ratio = sub_span / ref_span;
    let transform = ClockTransform {
        scale: nominal_rate * ratio,
        offset: anchors.subsystem[0] / ratio - anchors.reference[0],
        nominal_rate,
    };
    if pairs.len() > run.len() {
        warn!(
            "{} matched barcode(s) fall outside the aligned run and were ignored",
            pairs.len() - run.len()
        );
    }
    debug!(
        "aligned on {} barcode(s): scale={:.6} offset={:.6}s",
        run.len(),
        transform.scale,
        transform.offset
    );
    Ok(ClockAlignment {
        transform,
        anchors,
        matched: run.len(),
    })
}
fn reference_index(reference: &Barcodes) -> HashMap<u32, usize> {
    let mut index = HashMap::with_capacity(reference.len());
    let mut duplicates = 0usize;
    for (i, &code) in reference.codes.iter().enumerate() {
        match index.entry(code) {
            Entry::Occupied(_) => duplicates += 1,
            Entry::Vacant(slot) => {
                slot.insert(i);
            }
        }
    }
    if duplicates > 0 {
        warn!("{duplicates} duplicated reference barcode(s); keeping first occurrences");
    }
    index
}
fn longest_increasing_run(pairs: &[(usize, usize)]) -> &[(usize, usize)] {
    let mut best = 0..0;
    let mut start = 0;
    for i in 1..=pairs.len() {
        let broken = i == pairs.len() || pairs[i].0 <= pairs[i - 1].0;
        if broken {
            if i - start > best.len() {
                best = start..i;
            }
            start = i;
        }
    }
    &pairs[best]
}
