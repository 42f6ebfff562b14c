//! Zero-copy access to a probe's continuous field-potential stream.
//!
//! The raw file is little-endian `int16`, channel-interleaved, and routinely larger
//! than memory, so it is memory-mapped rather than read.
use std::fs::File;
use std::mem;
use std::path::Path;
use std::ptr::NonNull;
use log::{info, warn};
use memmap2::Mmap;
use ndarray::{Array1, ArrayView2};
use crate::sync::align::ClockTransform;
use crate::sync::error::SyncError;
use crate::sync::npy;
const SAMPLE_BYTES: usize = mem::size_of::<i16>();
/// Mapped `samples x channels` voltages plus their reference-clock timestamps.
#[derive(Debug)]
pub struct FieldPotentialBlock {
    mmap: Mmap,
    channel_count: usize,
    rows: usize,
    times: Array1<f64>,
}
impl FieldPotentialBlock {
    /// Maps `data_path` and pairs it with `times`, one per row.
    ///
    /// A trailing partial row is dropped. If the row and timestamp counts disagree,
    /// both are cut to the shorter.
    pub fn open(
        data_path: &Path,
        channel_count: usize,
        mut times: Array1<f64>,
    ) -> Result<Self, SyncError> {
        if channel_count == 0 {
            return Err(SyncError::InvalidConfig(
                "field potential channel count must be at least 1".into(),
            ));
        }
        let file = File::open(data_path).map_err(|e| SyncError::io(data_path, e))?;
        // SAFETY: the map is read-only and the recording is not modified while loaded.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| SyncError::io(data_path, e))?;
        if mmap.as_ptr().align_offset(mem::align_of::<i16>()) != 0 {
            return Err(SyncError::InvalidConfig(format!(
                "{} is not mapped at an int16 boundary",
                data_path.display()
            )));
        }
        let samples = mmap.len() / SAMPLE_BYTES;
        let mut rows = samples / channel_count;
        let dropped = mmap.len() - rows * channel_count * SAMPLE_BYTES;
        if dropped > 0 {
            warn!(
                "{}: dropping {dropped} trailing byte(s) that do not fill a {channel_count}-channel row",
                data_path.display()
            );
        }
        if times.len() != rows {
            warn!(
                "{}: {} row(s) but {} timestamp(s); keeping the shorter",
                data_path.display(),
                rows,
                times.len()
            );
            rows = rows.min(times.len());
            times = times.slice_move(ndarray::s![..rows]);
        }
        Ok(Self {
            mmap,
            channel_count,
            rows,
            times,
        })
    }
    pub fn samples(&self) -> ArrayView2<'_, i16> {
        let ptr = if self.rows == 0 {
            NonNull::<i16>::dangling().as_ptr() as *const i16
        } else {
            self.mmap.as_ptr() as *const i16
        };
        // SAFETY: `open` checked alignment, and `rows * channel_count` int16 values fit
        // inside the map, which lives as long as the returned view.
        unsafe { ArrayView2::from_shape_ptr((self.rows, self.channel_count), ptr) }
    }
    pub fn times(&self) -> &Array1<f64> {
        &self.times
    }
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }
    pub fn rows(&self) -> usize {
        self.rows
    }
}
/// Loads a field-potential stream and remaps its sample-count timestamps.
///
/// Returns `Ok(None)` when the raw data file does not exist; a missing timestamp file
/// next to existing data is an error.
pub fn load_fp(
    data_path: &Path,
    timestamps_path: &Path,
    channel_count: usize,
    transform: &ClockTransform,
) -> Result<Option<FieldPotentialBlock>, SyncError> {
    if !data_path.is_file() {
        warn!("could not find LFP data at {}", data_path.display());
        return Ok(None);
    }
    let samples = npy::read_index_vec(timestamps_path)?;
    let times = transform.map_samples(&samples);
    let block = FieldPotentialBlock::open(data_path, channel_count, times)?;
    info!(
        "mapped {} LFP row(s) x {} channel(s) from {}",
        block.rows(),
        block.channel_count(),
        data_path.display()
    );
    Ok(Some(block))
}
