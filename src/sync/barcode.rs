//! Barcode decoding for the sync line shared by every acquisition system.
//!
//! A barcode frame on the wire looks like this (one `bit_duration` per slot):
//!
//! ```text
//!  start guard  b0   b1   b2  ...  b(n-1)
//!  ┌───┐       ┌───┐     ┌───
//! ─┘   └───────┘   └─────┘    ...
//! ```
//!
//! The start pulse is always one slot high followed by one low guard slot, so the
//! frame origin is the start pulse's rising edge. Data bits follow least significant
//! first; a slot reads `1` when the line is high at its centre. Consecutive frames are
//! separated by at least `inter_barcode_gap` seconds of silence.
use log::debug;
use serde::{Deserialize, Serialize};
use crate::sync::error::SyncError;
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarcodeFormat {
    /// Minimum silence (s) between the rising edges that open two frames.
    pub inter_barcode_gap: f64,
    /// Width of one slot (s).
    pub bit_duration: f64,
    /// Upper bound on the length of a frame (s); edges beyond it belong to nobody.
    pub frame_ceiling: f64,
    pub bits: u32,
}
impl Default for BarcodeFormat {
    fn default() -> Self {
        Self {
            inter_barcode_gap: 10.0,
            bit_duration: 0.03,
            frame_ceiling: 2.0,
            bits: 32,
        }
    }
}
impl BarcodeFormat {
    /// Time from the start edge to the end of the last data slot.
    pub fn frame_length(&self) -> f64 {
        (self.bits + 2) as f64 * self.bit_duration
    }
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.bits == 0 || self.bits > u32::BITS {
            return Err(SyncError::InvalidConfig(format!(
                "barcode bits must be within 1..=32, got {}",
                self.bits
            )));
        }
        if self.bit_duration <= 0.0 {
            return Err(SyncError::InvalidConfig(
                "barcode bit duration must be positive".into(),
            ));
        }
        if self.frame_ceiling < self.frame_length() {
            return Err(SyncError::InvalidConfig(format!(
                "frame ceiling {}s is shorter than a {}-bit frame",
                self.frame_ceiling, self.bits
            )));
        }
        if self.inter_barcode_gap <= self.frame_length() {
            return Err(SyncError::InvalidConfig(
                "inter-barcode gap must exceed the frame length".into(),
            ));
        }
        Ok(())
    }
}
/// Decoded barcodes of one clock: frame start times (s) and their codes, in time order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Barcodes {
    pub times: Vec<f64>,
    pub codes: Vec<u32>,
}
impl Barcodes {
    pub fn len(&self) -> usize {
        self.codes.len()
    }
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}
#[derive(Clone, Copy, Debug)]
struct Pulse {
    rise: f64,
    fall: f64,
}
/// Decodes every complete frame found in a pair of edge lists.
///
/// Rising and falling lists need not pair up globally; frames whose pulses cannot be
/// formed (unterminated, out of order, or a malformed start pulse) are dropped.
pub fn decode_barcodes(rising: &[f64], falling: &[f64], format: &BarcodeFormat) -> Barcodes {
    let starts = frame_starts(rising, falling, format.inter_barcode_gap);
    let mut out = Barcodes::default();
    for (i, &start) in starts.iter().enumerate() {
        let ceiling = start + format.frame_ceiling;
        let window_end = starts.get(i + 1).map_or(ceiling, |&next| next.min(ceiling));
        let Some(pulses) = pulses_in(rising, falling, start, window_end) else {
            continue;
        };
        if let Some(code) = read_frame(&pulses, start, format) {
            out.times.push(start);
            out.codes.push(code);
        }
    }
    debug!(
        "decoded {} barcode(s) from {} candidate frame(s)",
        out.len(),
        starts.len()
    );
    out
}
fn frame_starts(rising: &[f64], falling: &[f64], gap: f64) -> Vec<f64> {
    let mut starts = Vec::new();
    let Some(&first) = rising.first() else {
        return starts;
    };
    // A falling edge before the first rise means the recording began mid-pulse.
    if falling.first().map_or(true, |&f| f > first) {
        starts.push(first);
    }
    starts.extend(
        rising
            .windows(2)
            .filter(|pair| pair[1] - pair[0] > gap)
            .map(|pair| pair[1]),
    );
    starts
}
fn pulses_in(rising: &[f64], falling: &[f64], start: f64, end: f64) -> Option<Vec<Pulse>> {
    let rises = &rising[rising.partition_point(|&t| t < start)..rising.partition_point(|&t| t < end)];
    let falls = &falling[falling.partition_point(|&t| t <= start)..falling.partition_point(|&t| t < end)];
    if rises.len() != falls.len() {
        return None;
    }
    let pulses: Vec<Pulse> = rises
        .iter()
        .zip(falls)
        .map(|(&rise, &fall)| Pulse { rise, fall })
        .collect();
    let ordered = pulses.iter().all(|p| p.rise < p.fall)
        && pulses.windows(2).all(|pair| pair[0].fall < pair[1].rise);
    ordered.then_some(pulses)
}
fn read_frame(pulses: &[Pulse], start: f64, format: &BarcodeFormat) -> Option<u32> {
    let (head, data) = pulses.split_first()?;
    let width = (head.fall - head.rise) / format.bit_duration;
    if !(0.5..1.5).contains(&width) {
        return None;
    }
    let mut code = 0u32;
    for bit in 0..format.bits {
        let centre = start + (bit as f64 + 2.5) * format.bit_duration;
        if data.iter().any(|p| p.rise <= centre && centre < p.fall) {
            code |= 1 << bit;
        }
    }
    Some(code)
}
