//! Synthetic barcode trains for tests.
use crate::sync::barcode::BarcodeFormat;
use crate::sync::edges::EdgeStream;
/// Encodes `codes` as frames starting at `first_start` and every `interval` seconds after.
pub(crate) fn encode_barcodes(
    codes: &[u32],
    first_start: f64,
    interval: f64,
    format: &BarcodeFormat,
) -> EdgeStream {
    let bit = format.bit_duration;
    let mut edges = EdgeStream::default();
    for (i, &code) in codes.iter().enumerate() {
        let start = first_start + interval * i as f64;
        edges.rising.push(start);
        edges.falling.push(start + bit);
        let mut high = false;
        for slot in 0..format.bits {
            let level = code >> slot & 1 == 1;
            let t = start + (slot + 2) as f64 * bit;
            if level && !high {
                edges.rising.push(t);
            } else if !level && high {
                edges.falling.push(t);
            }
            high = level;
        }
        if high {
            edges.falling.push(start + (format.bits + 2) as f64 * bit);
        }
    }
    edges
}
/// Re-expresses edge times through `t' = t * ratio + shift`, as a second clock would see them.
pub(crate) fn reclock(edges: &EdgeStream, ratio: f64, shift: f64) -> EdgeStream {
    let map = |v: &Vec<f64>| v.iter().map(|t| t * ratio + shift).collect();
    EdgeStream::new(map(&edges.rising), map(&edges.falling))
}
