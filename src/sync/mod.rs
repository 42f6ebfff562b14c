// src/sync/mod.rs
pub mod align;
pub mod barcode;
pub mod config;
pub mod dataset;
pub mod edges;
pub mod epochs;
pub mod error;
pub mod lfp;
pub mod npy;
pub mod probe;
pub mod table;
#[cfg(test)]
mod testutil;
pub mod units;
pub use align::{estimate_transform, ClockAlignment, ClockTransform, MatchedEndpoints};
pub use barcode::{decode_barcodes, BarcodeFormat, Barcodes};
pub use config::{ProbeLayout, SyncConfig};
pub use dataset::{EdgeUnits, LineRef, SyncDataset, SyncRecording};
pub use edges::{get_edges, resolve_line, EdgeStream};
pub use epochs::{
    get_frame_offsets, match_epochs, observe_epochs, stim_intervals, vsync_times, ObservedEpoch,
    StimulusEpoch,
};
pub use error::SyncError;
pub use lfp::{load_fp, FieldPotentialBlock};
pub use probe::{
    build_unit_table, build_unit_tables, get_lfp_data, get_unit_data, probe_alignment,
    BatchReport,
};
pub use table::{
    merge_unit_table, read_unit_metrics, MetricRow, MetricValue, UnitMetrics, UnitRecord,
    UnitTable,
};
pub use units::{build_units, load_units, SortingArtifacts, Unit, Units};
