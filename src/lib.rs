//! Clock synchronization for multi-probe electrophysiology sessions.
//!
//! Every acquisition subsystem records the same barcode train on a TTL line. Decoding the
//! train on the master sync board and on each probe pins the probe's sample clock to the
//! reference clock, after which spike times and field-potential timestamps are remapped
//! onto one shared time base.
pub mod sync;
pub use sync::{
    build_unit_tables, get_frame_offsets, get_lfp_data, get_unit_data, probe_alignment,
    BatchReport, SyncConfig, SyncDataset, SyncError, SyncRecording,
};
