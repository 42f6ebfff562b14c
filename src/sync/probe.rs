// src/sync/probe.rs
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::thread;
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use crate::sync::align::{estimate_transform, ClockAlignment};
use crate::sync::barcode::decode_barcodes;
use crate::sync::config::SyncConfig;
use crate::sync::dataset::SyncDataset;
use crate::sync::edges::{get_edges, EdgeStream};
use crate::sync::error::SyncError;
use crate::sync::lfp::{load_fp, FieldPotentialBlock};
use crate::sync::npy;
use crate::sync::table::{merge_unit_table, read_unit_metrics, UnitTable};
use crate::sync::units::{load_units, Units};
/// Aligns a probe's clock to the reference recording through their shared barcodes.
pub fn probe_alignment(
    probe_base: &Path,
    dataset: &dyn SyncDataset,
    config: &SyncConfig,
) -> Result<ClockAlignment, SyncError> {
    let reference_edges = get_edges(dataset, &config.reference_line_for_barcode)?;
    let reference = decode_barcodes(
        &reference_edges.rising,
        &reference_edges.falling,
        &config.barcode,
    );
    let probe_edges = probe_ttl_edges(probe_base, config)?;
    let probe = decode_barcodes(&probe_edges.rising, &probe_edges.falling, &config.barcode);
    debug!(
        "{}: decoded {} reference and {} probe barcode(s)",
        probe_base.display(),
        reference.len(),
        probe.len()
    );
    let alignment = estimate_transform(&reference, &probe, config.probe_sample_rate)?;
    let ratio = alignment.transform.rate_ratio();
    if (ratio - 1.0).abs() > 1e-3 {
        warn!(
            "{}: probe clock runs at {ratio:.6}x nominal; check the TTL channel",
            probe_base.display()
        );
    }
    info!(
        "{}: aligned on {} barcode(s), scale {:.3}, offset {:.6}s",
        probe_base.display(),
        alignment.matched,
        alignment.transform.scale,
        alignment.transform.offset
    );
    Ok(alignment)
}
fn probe_ttl_edges(probe_base: &Path, config: &SyncConfig) -> Result<EdgeStream, SyncError> {
    let ttl_dir = config.layout.ttl_dir(probe_base);
    let states = npy::read_index_vec(&ttl_dir.join("channel_states.npy"))?;
    let samples = npy::read_index_vec(&ttl_dir.join("event_timestamps.npy"))?;
    if states.len() != samples.len() {
        return Err(SyncError::ShapeMismatch {
            what: "event_timestamps.npy length",
            expected: states.len(),
            actual: samples.len(),
        });
    }
    Ok(EdgeStream::from_channel_states(
        &states,
        &samples,
        config.probe_sample_rate,
    ))
}
/// Sorted units for one probe, spike times on the reference clock.
pub fn get_unit_data<R: Rng>(
    probe_base: &Path,
    dataset: &dyn SyncDataset,
    config: &SyncConfig,
    rng: &mut R,
) -> Result<Units, SyncError> {
    let alignment = probe_alignment(probe_base, dataset, config)?;
    load_units(
        &config.layout.spike_dir(probe_base),
        &alignment.transform,
        config.template_sample_count,
        rng,
    )
}
/// The probe's field-potential stream, or `None` when it was never written.
///
/// Presence is checked before aligning, so a probe without LFP needs no TTL events.
pub fn get_lfp_data(
    probe_base: &Path,
    dataset: &dyn SyncDataset,
    config: &SyncConfig,
) -> Result<Option<FieldPotentialBlock>, SyncError> {
    let lfp_dir = config.layout.lfp_dir(probe_base);
    let data_path = lfp_dir.join(&config.layout.lfp_file);
    if !data_path.is_file() {
        warn!("could not find LFP data at {}", data_path.display());
        return Ok(None);
    }
    let alignment = probe_alignment(probe_base, dataset, config)?;
    load_fp(
        &data_path,
        &lfp_dir.join(&config.layout.lfp_timestamps_file),
        config.lfp_channel_count,
        &alignment.transform,
    )
}
/// Metrics and units of one probe, outer-joined on cluster id.
pub fn build_unit_table<R: Rng>(
    probe_base: &Path,
    dataset: &dyn SyncDataset,
    config: &SyncConfig,
    rng: &mut R,
) -> Result<UnitTable, SyncError> {
    let metrics = read_unit_metrics(&config.layout.metrics_path(probe_base))?;
    let units = get_unit_data(probe_base, dataset, config, rng)?;
    Ok(merge_unit_table(metrics, units))
}
/// Outcome of a multi-probe run. A probe lands in exactly one of the two maps.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub tables: BTreeMap<String, UnitTable>,
    pub failures: BTreeMap<String, SyncError>,
}
impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}
fn probe_rng(seed: Option<u64>, probe_index: usize) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(probe_index as u64)),
        None => StdRng::from_entropy(),
    }
}
/// Builds unit tables for every `(probe id, base dir)` pair, one worker thread per probe.
///
/// A failing probe is logged and recorded; the others still run. With `config.seed` set,
/// probe `i` draws templates from `seed + i`, so results do not depend on scheduling.
pub fn build_unit_tables(
    probes: &[(String, PathBuf)],
    dataset: &dyn SyncDataset,
    config: &SyncConfig,
) -> BatchReport {
    let results: Vec<(String, Result<UnitTable, SyncError>)> = thread::scope(|scope| {
        let workers: Vec<_> = probes
            .iter()
            .enumerate()
            .map(|(index, (id, base))| {
                let worker = scope.spawn(move || {
                    info!("getting units for probe {id}");
                    let mut rng = probe_rng(config.seed, index);
                    build_unit_table(base, dataset, config, &mut rng)
                });
                (id.clone(), worker)
            })
            .collect();
        workers
            .into_iter()
            .map(|(id, worker)| {
                let result = worker.join().unwrap_or(Err(SyncError::WorkerPanicked));
                (id, result)
            })
            .collect()
    });
    let mut report = BatchReport::default();
    for (id, result) in results {
        match result {
            Ok(table) => {
                report.tables.insert(id, table);
            }
            Err(e) => {
                error!("probe {id} failed: {e}");
                report.failures.insert(id, e);
            }
        }
    }
    report
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::barcode::BarcodeFormat;
    use crate::sync::dataset::SyncRecording;
    use crate::sync::testutil::{encode_barcodes, reclock};
    use ndarray::{arr1, arr2, Array3};
    use ndarray_npy::write_npy;
    use std::fs;
    use std::io::Write;
    const SYNC_RATE: f64 = 100_000.0;
    const PROBE_RATE: f64 = 30_000.0;
    // Probe seconds = reference seconds * RATIO + SHIFT.
    const RATIO: f64 = 1.00001;
    const SHIFT: f64 = -5.0;
    fn codes() -> Vec<u32> {
        (1..=20u32).map(|i| i.wrapping_mul(2_654_435_761)).collect()
    }
    fn to_samples(times: &[f64], rate: f64) -> Vec<u64> {
        times.iter().map(|t| (t * rate).round() as u64).collect()
    }
    fn reference(format: &BarcodeFormat) -> SyncRecording {
        let edges = encode_barcodes(&codes(), 10.0, 31.0, format);
        SyncRecording::from_line_edges(
            vec!["barcode".into()],
            SYNC_RATE,
            vec![(
                to_samples(&edges.rising, SYNC_RATE),
                to_samples(&edges.falling, SYNC_RATE),
            )],
        )
    }
    fn write_ttl(base: &Path, config: &SyncConfig) {
        let edges = reclock(
            &encode_barcodes(&codes(), 10.0, 31.0, &config.barcode),
            RATIO,
            SHIFT,
        );
        let mut events: Vec<(i64, i64)> = edges
            .rising
            .iter()
            .map(|t| ((t * PROBE_RATE).round() as i64, 1))
            .chain(edges.falling.iter().map(|t| ((t * PROBE_RATE).round() as i64, -1)))
            .collect();
        events.sort();
        let ttl = config.layout.ttl_dir(base);
        fs::create_dir_all(&ttl).unwrap();
        let samples: Vec<i64> = events.iter().map(|e| e.0).collect();
        let states: Vec<i16> = events.iter().map(|e| e.1 as i16).collect();
        write_npy(ttl.join("event_timestamps.npy"), &arr1(&samples)).unwrap();
        write_npy(ttl.join("channel_states.npy"), &arr1(&states)).unwrap();
    }
    fn write_sorting(base: &Path, config: &SyncConfig) {
        let spikes = config.layout.spike_dir(base);
        fs::create_dir_all(&spikes).unwrap();
        let mut templates = Array3::<f32>::zeros((1, 2, 2));
        templates[[0, 1, 1]] = -4.0;
        write_npy(spikes.join("spike_clusters.npy"), &arr1(&[4i64, 9, 4])).unwrap();
        write_npy(spikes.join("spike_times.npy"), &arr1(&[150_000u64, 300_000, 600_000])).unwrap();
        write_npy(spikes.join("spike_templates.npy"), &arr1(&[0i64, 0, 0])).unwrap();
        write_npy(spikes.join("templates.npy"), &templates).unwrap();
        write_npy(spikes.join("channel_positions.npy"), &arr2(&[[0.0, 20.0], [16.0, 20.0]])).unwrap();
        write_npy(spikes.join("amplitudes.npy"), &arr1(&[1.0f32, 2.0, 3.0])).unwrap();
        fs::write(
            config.layout.metrics_path(base),
            "cluster_id,firing_rate\n4,1.5\n77,0.2\n",
        )
        .unwrap();
    }
    fn write_lfp(base: &Path, config: &SyncConfig) {
        let lfp = config.layout.lfp_dir(base);
        fs::create_dir_all(&lfp).unwrap();
        let mut file = fs::File::create(lfp.join(&config.layout.lfp_file)).unwrap();
        for v in [1i16, 2, 3, 4, 5, 6] {
            file.write_all(&v.to_le_bytes()).unwrap();
        }
        write_npy(lfp.join(&config.layout.lfp_timestamps_file), &arr1(&[150_000i64, 300_000])).unwrap();
    }
    fn expected_reference(probe_sample: f64) -> f64 {
        (probe_sample / PROBE_RATE - SHIFT) / RATIO
    }
    fn test_config() -> SyncConfig {
        SyncConfig {
            lfp_channel_count: 3,
            template_sample_count: 50,
            seed: Some(11),
            ..SyncConfig::default()
        }
    }
    #[test]
    fn probe_clock_recovers_drift_and_shift() {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempfile::tempdir().unwrap();
        let config = test_config();
        write_ttl(dir.path(), &config);
        let alignment = probe_alignment(dir.path(), &reference(&config.barcode), &config).unwrap();
        assert_eq!(alignment.matched, 20);
        let transform = alignment.transform;
        assert!((transform.rate_ratio() - RATIO).abs() < 1e-6);
        for sample in [0.0, 1.5e6, 1.8e7] {
            let mapped = transform.samples_to_reference(sample);
            assert!((mapped - expected_reference(sample)).abs() < 1e-4, "{mapped}");
        }
    }
    #[test]
    fn unit_table_joins_metrics_and_units() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config();
        write_ttl(dir.path(), &config);
        write_sorting(dir.path(), &config);
        let mut rng = StdRng::seed_from_u64(3);
        let table = build_unit_table(dir.path(), &reference(&config.barcode), &config, &mut rng).unwrap();
        assert_eq!(table.keys().copied().collect::<Vec<_>>(), vec![4, 9, 77]);
        let unit = table[&4].unit.as_ref().unwrap();
        assert_eq!(unit.spike_times.len(), 2);
        assert!((unit.spike_times[0] - expected_reference(150_000.0)).abs() < 1e-4);
        assert!((unit.spike_times[1] - expected_reference(600_000.0)).abs() < 1e-4);
        assert_eq!(unit.peak_channel, 1);
        assert_eq!(unit.position, [16.0, 20.0]);
        assert!(table[&4].metrics.is_some());
        assert!(table[&9].metrics.is_none());
        assert!(table[&77].unit.is_none());
    }
    #[test]
    fn lfp_is_checked_before_alignment() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config();
        // No TTL events either; an absent LFP file must still be a clean `None`.
        let block = get_lfp_data(dir.path(), &reference(&config.barcode), &config).unwrap();
        assert!(block.is_none());
        write_ttl(dir.path(), &config);
        write_lfp(dir.path(), &config);
        let block = get_lfp_data(dir.path(), &reference(&config.barcode), &config)
            .unwrap()
            .unwrap();
        assert_eq!(block.samples().dim(), (2, 3));
        assert!((block.times()[1] - expected_reference(300_000.0)).abs() < 1e-4);
    }
    #[test]
    fn failing_probe_does_not_stop_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config();
        let good = dir.path().join("probeA");
        write_ttl(&good, &config);
        write_sorting(&good, &config);
        let probes = vec![
            ("probeA".to_string(), good),
            ("probeB".to_string(), dir.path().join("probeB")),
        ];
        let sync = reference(&config.barcode);
        let report = build_unit_tables(&probes, &sync, &config);
        assert!(!report.is_complete());
        assert_eq!(report.tables.keys().collect::<Vec<_>>(), vec!["probeA"]);
        assert!(matches!(
            report.failures.get("probeB"),
            Some(SyncError::MissingArtifact(_))
        ));
        let again = build_unit_tables(&probes, &sync, &config);
        assert_eq!(
            report.tables["probeA"][&4].unit.as_ref().unwrap().template,
            again.tables["probeA"][&4].unit.as_ref().unwrap().template
        );
    }
    #[test]
    fn unrelated_barcodes_cannot_align() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config();
        write_ttl(dir.path(), &config);
        let edges = encode_barcodes(&[2, 4, 6], 10.0, 31.0, &config.barcode);
        let other = SyncRecording::from_line_edges(
            vec!["barcode".into()],
            SYNC_RATE,
            vec![(
                to_samples(&edges.rising, SYNC_RATE),
                to_samples(&edges.falling, SYNC_RATE),
            )],
        );
        let err = probe_alignment(dir.path(), &other, &config).unwrap_err();
        assert!(matches!(err, SyncError::InsufficientOverlap { .. }));
    }
}
