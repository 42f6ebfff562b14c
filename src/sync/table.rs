// src/sync/table.rs
use std::collections::BTreeMap;
use std::path::Path;
use log::debug;
use serde::Serialize;
use crate::sync::error::SyncError;
use crate::sync::npy;
use crate::sync::units::{Unit, Units};
const CLUSTER_ID: &str = "cluster_id";
/// One cell of the upstream quality-metrics table.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
}
impl MetricValue {
    fn parse(cell: &str) -> Option<Self> {
        let cell = cell.trim();
        if cell.is_empty() {
            return None;
        }
        Some(match cell.parse::<f64>() {
            Ok(number) => MetricValue::Number(number),
            Err(_) => MetricValue::Text(cell.to_owned()),
        })
    }
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Number(n) => Some(*n),
            MetricValue::Text(_) => None,
        }
    }
}
/// Metric name to value; empty cells are left out.
pub type MetricRow = BTreeMap<String, MetricValue>;
pub type UnitMetrics = BTreeMap<i64, MetricRow>;
/// Reads a quality-metrics CSV keyed by its `cluster_id` column.
pub fn read_unit_metrics(path: &Path) -> Result<UnitMetrics, SyncError> {
    npy::require(path)?;
    let bad = |reason: String| SyncError::Metrics {
        path: path.to_path_buf(),
        reason,
    };
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let id_column = headers
        .iter()
        .position(|h| h.trim() == CLUSTER_ID)
        .ok_or_else(|| bad(format!("no '{CLUSTER_ID}' column")))?;
    let mut metrics = UnitMetrics::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let id_cell = record.get(id_column).unwrap_or_default().trim();
        let cluster_id = parse_cluster_id(id_cell)
            .ok_or_else(|| bad(format!("row {}: cluster id '{id_cell}'", line + 1)))?;
        let row: MetricRow = headers
            .iter()
            .zip(record.iter())
            .enumerate()
            .filter(|(column, (name, _))| *column != id_column && !name.trim().is_empty())
            .filter_map(|(_, (name, cell))| {
                MetricValue::parse(cell).map(|value| (name.trim().to_owned(), value))
            })
            .collect();
        metrics.insert(cluster_id, row);
    }
    debug!("read metrics for {} cluster(s) from {}", metrics.len(), path.display());
    Ok(metrics)
}
fn parse_cluster_id(cell: &str) -> Option<i64> {
    cell.parse::<i64>().ok().or_else(|| {
        let value = cell.parse::<f64>().ok()?;
        (value.fract() == 0.0).then_some(value as i64)
    })
}
/// A cluster's row after the outer join; either side may be absent.
#[derive(Clone, Debug, Default, Serialize)]
pub struct UnitRecord {
    pub metrics: Option<MetricRow>,
    pub unit: Option<Unit>,
}
pub type UnitTable = BTreeMap<i64, UnitRecord>;
/// Outer-joins metrics and units on cluster id.
pub fn merge_unit_table(metrics: UnitMetrics, units: Units) -> UnitTable {
    let mut table = UnitTable::new();
    for (cluster_id, row) in metrics {
        table.entry(cluster_id).or_default().metrics = Some(row);
    }
    for (cluster_id, unit) in units {
        table.entry(cluster_id).or_default().unit = Some(unit);
    }
    table
}
