use crate::sync::dataset::{EdgeUnits, LineRef, SyncDataset};
use crate::sync::error::SyncError;
/// Rising and falling edge times of one digital line, in seconds on that line's clock.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EdgeStream {
    pub rising: Vec<f64>,
    pub falling: Vec<f64>,
}
impl EdgeStream {
    pub fn new(rising: Vec<f64>, falling: Vec<f64>) -> Self {
        Self { rising, falling }
    }
    /// Splits an event log of signed channel states and raw sample counts into edges.
    ///
    /// Positive states are rising edges, negative states falling; zero entries are ignored.
    pub fn from_channel_states(states: &[i64], samples: &[i64], sample_rate: f64) -> Self {
        let mut rising = Vec::new();
        let mut falling = Vec::new();
        for (&state, &sample) in states.iter().zip(samples) {
            let t = sample as f64 / sample_rate;
            if state > 0 {
                rising.push(t);
            } else if state < 0 {
                falling.push(t);
            }
        }
        Self { rising, falling }
    }
}
/// Resolves a line reference to the board's bit index.
pub fn resolve_line(dataset: &dyn SyncDataset, line: &LineRef) -> Result<usize, SyncError> {
    match line {
        LineRef::Index(index) if *index < dataset.line_count() => Ok(*index),
        LineRef::Index(_) => Err(SyncError::LineNotFound(line.to_string())),
        LineRef::Label(label) => dataset
            .line_labels()
            .iter()
            .position(|l| l == label)
            .ok_or_else(|| SyncError::LineNotFound(label.clone())),
    }
}
/// Edge times in seconds for a labelled or indexed line of the reference recording.
pub fn get_edges(dataset: &dyn SyncDataset, line: &LineRef) -> Result<EdgeStream, SyncError> {
    let index = resolve_line(dataset, line)?;
    Ok(EdgeStream {
        rising: dataset.rising_edges(index, EdgeUnits::Seconds),
        falling: dataset.falling_edges(index, EdgeUnits::Seconds),
    })
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::dataset::SyncRecording;
    fn recording() -> SyncRecording {
        SyncRecording::from_line_edges(
            vec!["barcode".into(), "vsync_stim".into()],
            100.0,
            vec![(vec![100, 300], vec![200]), (vec![50], vec![150, 250])],
        )
    }
    #[test]
    fn label_and_index_resolve_to_same_line() {
        let rec = recording();
        let by_label = get_edges(&rec, &LineRef::label("vsync_stim")).unwrap();
        let by_index = get_edges(&rec, &LineRef::Index(1)).unwrap();
        assert_eq!(by_label, by_index);
        assert_eq!(by_label.rising, vec![0.5]);
        assert_eq!(by_label.falling, vec![1.5, 2.5]);
    }
    #[test]
    fn unknown_label_is_an_error() {
        let err = get_edges(&recording(), &LineRef::label("photodiode")).unwrap_err();
        assert!(matches!(err, SyncError::LineNotFound(ref l) if l == "photodiode"));
    }
    #[test]
    fn out_of_range_index_is_an_error() {
        let err = get_edges(&recording(), &LineRef::Index(2)).unwrap_err();
        assert!(matches!(err, SyncError::LineNotFound(ref l) if l == "#2"));
        let rec = SyncRecording::from_events(vec![], 10.0, &[(5, 0b1)]);
        assert!(resolve_line(&rec, &LineRef::Index(31)).is_ok());
        assert!(resolve_line(&rec, &LineRef::Index(32)).is_err());
    }
    #[test]
    fn channel_states_split_by_polarity() {
        let edges = EdgeStream::from_channel_states(&[1, -1, 0, 1], &[300, 600, 700, 900], 300.0);
        assert_eq!(edges.rising, vec![1.0, 3.0]);
        assert_eq!(edges.falling, vec![2.0]);
    }
}
