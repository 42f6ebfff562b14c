// src/sync/npy.rs
// Sorting and acquisition tools disagree on integer widths between versions, so
// artifacts are read as whatever dtype is on disk and widened.
use std::path::Path;
use ndarray::ArrayD;
use ndarray_npy::{read_npy, ReadNpyError, ReadableElement};
use crate::sync::error::SyncError;
pub fn require(path: &Path) -> Result<(), SyncError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(SyncError::MissingArtifact(path.to_path_buf()))
    }
}
fn try_read<T: ReadableElement>(path: &Path) -> Result<Option<ArrayD<T>>, SyncError> {
    match read_npy::<_, ArrayD<T>>(path) {
        Ok(array) => Ok(Some(array)),
        Err(ReadNpyError::WrongDescriptor(_)) => Ok(None),
        Err(source) => Err(SyncError::Npy {
            path: path.to_path_buf(),
            source,
        }),
    }
}
macro_rules! widen {
    ($path:expr, $out:ty, [$($ty:ty),+]) => {
        $(
            if let Some(array) = try_read::<$ty>($path)? {
                return Ok(array.mapv(|v| v as $out));
            }
        )+
    };
}
/// Reads an integer array of any width as `i64`.
pub fn read_integers(path: &Path) -> Result<ArrayD<i64>, SyncError> {
    require(path)?;
    widen!(path, i64, [u64, i32, u32, i16, u16, i8, u8]);
    read_exact(path)
}
/// Reads a float array (`f64` or `f32`) as `f64`.
pub fn read_floats(path: &Path) -> Result<ArrayD<f64>, SyncError> {
    require(path)?;
    widen!(path, f64, [f32]);
    read_exact(path)
}
/// Flattened integer array, in logical order.
pub fn read_index_vec(path: &Path) -> Result<Vec<i64>, SyncError> {
    Ok(read_integers(path)?.iter().copied().collect())
}
fn read_exact<T: ReadableElement>(path: &Path) -> Result<ArrayD<T>, SyncError> {
    read_npy(path).map_err(|source| SyncError::Npy {
        path: path.to_path_buf(),
        source,
    })
}
#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};
    use ndarray_npy::write_npy;
    #[test]
    fn narrow_integers_widen_to_i64() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spike_templates.npy");
        write_npy(&path, &arr2(&[[3u32], [1], [2]])).unwrap();
        assert_eq!(read_index_vec(&path).unwrap(), vec![3, 1, 2]);
    }
    #[test]
    fn f32_widen_to_f64() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("amplitudes.npy");
        write_npy(&path, &arr1(&[0.5f32, 1.25])).unwrap();
        let values = read_floats(&path).unwrap();
        assert_eq!(values.shape(), &[2]);
        assert_eq!(values[[1]], 1.25);
    }
    #[test]
    fn missing_file_is_a_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_floats(&dir.path().join("templates.npy")).unwrap_err();
        assert!(matches!(err, SyncError::MissingArtifact(_)));
    }
    #[test]
    fn float_file_is_not_an_integer_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("channel_states.npy");
        write_npy(&path, &arr1(&[1.0f64, -1.0])).unwrap();
        assert!(matches!(read_integers(&path), Err(SyncError::Npy { .. })));
    }
}
