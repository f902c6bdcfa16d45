//! Data loading utilities
//!
//! Reads the feature matrix and label vector from NumPy `.npy` files, with
//! headerless CSV as a fallback format.

use crate::dataset::Dataset;
use crate::error::{PolyError, Result};
use ndarray::{Array, Array1, Array2, Dimension, Ix1, Ix2};
use ndarray_npy::read_npy;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// On-disk array format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayFormat {
    Npy,
    Csv,
}

impl ArrayFormat {
    /// Detect format from extension, defaulting to `.npy`
    pub fn detect(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()).map(str::to_lowercase) {
            Some(ext) if ext == "csv" || ext == "txt" => ArrayFormat::Csv,
            _ => ArrayFormat::Npy,
        }
    }
}

/// Loader for the two flat numeric arrays the harness consumes
#[derive(Debug, Clone, Default)]
pub struct DataLoader {
    /// Whether CSV inputs carry a header row
    has_header: bool,
}

impl DataLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat the first CSV row as a header
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Load the feature matrix (N x D)
    pub fn load_features(&self, path: &Path) -> Result<Array2<f64>> {
        let features = match ArrayFormat::detect(path) {
            ArrayFormat::Npy => {
                std::fs::metadata(path)?;
                match read_npy_f64::<Ix2>(path) {
                    Ok(x) => x,
                    // A flat array is a single feature column
                    Err(_) => {
                        let flat = read_npy_f64::<Ix1>(path)?;
                        let n = flat.len();
                        flat.into_shape_with_order((n, 1))?
                    }
                }
            }
            ArrayFormat::Csv => self.load_csv_matrix(path)?,
        };

        debug!(path = %path.display(), rows = features.nrows(), cols = features.ncols(), "Loaded features");
        Ok(features)
    }

    /// Load the label vector (length N, or an N x 1 matrix)
    pub fn load_labels(&self, path: &Path) -> Result<Array1<f64>> {
        let labels = match ArrayFormat::detect(path) {
            ArrayFormat::Npy => {
                std::fs::metadata(path)?;
                match read_npy_f64::<Ix1>(path) {
                    Ok(y) => y,
                    Err(_) => column_vector(read_npy_f64::<Ix2>(path)?)?,
                }
            }
            ArrayFormat::Csv => column_vector(self.load_csv_matrix(path)?)?,
        };

        debug!(path = %path.display(), len = labels.len(), "Loaded labels");
        Ok(labels)
    }

    /// Load both arrays and validate them as a [`Dataset`]
    pub fn load_dataset(&self, features_path: &Path, labels_path: &Path) -> Result<Dataset> {
        let features = self.load_features(features_path)?;
        let labels = self.load_labels(labels_path)?;
        Dataset::new(features, labels)
    }

    fn load_csv_matrix(&self, path: &Path) -> Result<Array2<f64>> {
        let file = File::open(path)?;
        let df = CsvReadOptions::default()
            .with_has_header(self.has_header)
            .with_infer_schema_length(Some(100))
            .into_reader_with_file_handle(file)
            .finish()?;

        frame_to_array2(&df)
    }
}

/// Copy every column of a numeric DataFrame into a row-major matrix
pub fn frame_to_array2(df: &DataFrame) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = df.width();

    let col_data: Vec<Vec<f64>> = df
        .get_columns()
        .iter()
        .map(|column| {
            let as_f64 = column.cast(&DataType::Float64)?;
            as_f64
                .f64()?
                .into_iter()
                .enumerate()
                .map(|(row, v)| {
                    v.ok_or_else(|| {
                        PolyError::Data(format!("missing value in column '{}' at row {}", column.name(), row))
                    })
                })
                .collect::<Result<Vec<f64>>>()
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;

    Ok(Array2::from_shape_fn((n_rows, n_cols), |(r, c)| col_data[c][r]))
}

/// Accept an N x 1 matrix as a label vector
fn column_vector(matrix: Array2<f64>) -> Result<Array1<f64>> {
    if matrix.ncols() != 1 {
        return Err(PolyError::shape(
            "a 1-D label array or an N x 1 matrix",
            format!("{} x {}", matrix.nrows(), matrix.ncols()),
        ));
    }
    Ok(matrix.column(0).to_owned())
}

/// Read an `.npy` array of any common numeric dtype as `f64`
fn read_npy_f64<D: Dimension>(path: &Path) -> Result<Array<f64, D>> {
    let first_err = match read_npy::<_, Array<f64, D>>(path) {
        Ok(a) => return Ok(a),
        Err(e) => e,
    };
    if let Ok(a) = read_npy::<_, Array<f32, D>>(path) {
        return Ok(a.mapv(f64::from));
    }
    if let Ok(a) = read_npy::<_, Array<i64, D>>(path) {
        return Ok(a.mapv(|v| v as f64));
    }
    if let Ok(a) = read_npy::<_, Array<i32, D>>(path) {
        return Ok(a.mapv(f64::from));
    }
    if let Ok(a) = read_npy::<_, Array<u8, D>>(path) {
        return Ok(a.mapv(f64::from));
    }
    if let Ok(a) = read_npy::<_, Array<bool, D>>(path) {
        return Ok(a.mapv(|v| if v { 1.0 } else { 0.0 }));
    }
    Err(first_err.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use ndarray_npy::write_npy;

    #[test]
    fn test_detect_format() {
        assert_eq!(ArrayFormat::detect(Path::new("data.npy")), ArrayFormat::Npy);
        assert_eq!(ArrayFormat::detect(Path::new("data.CSV")), ArrayFormat::Csv);
        assert_eq!(ArrayFormat::detect(Path::new("data")), ArrayFormat::Npy);
    }

    #[test]
    fn test_load_npy_features_and_int_labels() {
        let dir = tempfile::tempdir().unwrap();
        let x_path = dir.path().join("data.npy");
        let y_path = dir.path().join("labels.npy");
        write_npy(&x_path, &array![[1.0f64, 2.0], [3.0, 4.0]]).unwrap();
        write_npy(&y_path, &array![0i64, 1]).unwrap();

        let ds = DataLoader::new().load_dataset(&x_path, &y_path).unwrap();
        assert_eq!(ds.n_samples(), 2);
        assert_eq!(ds.labels(), &array![0.0, 1.0]);
    }

    #[test]
    fn test_load_column_labels() {
        let dir = tempfile::tempdir().unwrap();
        let y_path = dir.path().join("labels.npy");
        write_npy(&y_path, &array![[1.0f32], [2.0], [3.0]]).unwrap();

        let y = DataLoader::new().load_labels(&y_path).unwrap();
        assert_eq!(y, array![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_load_csv_matrix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "1.0,2.0\n3.0,4.0\n5.0,6.0\n").unwrap();

        let x = DataLoader::new().load_features(&path).unwrap();
        assert_eq!(x.dim(), (3, 2));
        assert_eq!(x[[2, 1]], 6.0);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = DataLoader::new().load_features(Path::new("/nonexistent/data.npy")).unwrap_err();
        assert!(matches!(err, PolyError::Io(_)));
    }
}
