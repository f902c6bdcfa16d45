//! Per-feature standardization fit on a training partition

use crate::error::{PolyError, Result};
use ndarray::{Array1, Array2, Axis};
use tracing::warn;

/// Fitted centering/scaling parameters for one feature
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalerParams {
    pub center: f64,
    pub scale: f64,
}

/// Standard scaling (z-score normalization): (x - mean) / std
///
/// Uses the population standard deviation, so a fitted matrix transforms to
/// mean 0 and variance 1 column-wise. Constant columns keep scale 1.
#[derive(Debug, Clone, Default)]
pub struct StandardScaler {
    params: Vec<ScalerParams>,
    is_fitted: bool,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn per-column mean and standard deviation
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if x.nrows() == 0 {
            return Err(PolyError::shape("at least one row to fit the scaler", "0 rows"));
        }

        let means = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
        let stds = x.std_axis(Axis(0), 0.0);

        self.params = means
            .iter()
            .zip(stds.iter())
            .enumerate()
            .map(|(j, (&center, &std))| {
                let scale = if std > f64::EPSILON {
                    std
                } else {
                    warn!(feature = j, "Zero-variance feature, leaving it unscaled");
                    1.0
                };
                ScalerParams { center, scale }
            })
            .collect();
        self.is_fitted = true;

        Ok(self)
    }

    /// Apply the fitted parameters to a matrix with the same columns
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(PolyError::ModelNotFitted);
        }
        if x.ncols() != self.params.len() {
            return Err(PolyError::shape(
                format!("{} columns", self.params.len()),
                format!("{} columns", x.ncols()),
            ));
        }

        let mut out = x.clone();
        for (mut column, p) in out.axis_iter_mut(Axis(1)).zip(self.params.iter()) {
            column.mapv_inplace(|v| (v - p.center) / p.scale);
        }
        Ok(out)
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    pub fn params(&self) -> &[ScalerParams] {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_standard_scaler() {
        let x = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0], [5.0, 50.0]];
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&x).unwrap();

        for col in scaled.axis_iter(Axis(1)) {
            let mean = col.mean().unwrap();
            let var = col.mapv(|v| (v - mean).powi(2)).mean().unwrap();
            assert!(mean.abs() < 1e-10);
            assert!((var - 1.0).abs() < 1e-10);
        }
    }

    #[test]
    fn test_constant_column_unscaled() {
        let x = array![[1.0, 7.0], [2.0, 7.0], [3.0, 7.0]];
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(&x).unwrap();
        assert_eq!(scaler.params()[1].scale, 1.0);
        assert!(scaled.column(1).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_transform_uses_fit_statistics() {
        let train = array![[0.0], [2.0]];
        let test = array![[4.0]];
        let mut scaler = StandardScaler::new();
        scaler.fit(&train).unwrap();
        // mean 1, population std 1
        assert_eq!(scaler.transform(&test).unwrap()[[0, 0]], 3.0);
    }

    #[test]
    fn test_transform_before_fit() {
        let scaler = StandardScaler::new();
        assert!(matches!(scaler.transform(&array![[1.0]]), Err(PolyError::ModelNotFitted)));
    }
}
