//! Data preprocessing module
//!
//! Feature standardization applied per cross-validation fold.

mod scaler;

pub use scaler::{ScalerParams, StandardScaler};
