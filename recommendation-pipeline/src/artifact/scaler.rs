use common::error::AppError;
use serde::{Deserialize, Serialize};

/// Fitted per-feature numeric transform applied before neighbor lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureScaler {
    /// `(x - mean) / scale`
    Standard { mean: Vec<f64>, scale: Vec<f64> },
    /// `x * scale + min`
    MinMax { min: Vec<f64>, scale: Vec<f64> },
}

impl FeatureScaler {
    pub fn width(&self) -> usize {
        match self {
            Self::Standard { scale, .. } | Self::MinMax { scale, .. } => scale.len(),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), AppError> {
        let (offsets, scale) = match self {
            Self::Standard { mean, scale } => (mean, scale),
            Self::MinMax { min, scale } => (min, scale),
        };
        if offsets.len() != scale.len() {
            return Err(AppError::Artifact(format!(
                "scaler has {} offsets but {} scale factors",
                offsets.len(),
                scale.len()
            )));
        }
        Ok(())
    }

    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>, AppError> {
        if row.len() != self.width() {
            return Err(AppError::Computation(format!(
                "scaler expects {} features, got {}",
                self.width(),
                row.len()
            )));
        }

        let scaled = match self {
            Self::Standard { mean, scale } => row
                .iter()
                .zip(mean)
                .zip(scale)
                .map(|((value, mean), scale)| (value - mean) / non_zero(*scale))
                .collect(),
            Self::MinMax { min, scale } => row
                .iter()
                .zip(min)
                .zip(scale)
                .map(|((value, min), scale)| value.mul_add(*scale, *min))
                .collect(),
        };
        Ok(scaled)
    }
}

// Constant features are stored with a zero scale; treat them as unit scale.
fn non_zero(scale: f64) -> f64 {
    if scale.abs() < f64::EPSILON {
        1.0
    } else {
        scale
    }
}
