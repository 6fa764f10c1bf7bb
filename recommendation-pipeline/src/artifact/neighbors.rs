use common::error::AppError;
use serde::{Deserialize, Serialize};

use super::RowIndex;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    #[default]
    #[serde(alias = "minkowski", alias = "l2")]
    Euclidean,
    #[serde(alias = "l1", alias = "cityblock")]
    Manhattan,
    Cosine,
}

impl DistanceMetric {
    fn distance(self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            Self::Euclidean => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y).powi(2))
                .sum::<f64>()
                .sqrt(),
            Self::Manhattan => a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum(),
            Self::Cosine => {
                let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
                let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
                let norm_b = b.iter().map(|y| y * y).sum::<f64>().sqrt();
                if norm_a <= 0.0 || norm_b <= 0.0 {
                    1.0
                } else {
                    1.0 - dot / (norm_a * norm_b)
                }
            }
        }
    }
}

/// A neighbor hit, addressed by catalog row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub row: RowIndex,
    pub distance: f64,
}

/// Brute-force nearest-neighbor index over the scaled feature vectors the
/// model was fitted on. Sample `i` corresponds to catalog row `i`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighborIndex {
    #[serde(default)]
    metric: DistanceMetric,
    samples: Vec<Vec<f64>>,
}

impl NeighborIndex {
    pub fn new(metric: DistanceMetric, samples: Vec<Vec<f64>>) -> Self {
        Self { metric, samples }
    }

    pub const fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn width(&self) -> Option<usize> {
        self.samples.first().map(Vec::len)
    }

    pub(crate) fn validate(&self) -> Result<(), AppError> {
        let Some(width) = self.width() else {
            return Ok(());
        };
        if let Some(position) = self.samples.iter().position(|s| s.len() != width) {
            return Err(AppError::Artifact(format!(
                "neighbor sample {position} has a different width than sample 0 ({width})"
            )));
        }
        Ok(())
    }

    /// Returns up to `k` samples ordered by ascending distance to `query`.
    /// Equal distances keep sample order.
    pub fn kneighbors(&self, query: &[f64], k: usize) -> Result<Vec<Neighbor>, AppError> {
        if let Some(width) = self.width() {
            if width != query.len() {
                return Err(AppError::Computation(format!(
                    "neighbor index expects {width} dimensions, got {}",
                    query.len()
                )));
            }
        }

        let mut hits: Vec<Neighbor> = self
            .samples
            .iter()
            .enumerate()
            .map(|(position, sample)| Neighbor {
                row: RowIndex::new(position),
                distance: self.metric.distance(sample, query),
            })
            .collect();

        if hits.iter().any(|hit| hit.distance.is_nan()) {
            return Err(AppError::Computation(
                "neighbor distance is not a number".to_string(),
            ));
        }

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        Ok(hits)
    }
}
