use ndarray::ArrayView1;

/// A dissimilarity measure between a point and a centroid.
///
/// Only the ordering of distances matters to the assignment step, so a metric
/// does not need to satisfy the triangle inequality.
pub trait DistanceMetric: Send + Sync {
    /// Compute the distance between `a` and `b`, which have equal length.
    fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64;
}

/// Squared Euclidean distance, `sum((a_i - b_i)^2)`.
///
/// Skips the square root, which does not change which centroid is nearest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SquaredEuclidean;

impl DistanceMetric for SquaredEuclidean {
    fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        a.iter()
            .zip(b.iter())
            .fold(0.0, |acc, (&x, &y)| acc + (x - y).powi(2))
    }
}
