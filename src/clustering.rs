//! K-Means clustering components.
//!
//! The engine is assembled from small pieces, each replaceable through a trait:
//! - [`DistanceMetric`]: dissimilarity between a point and a centroid
//! - [`PartitionStrategy`]: initial assignment of points to clusters
//! - [`EmptyClusterPolicy`]: what to do when a cluster loses all members
//! - [`LloydIterator`]: the centroid-update / reassignment loop
//! - [`OverclusterMerger`]: collapses an overclustered result to the requested count
//! - [`KMeans`]: the façade wiring all of the above together
//!
//! # Point layout
//!
//! A point set is an `N x D` matrix with one point per row. Centroid matrices use
//! the same layout (`K x D`). Assignments are `Vec<usize>` with one entry per row.

use ndarray::Array2;

use crate::error::{Error, Result};

pub mod empty_cluster;
pub mod engine;
pub mod lloyd;
pub mod merge;
pub mod metric;
pub mod partition;
pub mod stats;

pub use empty_cluster::{
    AllowEmptyClusters, EmptyClusterContext, EmptyClusterMode, EmptyClusterPolicy,
    RejectEmptyClusters, RepairEmptyClusters,
};
pub use engine::{cluster, KMeans, KMeansConfig, KMeansResult};
pub use lloyd::{LloydIterator, LloydOutcome, LloydState};
pub use merge::{MergeOutcome, OverclusterMerger};
pub use metric::{DistanceMetric, SquaredEuclidean};
pub use partition::{GivenPartition, PartitionStrategy, RandomPartition, SequentialPartition};
pub use stats::ClusterStats;

/// Build a point matrix (one point per row) from row vectors.
///
/// Fails with [`Error::InvalidArgument`] if the rows have differing lengths or
/// zero width.
pub fn points_from_rows(rows: &[Vec<f64>]) -> Result<Array2<f64>> {
    let dim = rows.first().map_or(0, Vec::len);
    if dim == 0 && !rows.is_empty() {
        return Err(Error::InvalidArgument(
            "points must have at least one dimension".to_string(),
        ));
    }
    if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != dim) {
        return Err(Error::InvalidArgument(format!(
            "point {} has {} dimensions, expected {}",
            i,
            row.len(),
            dim
        )));
    }

    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec((rows.len(), dim), flat)
        .map_err(|e| Error::InvalidArgument(e.to_string()))
}
