//! Error type shared by every clustering component.

use thiserror::Error;

/// Errors produced while clustering.
///
/// Every error aborts the run: a failed call never yields a partial assignment.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A caller-supplied argument is out of range (cluster count, iteration cap,
    /// malformed point matrix or initial assignment).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The requested number of clusters cannot be partitioned out of the points.
    #[error("invalid number of clusters {k} for a dataset of {n_points} points")]
    InvalidClusterCount { k: usize, n_points: usize },

    /// A cluster lost all of its members under the rejecting policy.
    #[error("cluster {cluster} became empty during iteration {iteration}")]
    EmptyCluster { cluster: usize, iteration: usize },

    /// The repair policy could not find a point to move into an empty cluster.
    #[error("could not repair empty cluster {cluster}")]
    RepairFailed { cluster: usize },

    /// The overclustering factor is below 1 (or not a number).
    #[error("invalid overclustering factor {0}: must be greater than or equal to 1")]
    InvalidOverclusteringFactor(f64),
}

/// Result type for clustering operations
pub type Result<T> = std::result::Result<T, Error>;
