//! # kmeans-engine
//!
//! Partition-based clustering of a fixed point set with classical Lloyd
//! iterations plus two policy layers:
//!
//! - **Overclustering**: find `round(k * factor)` clusters first, then merge the
//!   closest pairs until `k` remain, which makes the result less sensitive to a
//!   poor initial partition.
//! - **Empty-cluster handling**: when an iteration leaves a cluster without
//!   members, either fail, leave it empty, or refill it with the point furthest
//!   from the centroid of the cluster with the largest spread.
//!
//! Points are passed as an `ndarray` matrix with one point per row.
//!
//! ```rust
//! use kmeans_engine::{points_from_rows, KMeans, KMeansConfig};
//!
//! let points = points_from_rows(&[
//!     vec![1.0, 2.0],
//!     vec![1.5, 1.8],
//!     vec![5.0, 8.0],
//!     vec![8.0, 8.0],
//! ])
//! .unwrap();
//!
//! let config = KMeansConfig::new().with_seed(7).with_overclustering(1.5);
//! let mut kmeans = KMeans::new(config);
//! let assignments = kmeans.cluster(points.view(), 2).unwrap();
//!
//! assert_eq!(assignments.len(), 4);
//! assert!(assignments.iter().all(|&c| c < 2));
//! ```

pub mod clustering;
pub mod error;

pub use clustering::{
    cluster, points_from_rows, AllowEmptyClusters, ClusterStats, DistanceMetric,
    EmptyClusterContext, EmptyClusterMode, EmptyClusterPolicy, GivenPartition, KMeans,
    KMeansConfig, KMeansResult, LloydIterator, LloydOutcome, LloydState, MergeOutcome,
    OverclusterMerger, PartitionStrategy, RandomPartition, RejectEmptyClusters,
    RepairEmptyClusters, SequentialPartition, SquaredEuclidean,
};
pub use error::{Error, Result};
