//! The clustering façade: partition, iterate, and optionally overcluster and merge.

use log::{info, warn};
use ndarray::{Array2, ArrayView2};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use super::empty_cluster::{EmptyClusterMode, EmptyClusterPolicy, RepairEmptyClusters};
use super::lloyd::{LloydIterator, LloydOutcome, LloydState};
use super::merge::OverclusterMerger;
use super::metric::{DistanceMetric, SquaredEuclidean};
use super::partition::{check_cluster_count, PartitionStrategy, RandomPartition};
use super::stats::ClusterStats;
use crate::error::{Error, Result};

/// Default cap on Lloyd rounds.
pub const DEFAULT_MAX_ITERATIONS: usize = 1000;

/// Configuration options for k-means clustering.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansConfig {
    /// Maximum number of Lloyd rounds per run. Zero performs no rounds.
    pub max_iterations: usize,
    /// Cluster `round(k * overclustering)` first, then merge down to `k`.
    /// Must be at least 1.
    pub overclustering: f64,
    /// Seed for the engine's random source; `None` draws one from the OS.
    pub seed: Option<u64>,
    /// Reassign points on the rayon thread pool.
    pub parallel: bool,
    /// Run Lloyd rounds again at `k` after merging.
    pub merge_refinement: bool,
}

impl KMeansConfig {
    /// Create a new config with default values: 1000 rounds, no
    /// overclustering, entropy seed, sequential, refinement after merging.
    pub fn new() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            overclustering: 1.0,
            seed: None,
            parallel: false,
            merge_refinement: true,
        }
    }

    /// Customize the maximum number of Lloyd rounds.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Customize the overclustering factor.
    pub fn with_overclustering(mut self, overclustering: f64) -> Self {
        self.overclustering = overclustering;
        self
    }

    /// Seed the random source for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Enable or disable parallel reassignment.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Enable or disable the Lloyd run that follows merging.
    pub fn with_merge_refinement(mut self, merge_refinement: bool) -> Self {
        self.merge_refinement = merge_refinement;
        self
    }
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a clustering run produces.
#[derive(Debug, Clone)]
pub struct KMeansResult {
    /// Cluster index in `0..k` per point, in point order.
    pub assignments: Vec<usize>,
    /// `k` centroids, one per row.
    pub centroids: Array2<f64>,
    /// Member count per cluster.
    pub counts: Vec<usize>,
    /// Sum of metric distances from each point to its centroid.
    pub inertia: f64,
    /// Cluster count used before merging (equal to `k` without overclustering).
    pub overclustered_k: usize,
    /// Pairwise merges performed.
    pub merges: usize,
    /// Lloyd rounds performed, including refinement after merging.
    pub iterations: usize,
    /// Terminal state of the last Lloyd run.
    pub state: LloydState,
}

impl KMeansResult {
    fn from_lloyd(
        outcome: LloydOutcome,
        overclustered_k: usize,
        merges: usize,
        iterations: usize,
    ) -> Self {
        Self {
            assignments: outcome.assignments,
            centroids: outcome.centroids,
            counts: outcome.stats.counts().to_vec(),
            inertia: outcome.stats.total_cost(),
            overclustered_k,
            merges,
            iterations,
            state: outcome.state,
        }
    }
}

/// K-Means clustering engine.
///
/// Generic over the distance metric, the initial partition and the
/// empty-cluster policy; the defaults are squared Euclidean distance, a random
/// partition and repair of empty clusters. The random source is owned by the
/// engine, so two engines built from the same seed produce the same results.
#[derive(Debug, Clone)]
pub struct KMeans<M = SquaredEuclidean, P = RandomPartition, E = RepairEmptyClusters> {
    config: KMeansConfig,
    metric: M,
    partition: P,
    policy: E,
    rng: ChaCha20Rng,
}

impl KMeans {
    /// Create an engine with the default strategies.
    pub fn new(config: KMeansConfig) -> Self {
        Self::with_strategies(config, SquaredEuclidean, RandomPartition, RepairEmptyClusters)
    }
}

impl<M, P, E> KMeans<M, P, E> {
    /// Create an engine with custom strategies.
    pub fn with_strategies(config: KMeansConfig, metric: M, partition: P, policy: E) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha20Rng::seed_from_u64(seed),
            None => ChaCha20Rng::from_entropy(),
        };
        Self {
            config,
            metric,
            partition,
            policy,
            rng,
        }
    }

    pub fn config(&self) -> &KMeansConfig {
        &self.config
    }
}

impl<M, P, E> KMeans<M, P, E>
where
    M: DistanceMetric,
    P: PartitionStrategy,
    E: EmptyClusterPolicy,
{
    /// Cluster the rows of `points` into `k` clusters and return the assignment.
    pub fn cluster(&mut self, points: ArrayView2<f64>, k: usize) -> Result<Vec<usize>> {
        Ok(self.fit(points, k)?.assignments)
    }

    /// Cluster the rows of `points` into `k` clusters.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `k` is 0 or the points have no dimensions
    /// - [`Error::InvalidOverclusteringFactor`] if the factor is below 1
    /// - [`Error::InvalidClusterCount`] if `k` exceeds the number of points
    /// - whatever the empty-cluster policy raises
    pub fn fit(&mut self, points: ArrayView2<f64>, k: usize) -> Result<KMeansResult> {
        if k == 0 {
            return Err(Error::InvalidArgument(
                "number of clusters must be at least 1".to_string(),
            ));
        }
        let factor = self.config.overclustering;
        if factor.is_nan() || factor < 1.0 {
            return Err(Error::InvalidOverclusteringFactor(factor));
        }
        if points.ncols() == 0 {
            return Err(Error::InvalidArgument(
                "points must have at least one dimension".to_string(),
            ));
        }
        let n = points.nrows();
        check_cluster_count(k, n)?;

        let overclustered_k = overclustered_k(k, factor, n);
        info!(
            "clustering {} points of dimension {} into {} clusters (searching {})",
            n,
            points.ncols(),
            k,
            overclustered_k
        );

        let initial = self
            .partition
            .partition(points, overclustered_k, &mut self.rng)?;
        let outcome = self.lloyd(points, overclustered_k, initial)?;
        if overclustered_k == k {
            let iterations = outcome.iterations;
            return Ok(KMeansResult::from_lloyd(outcome, k, 0, iterations));
        }

        let merged = OverclusterMerger::new(&self.metric).merge(
            outcome.assignments,
            outcome.centroids,
            k,
        )?;

        if self.config.merge_refinement {
            let refined = self.lloyd(points, k, merged.assignments)?;
            let iterations = outcome.iterations + refined.iterations;
            return Ok(KMeansResult::from_lloyd(
                refined,
                overclustered_k,
                merged.merges,
                iterations,
            ));
        }

        let stats = ClusterStats::compute(
            points,
            &merged.assignments,
            merged.centroids.view(),
            &self.metric,
        );
        Ok(KMeansResult {
            assignments: merged.assignments,
            centroids: merged.centroids,
            counts: merged.counts,
            inertia: stats.total_cost(),
            overclustered_k,
            merges: merged.merges,
            iterations: outcome.iterations,
            state: outcome.state,
        })
    }

    fn lloyd(
        &self,
        points: ArrayView2<f64>,
        k: usize,
        initial: Vec<usize>,
    ) -> Result<LloydOutcome> {
        LloydIterator::new(
            points.reborrow(),
            k,
            initial,
            &self.metric,
            &self.policy,
            self.config.max_iterations,
        )?
        .with_parallel(self.config.parallel)
        .run()
    }
}

/// `max(k, round(k * factor))`, clamped to the number of points.
fn overclustered_k(k: usize, factor: f64, n_points: usize) -> usize {
    let wanted = ((k as f64) * factor).round() as usize;
    let wanted = wanted.max(k);
    if wanted > n_points {
        warn!(
            "overclustering to {} clusters exceeds {} points; using {}",
            wanted, n_points, n_points
        );
        return n_points;
    }
    wanted
}

/// Cluster `points` (one per row) into `k` clusters with squared Euclidean
/// distance and a random initial partition.
///
/// This is the checked entry point for callers holding raw, possibly signed
/// parameters: a negative `max_iterations` is rejected with
/// [`Error::InvalidArgument`] before anything runs.
pub fn cluster(
    points: ArrayView2<f64>,
    k: usize,
    max_iterations: i64,
    overcluster_factor: f64,
    mode: EmptyClusterMode,
    seed: Option<u64>,
) -> Result<Vec<usize>> {
    if max_iterations < 0 {
        return Err(Error::InvalidArgument(format!(
            "maximum iterations must be non-negative, got {}",
            max_iterations
        )));
    }

    let mut config = KMeansConfig::new()
        .with_max_iterations(max_iterations as usize)
        .with_overclustering(overcluster_factor);
    config.seed = seed;

    KMeans::with_strategies(config, SquaredEuclidean, RandomPartition, mode).cluster(points, k)
}
