//! The Lloyd iteration: alternate centroid updates and nearest-centroid
//! reassignment until the assignment stops changing or the round budget runs out.

use log::{debug, info};
use ndarray::{Array2, ArrayView1, ArrayView2};
use rayon::prelude::*;

use super::empty_cluster::{EmptyClusterContext, EmptyClusterPolicy};
use super::metric::DistanceMetric;
use super::partition::check_cluster_count;
use super::stats::ClusterStats;
use crate::error::{Error, Result};

/// Where a [`LloydIterator`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LloydState {
    /// Built from an initial assignment; no round has run yet.
    Initialized,
    /// At least one round has run and the assignment is still moving.
    Iterating,
    /// A round finished without any point changing cluster.
    Converged,
    /// The round budget was used up before convergence. Not an error.
    MaxIterationsReached,
}

impl LloydState {
    pub fn is_terminal(self) -> bool {
        matches!(self, LloydState::Converged | LloydState::MaxIterationsReached)
    }
}

/// Result of a completed Lloyd run.
#[derive(Debug, Clone)]
pub struct LloydOutcome {
    /// Cluster index per point, in point order.
    pub assignments: Vec<usize>,
    /// One centroid per row; each is the mean of its members.
    pub centroids: Array2<f64>,
    /// Member counts and costs matching `assignments` and `centroids`.
    pub stats: ClusterStats,
    /// Number of reassignment rounds performed.
    pub iterations: usize,
    /// Terminal state.
    pub state: LloydState,
}

/// Runs Lloyd rounds over a borrowed point set.
///
/// Each round:
/// 1. recomputes every centroid as the mean of its members (an empty cluster
///    keeps its previous centroid),
/// 2. hands each empty cluster to the [`EmptyClusterPolicy`],
/// 3. moves every point to its nearest centroid, ties going to the lowest index.
///
/// When iteration stops, one more centroid update and policy pass is applied so
/// the returned centroids are the means of the returned assignment.
#[derive(Debug)]
pub struct LloydIterator<'a, M, E> {
    points: ArrayView2<'a, f64>,
    metric: &'a M,
    policy: &'a E,
    max_iterations: usize,
    parallel: bool,
    assignments: Vec<usize>,
    centroids: Array2<f64>,
    iteration: usize,
    state: LloydState,
}

impl<'a, M: DistanceMetric, E: EmptyClusterPolicy> LloydIterator<'a, M, E> {
    /// Prepare a run of at most `max_iterations` rounds over `k` clusters,
    /// starting from `initial` (one cluster index per row of `points`).
    pub fn new(
        points: ArrayView2<'a, f64>,
        k: usize,
        initial: Vec<usize>,
        metric: &'a M,
        policy: &'a E,
        max_iterations: usize,
    ) -> Result<Self> {
        check_cluster_count(k, points.nrows())?;
        if points.ncols() == 0 {
            return Err(Error::InvalidArgument(
                "points must have at least one dimension".to_string(),
            ));
        }
        if initial.len() != points.nrows() {
            return Err(Error::InvalidArgument(format!(
                "initial assignment covers {} points, dataset has {}",
                initial.len(),
                points.nrows()
            )));
        }
        if let Some(&c) = initial.iter().find(|&&c| c >= k) {
            return Err(Error::InvalidArgument(format!(
                "initial assignment uses cluster {} of {}",
                c, k
            )));
        }

        Ok(Self {
            points,
            metric,
            policy,
            max_iterations,
            parallel: false,
            assignments: initial,
            centroids: Array2::zeros((k, points.ncols())),
            iteration: 0,
            state: LloydState::Initialized,
        })
    }

    /// Spread the reassignment step over the rayon thread pool. The result is
    /// identical to the sequential path.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn state(&self) -> LloydState {
        self.state
    }

    /// Rounds performed so far.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn k(&self) -> usize {
        self.centroids.nrows()
    }

    pub fn assignments(&self) -> &[usize] {
        &self.assignments
    }

    pub fn centroids(&self) -> ArrayView2<'_, f64> {
        self.centroids.view()
    }

    /// Perform one round and return the new state. Calling this on a terminal
    /// iterator does nothing.
    pub fn step(&mut self) -> Result<LloydState> {
        if self.state.is_terminal() {
            return Ok(self.state);
        }
        if self.iteration >= self.max_iterations {
            self.state = LloydState::MaxIterationsReached;
            return Ok(self.state);
        }

        self.iteration += 1;
        let round_start = self.assignments.clone();

        self.update_centroids();
        self.handle_empty_clusters(self.iteration)?;

        let labels = self.nearest_centroids();
        let changed = labels
            .iter()
            .zip(&round_start)
            .filter(|(new, old)| new != old)
            .count();
        self.assignments = labels;
        debug!("lloyd round {}: {} points changed cluster", self.iteration, changed);

        self.state = if changed == 0 {
            LloydState::Converged
        } else if self.iteration >= self.max_iterations {
            LloydState::MaxIterationsReached
        } else {
            LloydState::Iterating
        };
        Ok(self.state)
    }

    /// Step until a terminal state, then finalize centroids and statistics.
    pub fn run(mut self) -> Result<LloydOutcome> {
        while !self.step()?.is_terminal() {}

        self.update_centroids();
        let before_policy = self.assignments.clone();
        let mut stats = self.handle_empty_clusters(self.iteration)?;
        if self.assignments != before_policy {
            // Donors lost members; their centroids must follow.
            self.update_centroids();
            stats = ClusterStats::compute(
                self.points,
                &self.assignments,
                self.centroids.view(),
                self.metric,
            );
        }
        info!(
            "lloyd finished after {} rounds ({:?}), k = {}, cost = {}",
            self.iteration,
            self.state,
            self.k(),
            stats.total_cost()
        );

        Ok(LloydOutcome {
            assignments: self.assignments,
            centroids: self.centroids,
            stats,
            iterations: self.iteration,
            state: self.state,
        })
    }

    fn update_centroids(&mut self) {
        let mut sums = Array2::<f64>::zeros(self.centroids.dim());
        let mut counts = vec![0_usize; self.k()];
        for (point, &c) in self.points.outer_iter().zip(&self.assignments) {
            counts[c] += 1;
            let mut sum = sums.row_mut(c);
            sum += &point;
        }
        for (c, &count) in counts.iter().enumerate() {
            if count > 0 {
                let mean = &sums.row(c) / count as f64;
                self.centroids.row_mut(c).assign(&mean);
            }
        }
    }

    fn handle_empty_clusters(&mut self, iteration: usize) -> Result<ClusterStats> {
        let mut stats = ClusterStats::compute(
            self.points,
            &self.assignments,
            self.centroids.view(),
            self.metric,
        );
        for cluster in stats.empty_clusters() {
            let mut ctx = EmptyClusterContext {
                points: self.points.reborrow(),
                centroids: &mut self.centroids,
                assignments: &mut self.assignments,
                stats: &mut stats,
                iteration,
            };
            self.policy.handle_empty_cluster(cluster, &mut ctx, self.metric)?;
        }
        Ok(stats)
    }

    fn nearest_centroids(&self) -> Vec<usize> {
        let points = self.points;
        let centroids = self.centroids.view();
        let metric = self.metric;
        if self.parallel {
            (0..points.nrows())
                .into_par_iter()
                .map(|i| nearest_centroid(points.row(i), centroids, metric))
                .collect()
        } else {
            points
                .outer_iter()
                .map(|point| nearest_centroid(point, centroids, metric))
                .collect()
        }
    }
}

/// Index of the centroid closest to `point`; the lowest index wins ties.
pub(crate) fn nearest_centroid<M: DistanceMetric>(
    point: ArrayView1<f64>,
    centroids: ArrayView2<f64>,
    metric: &M,
) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (c, centroid) in centroids.outer_iter().enumerate() {
        let dist = metric.distance(point, centroid);
        if dist < best_dist {
            best_dist = dist;
            best = c;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::empty_cluster::{
        AllowEmptyClusters, RejectEmptyClusters, RepairEmptyClusters,
    };
    use crate::clustering::metric::SquaredEuclidean;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn two_blobs() -> Array2<f64> {
        array![
            [1.0, 2.0],
            [1.5, 1.8],
            [1.2, 2.2],
            [8.0, 8.0],
            [8.5, 7.5],
            [7.8, 8.2],
        ]
    }

    fn assert_centroids_are_means(outcome: &LloydOutcome, data: &Array2<f64>) {
        for c in 0..outcome.centroids.nrows() {
            let members: Vec<usize> = (0..data.nrows())
                .filter(|&i| outcome.assignments[i] == c)
                .collect();
            assert_eq!(outcome.stats.count(c), members.len());
            if members.is_empty() {
                continue;
            }
            for d in 0..data.ncols() {
                let mean =
                    members.iter().map(|&i| data[[i, d]]).sum::<f64>() / members.len() as f64;
                assert_relative_eq!(outcome.centroids[[c, d]], mean, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_two_blobs_converge() {
        let data = two_blobs();
        let iter = LloydIterator::new(
            data.view(),
            2,
            vec![0, 1, 0, 1, 0, 1],
            &SquaredEuclidean,
            &RepairEmptyClusters,
            100,
        )
        .unwrap();
        let outcome = iter.run().unwrap();

        assert_eq!(outcome.state, LloydState::Converged);
        assert_eq!(outcome.assignments[0], outcome.assignments[1]);
        assert_eq!(outcome.assignments[0], outcome.assignments[2]);
        assert_eq!(outcome.assignments[3], outcome.assignments[4]);
        assert_eq!(outcome.assignments[3], outcome.assignments[5]);
        assert_ne!(outcome.assignments[0], outcome.assignments[3]);

        let low = outcome.assignments[0];
        assert_relative_eq!(outcome.centroids[[low, 0]], 3.7 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(outcome.centroids[[low, 1]], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_single_cluster_converges_in_one_round() {
        let data = two_blobs();
        let outcome = LloydIterator::new(
            data.view(),
            1,
            vec![0; 6],
            &SquaredEuclidean,
            &RejectEmptyClusters,
            50,
        )
        .unwrap()
        .run()
        .unwrap();

        assert_eq!(outcome.state, LloydState::Converged);
        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.assignments, vec![0; 6]);
    }

    #[test]
    fn test_state_transitions() {
        let data = two_blobs();
        let mut iter = LloydIterator::new(
            data.view(),
            2,
            vec![0, 1, 0, 1, 0, 1],
            &SquaredEuclidean,
            &RepairEmptyClusters,
            10,
        )
        .unwrap();
        assert_eq!(iter.state(), LloydState::Initialized);
        assert_eq!(iter.assignments(), &[0, 1, 0, 1, 0, 1]);
        assert_eq!(iter.centroids().dim(), (2, 2));

        let mut rounds = 0;
        loop {
            let state = iter.step().unwrap();
            rounds += 1;
            if state.is_terminal() {
                assert_eq!(state, LloydState::Converged);
                break;
            }
            assert_eq!(state, LloydState::Iterating);
        }
        assert_eq!(iter.iteration(), rounds);
        assert_eq!(iter.assignments(), &[0, 0, 0, 1, 1, 1]);
        assert_relative_eq!(iter.centroids()[[1, 0]], 24.3 / 3.0, epsilon = 1e-12);
        // Terminal states are sticky.
        assert_eq!(iter.step().unwrap(), LloydState::Converged);
        assert_eq!(iter.iteration(), rounds);
    }

    #[test]
    fn test_zero_iterations() {
        let data = two_blobs();
        let initial = vec![1, 1, 0, 0, 1, 0];
        let outcome = LloydIterator::new(
            data.view(),
            2,
            initial.clone(),
            &SquaredEuclidean,
            &RepairEmptyClusters,
            0,
        )
        .unwrap()
        .run()
        .unwrap();

        assert_eq!(outcome.state, LloydState::MaxIterationsReached);
        assert_eq!(outcome.iterations, 0);
        assert_eq!(outcome.assignments, initial);
    }

    #[test]
    fn test_iteration_budget_is_respected() {
        let data = Array2::from_shape_fn((40, 1), |(i, _)| (i * i) as f64);
        let initial: Vec<usize> = (0..40).map(|i| (i * 7) % 5).collect();
        for budget in 0..4 {
            let outcome = LloydIterator::new(
                data.view(),
                5,
                initial.clone(),
                &SquaredEuclidean,
                &RepairEmptyClusters,
                budget,
            )
            .unwrap()
            .run()
            .unwrap();
            assert!(outcome.iterations <= budget);
            assert!(outcome.state.is_terminal());
        }
    }

    #[test]
    fn test_reject_policy_fails_on_empty_cluster() {
        let data = array![[0.0], [1.0], [2.0], [3.0]];
        let result = LloydIterator::new(
            data.view(),
            3,
            vec![0, 0, 1, 1],
            &SquaredEuclidean,
            &RejectEmptyClusters,
            10,
        )
        .unwrap()
        .run();
        assert_eq!(
            result.unwrap_err(),
            Error::EmptyCluster {
                cluster: 2,
                iteration: 1
            }
        );
    }

    #[test]
    fn test_final_pass_repair_recomputes_donor_centroid() {
        // One round leaves cluster 2 empty; the repair happens after the loop.
        let data = array![[0.0], [1.0], [2.0], [3.0]];
        let outcome = LloydIterator::new(
            data.view(),
            3,
            vec![0, 1, 2, 1],
            &SquaredEuclidean,
            &RepairEmptyClusters,
            1,
        )
        .unwrap()
        .run()
        .unwrap();

        assert_eq!(outcome.state, LloydState::MaxIterationsReached);
        assert_eq!(outcome.assignments, vec![2, 0, 1, 1]);
        assert_relative_eq!(outcome.centroids[[0, 0]], 1.0);
        assert_relative_eq!(outcome.centroids[[1, 0]], 2.5);
        assert_relative_eq!(outcome.centroids[[2, 0]], 0.0);
        assert_relative_eq!(outcome.stats.total_cost(), 0.5);
        assert_centroids_are_means(&outcome, &data);
    }

    #[test]
    fn test_two_clusters_repaired_in_one_round() {
        let data = array![[0.0], [1.0], [2.0], [3.0], [10.0], [11.0]];
        let outcome = LloydIterator::new(
            data.view(),
            4,
            vec![0, 0, 0, 0, 1, 1],
            &SquaredEuclidean,
            &RepairEmptyClusters,
            10,
        )
        .unwrap()
        .run()
        .unwrap();

        assert_eq!(outcome.state, LloydState::Converged);
        assert_eq!(outcome.assignments, vec![2, 0, 0, 3, 1, 1]);
        assert_eq!(outcome.stats.counts(), &[2, 2, 1, 1]);
        assert_centroids_are_means(&outcome, &data);

        let rejected = LloydIterator::new(
            data.view(),
            4,
            vec![0, 0, 0, 0, 1, 1],
            &SquaredEuclidean,
            &RejectEmptyClusters,
            10,
        )
        .unwrap()
        .run();
        assert_eq!(
            rejected.unwrap_err(),
            Error::EmptyCluster {
                cluster: 2,
                iteration: 1
            }
        );
    }

    #[test]
    fn test_allow_policy_keeps_empty_cluster() {
        let data = array![[1.0], [2.0], [3.0], [4.0]];
        let outcome = LloydIterator::new(
            data.view(),
            3,
            vec![0, 0, 1, 1],
            &SquaredEuclidean,
            &AllowEmptyClusters,
            10,
        )
        .unwrap()
        .run()
        .unwrap();

        // Cluster 2's centroid stays at the origin, away from every point.
        assert_eq!(outcome.stats.count(2), 0);
        assert_eq!(outcome.centroids[[2, 0]], 0.0);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let data = Array2::from_shape_fn((200, 3), |(i, j)| {
            ((i * 31 + j * 17) % 97) as f64 / 7.0
        });
        let initial: Vec<usize> = (0..200).map(|i| (i * 13) % 6).collect();
        let run = |parallel| {
            LloydIterator::new(
                data.view(),
                6,
                initial.clone(),
                &SquaredEuclidean,
                &RepairEmptyClusters,
                100,
            )
            .unwrap()
            .with_parallel(parallel)
            .run()
            .unwrap()
        };
        let seq = run(false);
        let par = run(true);
        assert_eq!(seq.assignments, par.assignments);
        assert_eq!(seq.iterations, par.iterations);
    }

    #[test]
    fn test_invalid_initial_assignment() {
        let data = two_blobs();
        let short = LloydIterator::new(
            data.view(),
            2,
            vec![0, 1],
            &SquaredEuclidean,
            &RepairEmptyClusters,
            10,
        );
        assert!(matches!(short, Err(Error::InvalidArgument(_))));

        let out_of_range = LloydIterator::new(
            data.view(),
            2,
            vec![0, 1, 2, 0, 1, 0],
            &SquaredEuclidean,
            &RepairEmptyClusters,
            10,
        );
        assert!(matches!(out_of_range, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_nearest_centroid_tie_goes_to_lowest_index() {
        let centroids = array![[0.0], [2.0], [2.0]];
        let point = array![1.0];
        assert_eq!(
            nearest_centroid(point.view(), centroids.view(), &SquaredEuclidean),
            0
        );
        let point = array![3.0];
        assert_eq!(
            nearest_centroid(point.view(), centroids.view(), &SquaredEuclidean),
            1
        );
    }
}
