use ndarray::ArrayView2;

use super::metric::DistanceMetric;

/// Per-cluster aggregates: member count and within-cluster cost.
///
/// The cost of a cluster is the sum of metric distances from its members to its
/// centroid. Under [`SquaredEuclidean`](super::SquaredEuclidean) this is the sum
/// of squared errors, i.e. the unnormalized variance.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterStats {
    counts: Vec<usize>,
    costs: Vec<f64>,
}

impl ClusterStats {
    /// Full rescan of `assignments` against `centroids` (one centroid per row).
    pub fn compute<M: DistanceMetric>(
        points: ArrayView2<f64>,
        assignments: &[usize],
        centroids: ArrayView2<f64>,
        metric: &M,
    ) -> Self {
        let k = centroids.nrows();
        let mut counts = vec![0_usize; k];
        let mut costs = vec![0.0; k];
        for (point, &c) in points.outer_iter().zip(assignments) {
            counts[c] += 1;
            costs[c] += metric.distance(point, centroids.row(c));
        }
        Self { counts, costs }
    }

    /// Number of clusters tracked.
    pub fn k(&self) -> usize {
        self.counts.len()
    }

    pub fn count(&self, cluster: usize) -> usize {
        self.counts[cluster]
    }

    pub fn cost(&self, cluster: usize) -> f64 {
        self.costs[cluster]
    }

    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    pub fn costs(&self) -> &[f64] {
        &self.costs
    }

    /// Sum of all within-cluster costs (inertia).
    pub fn total_cost(&self) -> f64 {
        self.costs.iter().sum()
    }

    /// Indices of clusters with no members, ascending.
    pub fn empty_clusters(&self) -> Vec<usize> {
        (0..self.k()).filter(|&c| self.counts[c] == 0).collect()
    }

    /// The cluster with the highest cost among those that can spare a member
    /// (at least two members). Ties go to the lowest index.
    pub fn max_cost_donor(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for c in 0..self.k() {
            if self.counts[c] < 2 {
                continue;
            }
            match best {
                Some(b) if self.costs[c] <= self.costs[b] => {}
                _ => best = Some(c),
            }
        }
        best
    }

    /// Record that a point at `distance` from the centroid of `from` now sits
    /// alone at the centroid of `to`.
    pub(crate) fn move_point(&mut self, from: usize, to: usize, distance: f64) {
        self.counts[from] -= 1;
        self.costs[from] = (self.costs[from] - distance).max(0.0);
        self.counts[to] += 1;
    }
}
