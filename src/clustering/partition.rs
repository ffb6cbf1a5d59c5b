//! Initial partitioning of a point set into `k` clusters.
//!
//! None of the strategies promise non-empty clusters; emptiness is dealt with by
//! the [`EmptyClusterPolicy`](super::EmptyClusterPolicy) once iteration starts.

use ndarray::ArrayView2;
use rand::Rng;

use crate::error::{Error, Result};

/// Produces an initial assignment of every point to one of `k` clusters.
pub trait PartitionStrategy {
    /// Assign each row of `points` to a cluster index in `0..k`.
    ///
    /// Randomized strategies draw exclusively from `rng`.
    fn partition<R: Rng + ?Sized>(
        &self,
        points: ArrayView2<f64>,
        k: usize,
        rng: &mut R,
    ) -> Result<Vec<usize>>;
}

/// Ensure `1 <= k <= n_points`.
pub(crate) fn check_cluster_count(k: usize, n_points: usize) -> Result<()> {
    if k == 0 || k > n_points {
        return Err(Error::InvalidClusterCount { k, n_points });
    }
    Ok(())
}

/// Assigns each point to a uniformly random cluster.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomPartition;

impl PartitionStrategy for RandomPartition {
    fn partition<R: Rng + ?Sized>(
        &self,
        points: ArrayView2<f64>,
        k: usize,
        rng: &mut R,
    ) -> Result<Vec<usize>> {
        let n = points.nrows();
        check_cluster_count(k, n)?;
        Ok((0..n).map(|_| rng.gen_range(0..k)).collect())
    }
}

/// Assigns point `i` to cluster `i % k`, so every cluster starts non-empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialPartition;

impl PartitionStrategy for SequentialPartition {
    fn partition<R: Rng + ?Sized>(
        &self,
        points: ArrayView2<f64>,
        k: usize,
        _rng: &mut R,
    ) -> Result<Vec<usize>> {
        let n = points.nrows();
        check_cluster_count(k, n)?;
        Ok((0..n).map(|i| i % k).collect())
    }
}

/// A caller-supplied initial assignment.
#[derive(Debug, Clone, Default)]
pub struct GivenPartition {
    assignments: Vec<usize>,
}

impl GivenPartition {
    pub fn new(assignments: Vec<usize>) -> Self {
        Self { assignments }
    }
}

impl PartitionStrategy for GivenPartition {
    fn partition<R: Rng + ?Sized>(
        &self,
        points: ArrayView2<f64>,
        k: usize,
        _rng: &mut R,
    ) -> Result<Vec<usize>> {
        let n = points.nrows();
        check_cluster_count(k, n)?;
        if self.assignments.len() != n {
            return Err(Error::InvalidArgument(format!(
                "initial assignment covers {} points, dataset has {}",
                self.assignments.len(),
                n
            )));
        }
        if let Some(&c) = self.assignments.iter().find(|&&c| c >= k) {
            return Err(Error::InvalidArgument(format!(
                "initial assignment uses cluster {} but only {} clusters were requested",
                c, k
            )));
        }
        Ok(self.assignments.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn points(n: usize) -> Array2<f64> {
        Array2::from_shape_fn((n, 2), |(i, j)| (i * 2 + j) as f64)
    }

    #[test]
    fn test_random_partition_in_range() {
        let data = points(50);
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let assignments = RandomPartition.partition(data.view(), 4, &mut rng).unwrap();
        assert_eq!(assignments.len(), 50);
        assert!(assignments.iter().all(|&c| c < 4));
    }

    #[test]
    fn test_random_partition_is_seed_deterministic() {
        let data = points(30);
        let mut rng1 = ChaCha20Rng::seed_from_u64(11);
        let mut rng2 = ChaCha20Rng::seed_from_u64(11);
        let a = RandomPartition.partition(data.view(), 5, &mut rng1).unwrap();
        let b = RandomPartition.partition(data.view(), 5, &mut rng2).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_cluster_count() {
        let data = points(3);
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        assert_eq!(
            RandomPartition.partition(data.view(), 0, &mut rng),
            Err(Error::InvalidClusterCount { k: 0, n_points: 3 })
        );
        assert_eq!(
            SequentialPartition.partition(data.view(), 4, &mut rng),
            Err(Error::InvalidClusterCount { k: 4, n_points: 3 })
        );
    }

    #[test]
    fn test_sequential_partition_fills_every_cluster() {
        let data = points(7);
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let assignments = SequentialPartition
            .partition(data.view(), 3, &mut rng)
            .unwrap();
        assert_eq!(assignments, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_given_partition_validation() {
        let data = points(3);
        let mut rng = ChaCha20Rng::seed_from_u64(0);

        let ok = GivenPartition::new(vec![1, 0, 1]);
        assert_eq!(ok.partition(data.view(), 2, &mut rng).unwrap(), vec![1, 0, 1]);

        let short = GivenPartition::new(vec![0, 1]);
        assert!(matches!(
            short.partition(data.view(), 2, &mut rng),
            Err(Error::InvalidArgument(_))
        ));

        let out_of_range = GivenPartition::new(vec![0, 1, 2]);
        assert!(matches!(
            out_of_range.partition(data.view(), 2, &mut rng),
            Err(Error::InvalidArgument(_))
        ));
    }
}
