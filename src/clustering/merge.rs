//! Collapsing an overclustered partition down to the requested cluster count.

use log::trace;
use ndarray::{Array2, Axis};

use super::metric::DistanceMetric;
use crate::error::{Error, Result};

/// Result of merging clusters down to the target count.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Cluster index per point, compacted to `0..target_k`.
    pub assignments: Vec<usize>,
    /// Surviving centroids, one per row, in compacted order.
    pub centroids: Array2<f64>,
    /// Member count per surviving cluster.
    pub counts: Vec<usize>,
    /// Number of pairwise merges performed.
    pub merges: usize,
}

/// Greedily merges the two closest clusters until the target count remains.
///
/// Pairs are ranked by the metric between their centroids; equal distances
/// are broken by the lower index sum, then by the lower first index. The merged
/// cluster keeps the lower of the two indices and a member-weighted mean
/// centroid. Surviving clusters are relabelled in ascending order afterwards.
#[derive(Debug, Clone, Copy)]
pub struct OverclusterMerger<'a, M> {
    metric: &'a M,
}

impl<'a, M: DistanceMetric> OverclusterMerger<'a, M> {
    pub fn new(metric: &'a M) -> Self {
        Self { metric }
    }

    /// Merge the clusters described by `assignments` and `centroids` (one
    /// centroid per row) down to `target_k`.
    pub fn merge(
        &self,
        mut assignments: Vec<usize>,
        mut centroids: Array2<f64>,
        target_k: usize,
    ) -> Result<MergeOutcome> {
        let k = centroids.nrows();
        if target_k == 0 {
            return Err(Error::InvalidArgument(
                "cannot merge down to zero clusters".to_string(),
            ));
        }
        if target_k > k {
            return Err(Error::InvalidOverclusteringFactor(
                k as f64 / target_k as f64,
            ));
        }

        let mut counts = vec![0_usize; k];
        for &c in &assignments {
            if c >= k {
                return Err(Error::InvalidArgument(format!(
                    "assignment uses cluster {} of {}",
                    c, k
                )));
            }
            counts[c] += 1;
        }

        let mut active = vec![true; k];
        let mut remaining = k;
        let mut merges = 0;
        while remaining > target_k {
            let (keep, absorb, dist) = self.closest_pair(&centroids, &active).ok_or_else(|| {
                Error::InvalidArgument("no pair of clusters left to merge".to_string())
            })?;

            let (n_keep, n_absorb) = (counts[keep], counts[absorb]);
            let total = n_keep + n_absorb;
            if total > 0 {
                let merged = (&centroids.row(keep) * n_keep as f64
                    + &centroids.row(absorb) * n_absorb as f64)
                    / total as f64;
                centroids.row_mut(keep).assign(&merged);
            }
            for c in assignments.iter_mut().filter(|c| **c == absorb) {
                *c = keep;
            }
            counts[keep] = total;
            counts[absorb] = 0;
            active[absorb] = false;
            remaining -= 1;
            merges += 1;
            trace!(
                "merged cluster {} into {} (distance {}, {} members)",
                absorb,
                keep,
                dist,
                total
            );
        }

        let survivors: Vec<usize> = (0..k).filter(|&c| active[c]).collect();
        let mut relabel = vec![0_usize; k];
        for (new, &old) in survivors.iter().enumerate() {
            relabel[old] = new;
        }
        for c in assignments.iter_mut() {
            *c = relabel[*c];
        }

        Ok(MergeOutcome {
            assignments,
            centroids: centroids.select(Axis(0), &survivors),
            counts: survivors.iter().map(|&c| counts[c]).collect(),
            merges,
        })
    }

    fn closest_pair(
        &self,
        centroids: &Array2<f64>,
        active: &[bool],
    ) -> Option<(usize, usize, f64)> {
        let mut best: Option<(usize, usize, f64)> = None;
        for i in (0..active.len()).filter(|&i| active[i]) {
            for j in (i + 1..active.len()).filter(|&j| active[j]) {
                let dist = self.metric.distance(centroids.row(i), centroids.row(j));
                let better = match best {
                    None => true,
                    Some((bi, bj, bd)) => {
                        dist < bd || (dist == bd && (i + j, i) < (bi + bj, bi))
                    }
                };
                if better {
                    best = Some((i, j, dist));
                }
            }
        }
        best
    }
}
