//! Policies applied when a Lloyd round leaves a cluster without members.

use log::warn;
use ndarray::{Array2, ArrayView2};

use super::metric::DistanceMetric;
use super::stats::ClusterStats;
use crate::error::{Error, Result};

/// Mutable view of an in-progress clustering handed to an [`EmptyClusterPolicy`].
///
/// `centroids` has just been recomputed from `assignments`, and `stats` agrees
/// with both. A policy that moves points must keep all three consistent.
#[derive(Debug)]
pub struct EmptyClusterContext<'a> {
    pub points: ArrayView2<'a, f64>,
    pub centroids: &'a mut Array2<f64>,
    pub assignments: &'a mut [usize],
    pub stats: &'a mut ClusterStats,
    /// Round in which the cluster became empty. The pass that follows the
    /// last round reports that round's number.
    pub iteration: usize,
}

/// Decides what happens to a cluster that has no members.
pub trait EmptyClusterPolicy {
    /// Handle the empty cluster `cluster`.
    fn handle_empty_cluster<M: DistanceMetric>(
        &self,
        cluster: usize,
        ctx: &mut EmptyClusterContext<'_>,
        metric: &M,
    ) -> Result<()>;
}

/// Fails the run as soon as a cluster becomes empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectEmptyClusters;

impl EmptyClusterPolicy for RejectEmptyClusters {
    fn handle_empty_cluster<M: DistanceMetric>(
        &self,
        cluster: usize,
        ctx: &mut EmptyClusterContext<'_>,
        _metric: &M,
    ) -> Result<()> {
        Err(Error::EmptyCluster {
            cluster,
            iteration: ctx.iteration,
        })
    }
}

/// Leaves empty clusters alone; their centroid keeps its previous position.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowEmptyClusters;

impl EmptyClusterPolicy for AllowEmptyClusters {
    fn handle_empty_cluster<M: DistanceMetric>(
        &self,
        _cluster: usize,
        _ctx: &mut EmptyClusterContext<'_>,
        _metric: &M,
    ) -> Result<()> {
        Ok(())
    }
}

/// Refills an empty cluster with the point furthest from the centroid of the
/// cluster with the largest within-cluster cost.
///
/// Only clusters with at least two members are eligible donors, so a repair
/// never empties another cluster. The refilled cluster's centroid is moved onto
/// the donated point; the donor's centroid is left where it was.
#[derive(Debug, Clone, Copy, Default)]
pub struct RepairEmptyClusters;

impl EmptyClusterPolicy for RepairEmptyClusters {
    fn handle_empty_cluster<M: DistanceMetric>(
        &self,
        cluster: usize,
        ctx: &mut EmptyClusterContext<'_>,
        metric: &M,
    ) -> Result<()> {
        let donor = ctx
            .stats
            .max_cost_donor()
            .ok_or(Error::RepairFailed { cluster })?;

        let mut furthest: Option<(usize, f64)> = None;
        for (i, point) in ctx.points.outer_iter().enumerate() {
            if ctx.assignments[i] != donor {
                continue;
            }
            let d = metric.distance(point, ctx.centroids.row(donor));
            if furthest.map_or(true, |(_, best)| d > best) {
                furthest = Some((i, d));
            }
        }
        let (point, distance) = furthest.ok_or(Error::RepairFailed { cluster })?;

        ctx.assignments[point] = cluster;
        ctx.centroids.row_mut(cluster).assign(&ctx.points.row(point));
        ctx.stats.move_point(donor, cluster, distance);

        if ctx.stats.count(cluster) == 0 {
            return Err(Error::RepairFailed { cluster });
        }
        warn!(
            "iteration {}: cluster {} was empty, took point {} from cluster {}",
            ctx.iteration, cluster, point, donor
        );
        Ok(())
    }
}

/// Runtime choice between the three built-in policies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmptyClusterMode {
    /// Fail with [`Error::EmptyCluster`].
    Reject,
    /// Refill from the highest-cost cluster.
    #[default]
    Repair,
    /// Keep the cluster empty.
    Allow,
}

impl EmptyClusterPolicy for EmptyClusterMode {
    fn handle_empty_cluster<M: DistanceMetric>(
        &self,
        cluster: usize,
        ctx: &mut EmptyClusterContext<'_>,
        metric: &M,
    ) -> Result<()> {
        match self {
            EmptyClusterMode::Reject => {
                RejectEmptyClusters.handle_empty_cluster(cluster, ctx, metric)
            }
            EmptyClusterMode::Repair => {
                RepairEmptyClusters.handle_empty_cluster(cluster, ctx, metric)
            }
            EmptyClusterMode::Allow => {
                AllowEmptyClusters.handle_empty_cluster(cluster, ctx, metric)
            }
        }
    }
}
