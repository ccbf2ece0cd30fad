//! One level of the coarse-to-fine registration loop.

use iaicp_3d::{cloud::GridPoint, transforms::RigidTransform};
use rand::Rng;
use serde::Serialize;

use crate::config::LevelParams;
use crate::correspondence::{Correspondence, CorrespondenceSearch};
use crate::point_cloud_transformation::fit_weighted_transformation;
use crate::robust::{depth_confidence, IterationStats};

/// Estimate carried from one iteration to the next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegistrationState {
    /// Cumulative source to target transform.
    pub transform: RigidTransform,
    /// Residual statistics of the last successful iteration.
    pub stats: IterationStats,
}

impl RegistrationState {
    /// Creates a new state.
    pub fn new(transform: RigidTransform, stats: IterationStats) -> Self {
        Self { transform, stats }
    }
}

/// Summary of one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IterationReport {
    /// Index of the level in the schedule.
    pub level: usize,
    /// Index of the iteration within the level.
    pub iteration: usize,
    /// Number of accepted correspondences.
    pub num_correspondences: usize,
    /// Statistics after the iteration.
    pub stats: IterationStats,
    /// Whether the iteration left the transform untouched.
    pub skipped: bool,
}

/// Result of a single iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationOutcome {
    /// Incremental transform to apply on top of the current estimate, `None` when the
    /// correspondences did not support a solve.
    pub increment: Option<RigidTransform>,
    /// Statistics for the next iteration.
    pub stats: IterationStats,
    /// Number of accepted correspondences.
    pub num_correspondences: usize,
}

/// Final weight of a pair: its robust weight under `stats` times the confidence of the
/// depth of the transformed source point.
fn final_weight(c: &Correspondence, stats: &IterationStats) -> f64 {
    stats.weight(c.geometric_residual, c.intensity_residual) * depth_confidence(c.source.z())
}

/// Runs one iteration: correspondence search, statistics update and weighted solve.
///
/// When no correspondence is accepted the outcome carries no increment and the input
/// statistics unchanged. When the solver rejects the pairs the increment is dropped but
/// the statistics of the accepted pairs are still returned.
///
/// # Arguments
///
/// * `search` - Correspondence search over the target frame.
/// * `salient` - Salient source points.
/// * `transform` - Current source to target estimate.
/// * `offset` - Neighborhood spacing of the level.
/// * `stats` - Statistics of the previous iteration.
/// * `max_distance` - Optional admission distance of a candidate.
/// * `rng` - Random source for the draws.
pub fn iterate_once<R: Rng>(
    search: &CorrespondenceSearch,
    salient: &[GridPoint],
    transform: &RigidTransform,
    offset: usize,
    stats: &IterationStats,
    max_distance: Option<f64>,
    rng: &mut R,
) -> IterationOutcome {
    let correspondences = search.collect(salient, transform, offset, stats, max_distance, rng);
    let num_correspondences = correspondences.len();

    let geometric = correspondences
        .iter()
        .map(|c| c.geometric_residual)
        .collect::<Vec<_>>();
    let intensity = correspondences
        .iter()
        .map(|c| c.intensity_residual)
        .collect::<Vec<_>>();

    let new_stats = match IterationStats::estimate(&geometric, &intensity) {
        Ok(s) => s,
        Err(e) => {
            log::warn!("skipping iteration: {}", e);
            return IterationOutcome {
                increment: None,
                stats: *stats,
                num_correspondences,
            };
        }
    };

    let src = correspondences
        .iter()
        .map(|c| c.source.xyz)
        .collect::<Vec<_>>();
    let dst = correspondences
        .iter()
        .map(|c| c.target.xyz)
        .collect::<Vec<_>>();
    let weights = correspondences
        .iter()
        .map(|c| final_weight(c, &new_stats))
        .collect::<Vec<_>>();

    match fit_weighted_transformation(&src, &dst, &weights) {
        Ok(increment) => IterationOutcome {
            increment: Some(increment),
            stats: new_stats,
            num_correspondences,
        },
        Err(e) => {
            log::warn!("skipping iteration: {}", e);
            IterationOutcome {
                increment: None,
                stats: new_stats,
                num_correspondences,
            }
        }
    }
}

/// Runs all iterations of one level and updates `state` in place.
///
/// Each increment is composed on the left of the cumulative transform, which is then
/// normalized through its pose vector.
///
/// # Arguments
///
/// * `search` - Correspondence search over the target frame.
/// * `salient` - Salient source points.
/// * `level_index` - Index of the level, used for reporting.
/// * `level` - Level parameters.
/// * `gate_max_distance` - Whether to enforce `level.max_distance`.
/// * `state` - Cumulative transform and statistics.
/// * `rng` - Random source for the draws.
///
/// # Returns
///
/// One report per iteration.
pub fn iterate_level<R: Rng>(
    search: &CorrespondenceSearch,
    salient: &[GridPoint],
    level_index: usize,
    level: &LevelParams,
    gate_max_distance: bool,
    state: &mut RegistrationState,
    rng: &mut R,
) -> Vec<IterationReport> {
    let max_distance = gate_max_distance.then_some(level.max_distance);
    log::debug!(
        "level {}: offset {}, max distance {}, {} iterations",
        level_index,
        level.offset,
        level.max_distance,
        level.iterations
    );

    let mut reports = Vec::with_capacity(level.iterations);
    for iteration in 0..level.iterations {
        let now = std::time::Instant::now();

        let outcome = iterate_once(
            search,
            salient,
            &state.transform,
            level.offset,
            &state.stats,
            max_distance,
            rng,
        );

        if let Some(increment) = outcome.increment {
            state.transform = increment.compose(&state.transform).normalized();
        }
        state.stats = outcome.stats;

        log::debug!(
            "level {} iteration {}: {} correspondences, geo scale {:.5}, int median {:.3} scale {:.3}, elapsed: {:?}",
            level_index,
            iteration,
            outcome.num_correspondences,
            state.stats.geometric.scale,
            state.stats.intensity.median,
            state.stats.intensity.scale,
            now.elapsed()
        );

        reports.push(IterationReport {
            level: level_index,
            iteration,
            num_correspondences: outcome.num_correspondences,
            stats: state.stats,
            skipped: outcome.increment.is_none(),
        });
    }

    reports
}
