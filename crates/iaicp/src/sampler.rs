//! Selection of the salient source points used for correspondence search.

use iaicp_3d::{
    camera::PinholeCamera,
    cloud::{GridPoint, OrganizedPointCloud},
    transforms::RigidTransform,
};
use rand::Rng;

use crate::config::SamplerParams;
use crate::photometric::{gray_similarity, intensity_residual};

/// Why a point was kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Salience {
    /// Strong gray edge across the point.
    PhotometricEdge,
    /// Large intensity change against the predicted target pixel.
    IntensityResidual,
    /// Depth profile bends at the point.
    Curvature,
}

/// The sampled subset of the source cloud.
#[derive(Debug, Clone, Default)]
pub struct SalientSet {
    points: Vec<GridPoint>,
    num_salient: usize,
    fallback: bool,
}

impl SalientSet {
    /// Sampled points, all with finite coordinates.
    pub fn points(&self) -> &[GridPoint] {
        &self.points
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether no point was sampled.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of points that passed the salience test, even when the set was replaced
    /// by the fallback.
    pub fn num_salient(&self) -> usize {
        self.num_salient
    }

    /// Whether the set comes from random fallback sampling.
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }
}

/// Classifies one source grid position.
///
/// Returns `None` when the point has no usable depth, warps too close to the image
/// border, sits on a depth edge, or is not distinctive.
fn classify(
    source: &OrganizedPointCloud,
    target: &OrganizedPointCloud,
    camera: &PinholeCamera,
    predict: &RigidTransform,
    params: &SamplerParams,
    col: i64,
    row: i64,
) -> Option<Salience> {
    let pt = source.get_with_depth(col, row)?;
    let z = pt.z();
    if z > params.max_depth {
        return None;
    }

    // warp to the target image
    let (u, v) = camera.project(predict.transform_point(pt.xyz))?;
    if !camera.contains(u, v, params.border_margin) {
        return None;
    }

    // background points next to a depth edge
    let s = params.depth_step;
    let depth_diff = |dc: i64, dr: i64| {
        source
            .get(col + dc, row + dr)
            .map_or(f64::NAN, |n| z - n.z())
    };
    let (right, left) = (depth_diff(s, 0), depth_diff(-s, 0));
    let (up, down) = (depth_diff(0, -s), depth_diff(0, s));
    let threshold = params.depth_edge_ratio * z;
    for diff in [right, left, up, down] {
        if diff.is_nan() || diff > threshold {
            return None;
        }
    }

    // image gradient
    let g = params.gray_step;
    let similarity = |a: Option<&GridPoint>, b: Option<&GridPoint>| match (a, b) {
        (Some(a), Some(b)) => gray_similarity(a, b),
        _ => f64::NAN,
    };
    let sim_h = similarity(source.get(col - g, row), source.get(col + g, row));
    let sim_v = similarity(source.get(col, row - g), source.get(col, row + g));
    let is_edge = |sim: f64| !sim.is_nan() && sim <= params.gray_similarity_threshold;
    if is_edge(sim_h) || is_edge(sim_v) {
        return Some(Salience::PhotometricEdge);
    }

    // intensity change against the predicted target pixel
    let residual = target
        .get(u, v)
        .map_or(f64::NAN, |t| intensity_residual(t, pt).abs());
    if residual > params.intensity_residual_threshold {
        return Some(Salience::IntensityResidual);
    }

    // depth gradient
    let curvature = params.curvature_ratio * z;
    if (right - left).abs() > curvature || (up - down).abs() > curvature {
        return Some(Salience::Curvature);
    }

    None
}

/// Samples salient points of the source frame.
///
/// Grid positions are visited on a lattice with stride `params.stride` whose origin is
/// randomly shifted by up to one stride. A point is kept when its depth is usable, its
/// projection warped by `predict` stays `params.border_margin` pixels inside the image,
/// it does not sit behind a depth edge, and at least one of the gray edge, intensity
/// residual, or depth curvature tests fires.
///
/// When fewer than `params.min_salient_points` points pass, the set is replaced by
/// `params.fallback_samples` uniform draws with replacement over the whole source grid.
/// Points without finite coordinates are dropped from the result.
///
/// # Arguments
///
/// * `source` - The source frame.
/// * `target` - The target frame, read at the predicted pixel of each candidate.
/// * `camera` - Camera shared by both frames.
/// * `predict` - Predicted source to target transformation.
/// * `params` - Sampler parameters.
/// * `rng` - Random source for the lattice origin and the fallback draws.
pub fn sample_salient_points<R: Rng>(
    source: &OrganizedPointCloud,
    target: &OrganizedPointCloud,
    camera: &PinholeCamera,
    predict: &RigidTransform,
    params: &SamplerParams,
    rng: &mut R,
) -> SalientSet {
    let stride = params.stride.max(1);
    let begin = 2 + rng.random_range(0..stride);
    let col_end = source.width().saturating_sub(begin + 4);
    let row_end = source.height().saturating_sub(begin + 4);

    let mut points = Vec::new();
    let mut counts = [0usize; 3];
    for col in (begin..col_end).step_by(stride) {
        for row in (begin..row_end).step_by(stride) {
            let Some(salience) = classify(
                source,
                target,
                camera,
                predict,
                params,
                col as i64,
                row as i64,
            ) else {
                continue;
            };
            counts[salience as usize] += 1;
            if let Some(p) = source.get(col as i64, row as i64) {
                points.push(*p);
            }
        }
    }

    let num_salient = points.len();
    log::debug!(
        "salient points: {} (edge: {}, intensity: {}, curvature: {})",
        num_salient,
        counts[0],
        counts[1],
        counts[2]
    );

    let fallback = num_salient < params.min_salient_points;
    if fallback {
        log::warn!(
            "only {} salient points, drawing {} random points instead",
            num_salient,
            params.fallback_samples
        );
        let all = source.points();
        points = (0..params.fallback_samples)
            .map(|_| all[rng.random_range(0..all.len())])
            .collect();
    }

    points.retain(|p| p.is_finite());
    log::info!("sampled {} salient points", points.len());

    SalientSet {
        points,
        num_salient,
        fallback,
    }
}
