use glam::{DMat3, DVec3};
use iaicp_3d::transforms::RigidTransform;

/// Error types for the weighted rigid solver.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum SolverError {
    /// Source, target and weight slices have different lengths.
    #[error("Mismatched lengths: source ({source_len}), target ({target_len}), weights ({weights_len})")]
    MismatchedLengths {
        /// Number of source points.
        source_len: usize,
        /// Number of target points.
        target_len: usize,
        /// Number of weights.
        weights_len: usize,
    },

    /// Not enough pairs to constrain a rigid transformation.
    #[error("Need at least {required} correspondences, got {actual}")]
    InsufficientCorrespondences {
        /// Minimum number of pairs.
        required: usize,
        /// Number of pairs provided.
        actual: usize,
    },

    /// Weights are negative, not finite, or sum to zero.
    #[error("Correspondence weights must be finite, non-negative and not all zero")]
    DegenerateWeights,
}

/// Compute the weighted centroids of two point sets.
///
/// # Arguments
///
/// * `points_src` - A set of points.
/// * `points_dst` - Another set of points, same length as `points_src`.
/// * `weights` - One weight per pair.
///
/// # Returns
///
/// The weighted centroids of the two sets of points.
pub fn compute_weighted_centroids(
    points_src: &[DVec3],
    points_dst: &[DVec3],
    weights: &[f64],
) -> (DVec3, DVec3) {
    let total = weights.iter().sum::<f64>();
    let src_centroid = points_src
        .iter()
        .zip(weights.iter())
        .fold(DVec3::ZERO, |acc, (&p, &w)| acc + w * p)
        / total;
    let dst_centroid = points_dst
        .iter()
        .zip(weights.iter())
        .fold(DVec3::ZERO, |acc, (&p, &w)| acc + w * p)
        / total;
    (src_centroid, dst_centroid)
}

fn to_dmat3(m: faer::MatRef<'_, f64>) -> DMat3 {
    let col = |j: usize| DVec3::new(m.read(0, j), m.read(1, j), m.read(2, j));
    DMat3::from_cols(col(0), col(1), col(2))
}

/// Compute the rigid transformation minimizing the weighted squared distance between
/// corresponding points.
///
/// The closed form solution follows Arun et al. with per-pair weights:
///
/// 1. Compute the weighted centroids of both point sets.
/// 2. Compute the weighted cross-covariance `H = Σ wᵢ (sᵢ - s̄)(dᵢ - d̄)^T`.
/// 3. Compute the SVD `H = U * S * V^T`.
/// 4. `R = V * diag(1, 1, det(V * U^T)) * U^T` so that `R` is a proper rotation.
/// 5. `t = d̄ - R * s̄`.
///
/// # Arguments
///
/// * `points_src` - Source points.
/// * `points_dst` - Destination points, same length as `points_src`.
/// * `weights` - Non-negative weight of each pair.
///
/// # Returns
///
/// The transformation that maps `points_src` onto `points_dst`.
pub fn fit_weighted_transformation(
    points_src: &[DVec3],
    points_dst: &[DVec3],
    weights: &[f64],
) -> Result<RigidTransform, SolverError> {
    if points_src.len() != points_dst.len() || points_src.len() != weights.len() {
        return Err(SolverError::MismatchedLengths {
            source_len: points_src.len(),
            target_len: points_dst.len(),
            weights_len: weights.len(),
        });
    }
    if points_src.len() < 3 {
        return Err(SolverError::InsufficientCorrespondences {
            required: 3,
            actual: points_src.len(),
        });
    }
    let total = weights.iter().sum::<f64>();
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) || !(total > 0.0) {
        return Err(SolverError::DegenerateWeights);
    }

    // Identity transformation is a special case
    if points_src == points_dst {
        return Ok(RigidTransform::identity());
    }

    let (src_centroid, dst_centroid) =
        compute_weighted_centroids(points_src, points_dst, weights);

    // weighted cross-covariance H = Σ w * (src - src_mean) * (dst - dst_mean)^T
    let mut h = DMat3::ZERO;
    for ((&src_pt, &dst_pt), &w) in points_src.iter().zip(points_dst.iter()).zip(weights.iter())
    {
        let src_centered = src_pt - src_centroid;
        let dst_centered = w * (dst_pt - dst_centroid);
        h += DMat3::from_cols(
            src_centered * dst_centered.x,
            src_centered * dst_centered.y,
            src_centered * dst_centered.z,
        );
    }

    let svd = faer::Mat::<f64>::from_fn(3, 3, |i, j| h.col(j)[i]).svd();
    let u = to_dmat3(svd.u());
    let mut v = to_dmat3(svd.v());

    let mut rotation = v * u.transpose();

    // reflection case: flip the axis of the smallest singular value
    if rotation.determinant() < 0.0 {
        v.z_axis = -v.z_axis;
        rotation = v * u.transpose();
    }

    let translation = dst_centroid - rotation * src_centroid;

    Ok(RigidTransform::new(rotation, translation))
}
