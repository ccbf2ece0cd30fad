//! Correspondence search in a circular pixel neighborhood of the target frame.

use iaicp_3d::{
    camera::PinholeCamera,
    cloud::{GridPoint, OrganizedPointCloud},
    transforms::RigidTransform,
};
use rand::Rng;

use crate::photometric::intensity_residual;
use crate::robust::IterationStats;

/// Lower bound a candidate weight has to beat to be selected.
const MIN_WEIGHT: f64 = 1e-10;

/// A matched pair between a transformed salient point and a target sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    /// Salient point transformed by the current estimate.
    pub source: GridPoint,
    /// Matched target sample.
    pub target: GridPoint,
    /// Euclidean distance between the pair.
    pub geometric_residual: f64,
    /// Target minus source intensity.
    pub intensity_residual: f64,
    /// Combined robust weight under the statistics used for the search.
    pub weight: f64,
}

/// Pixel offsets `(dx, dy)` in `[-r, r]^2` with `sqrt(dx^2 + dy^2) <= r`.
///
/// Offsets are ordered by `dx` first, then `dy`.
#[derive(Debug, Clone)]
pub struct CircularNeighborhood {
    offsets: Vec<(i64, i64)>,
}

impl CircularNeighborhood {
    /// Builds the neighborhood of the given radius in grid cells.
    pub fn new(radius: i64) -> Self {
        let radius = radius.max(0);
        let mut offsets = Vec::new();
        for dx in -radius..=radius {
            for dy in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    offsets.push((dx, dy));
                }
            }
        }
        Self { offsets }
    }

    /// The offsets in grid cells.
    pub fn offsets(&self) -> &[(i64, i64)] {
        &self.offsets
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Whether the neighborhood has no cell.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// Searches target correspondences for source points projected into the target frame.
#[derive(Debug, Clone)]
pub struct CorrespondenceSearch<'a> {
    target: &'a OrganizedPointCloud,
    camera: &'a PinholeCamera,
    neighborhood: CircularNeighborhood,
    border_margin: i64,
    max_match_gap: f64,
    max_correspondences: usize,
}

impl<'a> CorrespondenceSearch<'a> {
    /// Creates a search over `target`.
    ///
    /// # Arguments
    ///
    /// * `target` - The target frame.
    /// * `camera` - Camera of the target frame.
    /// * `radius` - Neighborhood radius in grid cells.
    /// * `border_margin` - Target pixels closer than this to a border are never visited.
    /// * `max_match_gap` - Sanity bound on the distance between the untransformed source
    ///   point and its match.
    /// * `max_correspondences` - Pairs collected per call of [`Self::collect`] at most.
    pub fn new(
        target: &'a OrganizedPointCloud,
        camera: &'a PinholeCamera,
        radius: i64,
        border_margin: i64,
        max_match_gap: f64,
        max_correspondences: usize,
    ) -> Self {
        Self {
            target,
            camera,
            neighborhood: CircularNeighborhood::new(radius),
            border_margin,
            max_match_gap,
            max_correspondences,
        }
    }

    /// Finds the target sample with the largest combined robust weight around the
    /// projection of `point`.
    ///
    /// `point` must already be expressed in the target frame. Returns `None` when the
    /// projection falls outside the image or no candidate has a finite weight.
    ///
    /// # Arguments
    ///
    /// * `point` - Transformed source point.
    /// * `offset` - Spacing in pixels between neighborhood cells.
    /// * `stats` - Statistics of the previous iteration.
    /// * `max_distance` - Optional admission distance of a candidate.
    pub fn find(
        &self,
        point: &GridPoint,
        offset: usize,
        stats: &IterationStats,
        max_distance: Option<f64>,
    ) -> Option<Correspondence> {
        let (u, v) = self.camera.project(point.xyz)?;
        if !self.camera.contains(u, v, 0) {
            return None;
        }

        let offset = offset as i64;
        let mut best: Option<Correspondence> = None;
        let mut max_weight = MIN_WEIGHT;

        for &(dx, dy) in self.neighborhood.offsets() {
            let (cu, cv) = (u + dx * offset, v + dy * offset);
            if !self.camera.contains(cu, cv, self.border_margin) {
                continue;
            }
            let Some(candidate) = self.target.get_with_depth(cu, cv) else {
                continue;
            };

            let dist = point.distance(candidate);
            if dist.is_nan() || max_distance.is_some_and(|max| dist > max) {
                continue;
            }
            let residual = intensity_residual(candidate, point);
            if residual.is_nan() {
                continue;
            }

            let weight = stats.weight(dist, residual);
            if weight.is_finite() && weight > max_weight {
                max_weight = weight;
                best = Some(Correspondence {
                    source: *point,
                    target: *candidate,
                    geometric_residual: dist,
                    intensity_residual: residual,
                    weight,
                });
            }
        }

        best
    }

    /// Draws random salient points and collects their correspondences.
    ///
    /// As many indices as salient points are drawn, with replacement, and the collection
    /// stops early once `max_correspondences` pairs are accepted. A match is
    /// accepted when it is within `max_match_gap` of the untransformed salient point.
    ///
    /// # Arguments
    ///
    /// * `salient` - Salient source points.
    /// * `transform` - Current source to target estimate.
    /// * `offset` - Spacing in pixels between neighborhood cells.
    /// * `stats` - Statistics of the previous iteration.
    /// * `max_distance` - Optional admission distance of a candidate.
    /// * `rng` - Random source for the draws.
    pub fn collect<R: Rng>(
        &self,
        salient: &[GridPoint],
        transform: &RigidTransform,
        offset: usize,
        stats: &IterationStats,
        max_distance: Option<f64>,
        rng: &mut R,
    ) -> Vec<Correspondence> {
        let capacity = self.max_correspondences.min(salient.len());
        let mut correspondences = Vec::with_capacity(capacity);
        for _ in 0..salient.len() {
            if correspondences.len() >= self.max_correspondences {
                break;
            }
            let original = &salient[rng.random_range(0..salient.len())];
            let warped =
                GridPoint::new(transform.transform_point(original.xyz), original.intensity);

            let Some(found) = self.find(&warped, offset, stats, max_distance) else {
                continue;
            };
            if original.distance(&found.target) < self.max_match_gap {
                correspondences.push(found);
            }
        }
        correspondences
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::robust::RobustStats;
    use glam::{DMat3, DVec3};
    use rand::{rngs::StdRng, SeedableRng};

    fn camera() -> PinholeCamera {
        PinholeCamera::new(60.0, 60.0, 30.0, 20.0, 60, 40)
    }

    fn textured_plane(camera: &PinholeCamera) -> OrganizedPointCloud {
        let n = camera.width * camera.height;
        let intensity = (0..n)
            .map(|i| ((i % camera.width) * 4 + (i / camera.width) * 3) as f64)
            .collect::<Vec<_>>();
        OrganizedPointCloud::from_depth_intensity(camera, &vec![2.0; n], &intensity)
            .expect("valid grid")
    }

    #[test]
    fn test_circular_neighborhood() {
        let nb = CircularNeighborhood::new(4);
        // lattice points inside a circle of radius 4
        assert_eq!(nb.len(), 49);
        assert!(nb.offsets().contains(&(0, 0)));
        assert!(nb.offsets().contains(&(4, 0)));
        assert!(!nb.offsets().contains(&(3, 3)));
        assert_eq!(nb.offsets()[0], (-4, 0));
        assert_eq!(CircularNeighborhood::new(0).len(), 1);
    }

    #[test]
    fn test_find_exact_match() {
        let camera = camera();
        let target = textured_plane(&camera);
        let search = CorrespondenceSearch::new(&target, &camera, 4, 3, 1000.0, 150);

        let query = target.get(20, 15).copied().expect("in grid");
        for offset in [1, 3, 7] {
            let found = search
                .find(&query, offset, &IterationStats::default(), None)
                .expect("a match");
            assert_eq!(found.target, query);
            assert_eq!(found.geometric_residual, 0.0);
            assert_eq!(found.intensity_residual, 0.0);
        }
    }

    #[test]
    fn test_find_prefers_intensity_consistent_candidate() {
        let camera = camera();
        let target = textured_plane(&camera);
        let search = CorrespondenceSearch::new(&target, &camera, 4, 3, 1000.0, 150);

        // same position as pixel (20, 15) but the gray value of pixel (21, 15)
        let geometric = target.get(20, 15).copied().expect("in grid");
        let photometric = target.get(21, 15).copied().expect("in grid");
        let query = GridPoint::new(geometric.xyz, photometric.intensity);
        let stats = IterationStats {
            geometric: RobustStats::new(0.0, 0.2),
            intensity: RobustStats::new(0.0, 2.0),
        };

        let found = search.find(&query, 1, &stats, None).expect("a match");
        assert_eq!(found.target, photometric);
    }

    #[test]
    fn test_find_skips_border_and_outside() {
        let camera = camera();
        let target = textured_plane(&camera);
        let search = CorrespondenceSearch::new(&target, &camera, 4, 3, 1000.0, 150);
        let stats = IterationStats::default();

        let outside = GridPoint::new(DVec3::new(100.0, 0.0, 2.0), 0.0);
        assert!(search.find(&outside, 1, &stats, None).is_none());

        let behind = GridPoint::new(DVec3::new(0.0, 0.0, -2.0), 0.0);
        assert!(search.find(&behind, 1, &stats, None).is_none());

        // the corner pixel projects inside the image, matches must stay off the border
        for (col, row) in [(0, 0), (1, 2), (59, 39), (57, 0)] {
            let query = target.get(col, row).copied().expect("in grid");
            if let Some(found) = search.find(&query, 1, &stats, None) {
                let (u, v) = camera.project(found.target.xyz).expect("projectable");
                assert!(camera.contains(u, v, 3));
            }
        }
    }

    #[test]
    fn test_find_gates_max_distance() {
        let camera = camera();
        let target = textured_plane(&camera);
        let search = CorrespondenceSearch::new(&target, &camera, 4, 3, 1000.0, 150);

        let mut query = target.get(20, 15).copied().expect("in grid");
        query.xyz.z += 0.5;
        let stats = IterationStats::default();
        assert!(search.find(&query, 1, &stats, None).is_some());
        assert!(search.find(&query, 1, &stats, Some(0.1)).is_none());
    }

    #[test]
    fn test_find_without_depth_returns_none() -> Result<(), Box<dyn std::error::Error>> {
        let camera = camera();
        let n = camera.width * camera.height;
        let target =
            OrganizedPointCloud::from_depth_intensity(&camera, &vec![f64::NAN; n], &vec![0.0; n])?;
        let search = CorrespondenceSearch::new(&target, &camera, 4, 3, 1000.0, 150);
        let query = GridPoint::new(camera.unproject(30, 20, 2.0), 0.0);
        assert!(search
            .find(&query, 1, &IterationStats::default(), None)
            .is_none());
        Ok(())
    }

    #[test]
    fn test_collect_is_bounded() {
        let camera = camera();
        let target = textured_plane(&camera);
        let search = CorrespondenceSearch::new(&target, &camera, 4, 3, 1000.0, 150);
        let salient = target.points().to_vec();
        let mut rng = StdRng::seed_from_u64(5);

        let found = search.collect(
            &salient,
            &RigidTransform::identity(),
            3,
            &IterationStats::default(),
            None,
            &mut rng,
        );
        assert_eq!(found.len(), 150);
        assert!(found.iter().all(|c| c.weight.is_finite() && c.weight > 0.0));

        let few = &salient[..20];
        let found = search.collect(
            few,
            &RigidTransform::identity(),
            3,
            &IterationStats::default(),
            None,
            &mut rng,
        );
        assert!(found.len() <= 20);
    }

    #[test]
    fn test_collect_rejects_large_gaps() {
        let camera = camera();
        let target = textured_plane(&camera);
        let search = CorrespondenceSearch::new(&target, &camera, 4, 3, 0.5, 150);
        let mut rng = StdRng::seed_from_u64(6);

        // salient points one meter in front of the plane, warped back onto it
        let salient = target
            .points()
            .iter()
            .map(|p| GridPoint::new(DVec3::new(p.xyz.x * 0.5, p.xyz.y * 0.5, 1.0), p.intensity))
            .collect::<Vec<_>>();
        let warp = RigidTransform::new(DMat3::from_diagonal(DVec3::splat(2.0)), DVec3::ZERO);
        let found = search.collect(
            &salient,
            &warp,
            1,
            &IterationStats::default(),
            None,
            &mut rng,
        );
        assert!(found.is_empty());
    }
}
