use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::{
    camera::PinholeCamera,
    cloud::{CloudError, GridPoint, OrganizedPointCloud},
    transforms::RigidTransform,
};

/// Fixed point iterations of the ray cast.
const RAY_CAST_ITERATIONS: usize = 40;

/// A textured height field `z = f(x, y)` in world coordinates, seen by cameras looking
/// along `+z`.
///
/// The surface is `base_depth + amplitude * sin(frequency * x) * cos(frequency * y)` and
/// the gray level is `128 + texture_amplitude * sin(texture_frequency * x) *
/// sin(texture_frequency * y)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WavySurface {
    /// Mean depth of the surface.
    pub base_depth: f64,
    /// Height of the waves.
    pub amplitude: f64,
    /// Spatial frequency of the waves in radians per meter.
    pub frequency: f64,
    /// Amplitude of the gray pattern.
    pub texture_amplitude: f64,
    /// Spatial frequency of the gray pattern in radians per meter.
    pub texture_frequency: f64,
}

impl Default for WavySurface {
    fn default() -> Self {
        Self {
            base_depth: 2.0,
            amplitude: 0.1,
            frequency: 6.0,
            texture_amplitude: 100.0,
            texture_frequency: 8.0,
        }
    }
}

impl WavySurface {
    /// A flat gray wall at `depth`.
    pub fn flat(depth: f64) -> Self {
        Self {
            base_depth: depth,
            amplitude: 0.0,
            frequency: 0.0,
            texture_amplitude: 0.0,
            texture_frequency: 0.0,
        }
    }

    /// Height of the surface at `(x, y)`.
    pub fn height(&self, x: f64, y: f64) -> f64 {
        self.base_depth + self.amplitude * (self.frequency * x).sin() * (self.frequency * y).cos()
    }

    /// Gray level of the surface at `(x, y)`.
    pub fn intensity(&self, x: f64, y: f64) -> f64 {
        128.0
            + self.texture_amplitude
                * (self.texture_frequency * x).sin()
                * (self.texture_frequency * y).sin()
    }

    /// Intersects a world ray with the surface, returning the ray parameter.
    fn cast(&self, origin: DVec3, dir: DVec3) -> Option<f64> {
        if dir.z <= 1e-6 {
            return None;
        }
        let gap = |s: f64| {
            let p = origin + s * dir;
            p.z - self.height(p.x, p.y)
        };

        let mut s = (self.base_depth - origin.z) / dir.z;
        for _ in 0..RAY_CAST_ITERATIONS {
            s -= gap(s) / dir.z;
        }
        (s > 0.0 && gap(s).abs() < 1e-9).then_some(s)
    }

    /// Renders the organized cloud seen by `camera` placed at `world_from_camera`.
    ///
    /// Points are expressed in the camera frame. Pixels whose ray misses the surface
    /// carry no depth.
    ///
    /// # Arguments
    ///
    /// * `camera` - The camera intrinsics and grid.
    /// * `world_from_camera` - Pose of the camera in the world.
    pub fn render(
        &self,
        camera: &PinholeCamera,
        world_from_camera: &RigidTransform,
    ) -> Result<OrganizedPointCloud, CloudError> {
        let origin = world_from_camera.translation;
        let mut points = Vec::with_capacity(camera.width * camera.height);
        for v in 0..camera.height {
            for u in 0..camera.width {
                let ray = camera.ray(u, v);
                let dir = world_from_camera.rotation * ray;
                let point = match self.cast(origin, dir) {
                    Some(s) => {
                        let hit = origin + s * dir;
                        GridPoint::new(s * ray, self.intensity(hit.x, hit.y))
                    }
                    None => GridPoint::invalid(f64::NAN),
                };
                points.push(point);
            }
        }
        OrganizedPointCloud::new(camera.width, camera.height, points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::pose_to_transform;
    use approx::assert_relative_eq;

    fn camera() -> PinholeCamera {
        PinholeCamera::new(60.0, 60.0, 20.0, 15.0, 40, 30)
    }

    #[test]
    fn test_flat_render_has_constant_depth() -> Result<(), CloudError> {
        let cloud = WavySurface::flat(1.2).render(&camera(), &RigidTransform::identity())?;
        assert_eq!(cloud.len(), 40 * 30);
        for p in cloud.points() {
            assert_relative_eq!(p.z(), 1.2, epsilon = 1e-12);
            assert_relative_eq!(p.intensity, 128.0);
        }
        Ok(())
    }

    #[test]
    fn test_rendered_points_lie_on_surface() -> Result<(), CloudError> {
        let surface = WavySurface::default();
        let pose = pose_to_transform(&[0.05, -0.03, 0.02, 0.01, -0.02, 0.03]);
        let cloud = surface.render(&camera(), &pose)?;

        for p in cloud.points() {
            assert!(p.has_depth());
            let w = pose.transform_point(p.xyz);
            assert_relative_eq!(w.z, surface.height(w.x, w.y), epsilon = 1e-8);
            assert_relative_eq!(p.intensity, surface.intensity(w.x, w.y), epsilon = 1e-6);
        }
        Ok(())
    }

    #[test]
    fn test_ray_looking_away_has_no_depth() -> Result<(), CloudError> {
        let pose = pose_to_transform(&[0.0, 0.0, 0.0, std::f64::consts::PI, 0.0, 0.0]);
        let cloud = WavySurface::flat(1.0).render(&camera(), &pose)?;
        assert!(cloud.points().iter().all(|p| !p.has_depth()));
        Ok(())
    }
}
