use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Intrinsic parameters of a pinhole camera together with the image grid size.
///
/// Pixel coordinates follow the usual convention: `u` grows along the columns and
/// `v` along the rows, with the center of pixel `(u, v)` at `(u + 0.5, v + 0.5)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinholeCamera {
    /// Focal length along x in pixels.
    pub fx: f64,
    /// Focal length along y in pixels.
    pub fy: f64,
    /// Principal point x coordinate in pixels.
    pub cx: f64,
    /// Principal point y coordinate in pixels.
    pub cy: f64,
    /// Image width in pixels.
    pub width: usize,
    /// Image height in pixels.
    pub height: usize,
}

impl PinholeCamera {
    /// Creates a new camera from its intrinsics and the grid dimensions.
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64, width: usize, height: usize) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            width,
            height,
        }
    }

    /// Projects a 3D point in the camera frame to integer pixel coordinates.
    ///
    /// The continuous image coordinate is rounded down. Returns `None` when the point
    /// is behind the camera or any coordinate is not finite; the pixel itself may still
    /// lie outside the image.
    pub fn project(&self, point: DVec3) -> Option<(i64, i64)> {
        let z = point.z;
        if !z.is_finite() || z <= 0.0 {
            return None;
        }
        let u = (self.fx / z * point.x + self.cx).floor();
        let v = (self.fy / z * point.y + self.cy).floor();
        if !u.is_finite() || !v.is_finite() {
            return None;
        }
        Some((u as i64, v as i64))
    }

    /// Back-projects the center of pixel `(u, v)` at the given depth.
    pub fn unproject(&self, u: usize, v: usize, depth: f64) -> DVec3 {
        let x = (u as f64 + 0.5 - self.cx) / self.fx * depth;
        let y = (v as f64 + 0.5 - self.cy) / self.fy * depth;
        DVec3::new(x, y, depth)
    }

    /// Unit-depth ray through the center of pixel `(u, v)`.
    pub fn ray(&self, u: usize, v: usize) -> DVec3 {
        self.unproject(u, v, 1.0)
    }

    /// Checks whether a pixel lies at least `margin` pixels away from every border.
    ///
    /// With `margin == 0` this is a plain bounds check.
    #[inline]
    pub fn contains(&self, u: i64, v: i64, margin: i64) -> bool {
        u >= margin
            && v >= margin
            && u < self.width as i64 - margin
            && v < self.height as i64 - margin
    }
}
