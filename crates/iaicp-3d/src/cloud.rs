use glam::DVec3;

use crate::camera::PinholeCamera;

/// Error types for organized point clouds.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum CloudError {
    /// The number of points does not match the grid dimensions.
    #[error("Organized cloud expects {width}x{height} = {expected} points, got {actual}")]
    DimensionMismatch {
        /// Grid width.
        width: usize,
        /// Grid height.
        height: usize,
        /// Number of points implied by the grid.
        expected: usize,
        /// Number of points provided.
        actual: usize,
    },

    /// The grid has zero width or height.
    #[error("Organized cloud dimensions must be non-zero, got {width}x{height}")]
    EmptyDimensions {
        /// Grid width.
        width: usize,
        /// Grid height.
        height: usize,
    },
}

/// A single sample of an organized cloud: a 3D position in the camera frame and a
/// gray intensity value.
///
/// Missing depth is encoded with a NaN `z`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPoint {
    /// Position in the camera frame.
    pub xyz: DVec3,
    /// Gray intensity, usually in `[0, 255]`.
    pub intensity: f64,
}

impl GridPoint {
    /// Creates a new grid point.
    pub fn new(xyz: DVec3, intensity: f64) -> Self {
        Self { xyz, intensity }
    }

    /// A sample without depth.
    pub fn invalid(intensity: f64) -> Self {
        Self {
            xyz: DVec3::NAN,
            intensity,
        }
    }

    /// Depth of the sample.
    #[inline]
    pub fn z(&self) -> f64 {
        self.xyz.z
    }

    /// Whether the sample carries a depth measurement.
    #[inline]
    pub fn has_depth(&self) -> bool {
        self.xyz.z.is_finite()
    }

    /// Whether all three coordinates are finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.xyz.is_finite()
    }

    /// Euclidean distance between the positions of two samples.
    #[inline]
    pub fn distance(&self, other: &GridPoint) -> f64 {
        self.xyz.distance(other.xyz)
    }
}

/// A dense `width x height` grid of points stored in row-major order.
#[derive(Debug, Clone)]
pub struct OrganizedPointCloud {
    width: usize,
    height: usize,
    points: Vec<GridPoint>,
}

impl OrganizedPointCloud {
    /// Creates a cloud from row-major points.
    ///
    /// # Errors
    ///
    /// Fails when the grid is empty or `points.len() != width * height`.
    pub fn new(width: usize, height: usize, points: Vec<GridPoint>) -> Result<Self, CloudError> {
        if width == 0 || height == 0 {
            return Err(CloudError::EmptyDimensions { width, height });
        }
        let expected = width * height;
        if points.len() != expected {
            return Err(CloudError::DimensionMismatch {
                width,
                height,
                expected,
                actual: points.len(),
            });
        }
        Ok(Self {
            width,
            height,
            points,
        })
    }

    /// Builds a cloud by back-projecting a depth image through `camera`.
    ///
    /// Depth values that are not finite or not positive become samples without depth.
    ///
    /// # Arguments
    ///
    /// * `camera` - Camera used to back-project, it also gives the grid size.
    /// * `depth` - Row-major depth image.
    /// * `intensity` - Row-major gray image with the same size as `depth`.
    pub fn from_depth_intensity(
        camera: &PinholeCamera,
        depth: &[f64],
        intensity: &[f64],
    ) -> Result<Self, CloudError> {
        let expected = camera.width * camera.height;
        for len in [depth.len(), intensity.len()] {
            if len != expected {
                return Err(CloudError::DimensionMismatch {
                    width: camera.width,
                    height: camera.height,
                    expected,
                    actual: len,
                });
            }
        }

        let points = depth
            .iter()
            .zip(intensity.iter())
            .enumerate()
            .map(|(i, (&d, &gray))| {
                if d.is_finite() && d > 0.0 {
                    let (u, v) = (i % camera.width, i / camera.width);
                    GridPoint::new(camera.unproject(u, v, d), gray)
                } else {
                    GridPoint::invalid(gray)
                }
            })
            .collect();

        Self::new(camera.width, camera.height, points)
    }

    /// Grid width.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Grid height.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of points, always `width * height`.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false for a constructed cloud; kept for API symmetry.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get as reference the points in row-major order.
    pub fn points(&self) -> &[GridPoint] {
        &self.points
    }

    /// Bounds-checked access by column and row.
    ///
    /// Returns `None` for coordinates outside the grid, including negative ones.
    #[inline]
    pub fn get(&self, col: i64, row: i64) -> Option<&GridPoint> {
        if col < 0 || row < 0 || col >= self.width as i64 || row >= self.height as i64 {
            return None;
        }
        self.points.get(row as usize * self.width + col as usize)
    }

    /// Like [`Self::get`] but only returns samples that carry depth.
    #[inline]
    pub fn get_with_depth(&self, col: i64, row: i64) -> Option<&GridPoint> {
        self.get(col, row).filter(|p| p.has_depth())
    }
}
