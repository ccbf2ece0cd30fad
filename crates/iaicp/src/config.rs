use serde::{Deserialize, Serialize};

use crate::robust::IterationStats;

/// Parameters of the salient point sampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerParams {
    /// Lattice stride in pixels.
    pub stride: usize,
    /// Points farther than this are never salient.
    pub max_depth: f64,
    /// Minimum distance in pixels from the warped projection to the image border.
    pub border_margin: i64,
    /// Pixel offset of the neighbors used for the depth checks.
    pub depth_step: i64,
    /// A neighbor closer than `depth_edge_ratio * z` marks a depth edge.
    pub depth_edge_ratio: f64,
    /// Pixel offset of the neighbor pairs used for the gray edge test.
    pub gray_step: i64,
    /// Gray similarity at or below this marks a photometric edge.
    pub gray_similarity_threshold: f64,
    /// Absolute intensity residual above this marks a photometric change.
    pub intensity_residual_threshold: f64,
    /// Opposite depth differences differing by more than `curvature_ratio * z` mark a
    /// geometric feature.
    pub curvature_ratio: f64,
    /// Below this many salient points the sampler falls back to random sampling.
    pub min_salient_points: usize,
    /// Number of random draws of the fallback.
    pub fallback_samples: usize,
}

impl Default for SamplerParams {
    fn default() -> Self {
        Self {
            stride: 2,
            max_depth: 8.0,
            border_margin: 3,
            depth_step: 2,
            depth_edge_ratio: 0.021,
            gray_step: 4,
            gray_similarity_threshold: 0.85,
            intensity_residual_threshold: 100.0,
            curvature_ratio: 0.03,
            min_salient_points: 200,
            fallback_samples: 1000,
        }
    }
}

/// One level of the coarse-to-fine schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelParams {
    /// Admission distance of a match. Only enforced with
    /// [`IaIcpConfig::gate_max_distance`].
    pub max_distance: f64,
    /// Spacing in pixels between the neighborhood samples.
    pub offset: usize,
    /// Number of iterations of the level.
    pub iterations: usize,
}

impl LevelParams {
    /// Creates a new level.
    pub fn new(max_distance: f64, offset: usize, iterations: usize) -> Self {
        Self {
            max_distance,
            offset,
            iterations,
        }
    }
}

/// Configuration of the whole registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IaIcpConfig {
    /// Salient point sampler parameters.
    pub sampler: SamplerParams,
    /// Levels, run in order.
    pub levels: Vec<LevelParams>,
    /// Correspondences collected per iteration at most.
    pub max_correspondences: usize,
    /// Radius of the circular neighborhood in grid cells.
    pub search_radius: i64,
    /// Minimum distance in pixels from a searched target pixel to the image border.
    pub search_border_margin: i64,
    /// Matches farther than this from the untransformed salient point are rejected.
    pub max_match_gap: f64,
    /// Statistics used by the first iteration.
    pub initial_stats: IterationStats,
    /// Reject candidates farther than the level `max_distance`.
    pub gate_max_distance: bool,
}

impl Default for IaIcpConfig {
    fn default() -> Self {
        Self {
            sampler: SamplerParams::default(),
            levels: vec![
                LevelParams::new(0.15, 7, 7),
                LevelParams::new(0.06, 3, 7),
                LevelParams::new(0.02, 1, 15),
            ],
            max_correspondences: 150,
            search_radius: 4,
            search_border_margin: 3,
            max_match_gap: 1000.0,
            initial_stats: IterationStats::default(),
            gate_max_distance: false,
        }
    }
}

impl IaIcpConfig {
    /// Total number of iterations over all levels.
    pub fn total_iterations(&self) -> usize {
        self.levels.iter().map(|l| l.iterations).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let config = IaIcpConfig::default();
        let schedule = config
            .levels
            .iter()
            .map(|l| (l.offset, l.iterations))
            .collect::<Vec<_>>();
        assert_eq!(schedule, vec![(7, 7), (3, 7), (1, 15)]);
        assert_eq!(config.total_iterations(), 29);
        assert!(!config.gate_max_distance);
    }

    #[test]
    fn test_partial_config_from_json() -> Result<(), serde_json::Error> {
        let json = r#"{
            "max_correspondences": 80,
            "sampler": { "min_salient_points": 50 },
            "levels": [{ "max_distance": 0.1, "offset": 2, "iterations": 3 }]
        }"#;
        let config: IaIcpConfig = serde_json::from_str(json)?;
        assert_eq!(config.max_correspondences, 80);
        assert_eq!(config.sampler.min_salient_points, 50);
        assert_eq!(config.sampler.fallback_samples, 1000);
        assert_eq!(config.total_iterations(), 3);
        assert_eq!(config.initial_stats, IterationStats::default());
        Ok(())
    }
}
