use iaicp_3d::{camera::PinholeCamera, cloud::OrganizedPointCloud, transforms::RigidTransform};
use rand::Rng;

use crate::config::IaIcpConfig;
use crate::correspondence::CorrespondenceSearch;
use crate::error::IaIcpError;
use crate::iteration::{iterate_level, IterationReport, RegistrationState};
use crate::robust::IterationStats;
use crate::sampler::{sample_salient_points, SalientSet};

/// Result of a registration run.
///
/// The transformation is from the source to the target frame.
#[derive(Debug, Clone)]
pub struct IaIcpResult {
    /// Estimated source to target transform.
    pub transform: RigidTransform,
    /// Statistics after the last iteration.
    pub stats: IterationStats,
    /// Number of points that passed the salience test.
    pub num_salient: usize,
    /// Whether the salient set came from the random fallback.
    pub used_fallback: bool,
    /// One report per iteration, in order.
    pub reports: Vec<IterationReport>,
    /// The total number of iterations performed.
    pub num_iterations: usize,
}

/// Intensity-assisted ICP between two organized range-intensity frames taken by the
/// same camera.
///
/// Typical use is `setup_source`, `setup_target`, optionally `setup_predict`, then
/// `run`.
#[derive(Debug, Clone)]
pub struct IaIcp {
    camera: PinholeCamera,
    config: IaIcpConfig,
    source: Option<OrganizedPointCloud>,
    target: Option<OrganizedPointCloud>,
    predict: RigidTransform,
    transform: RigidTransform,
    salient: SalientSet,
}

impl IaIcp {
    /// Creates a registration for frames of `camera`.
    pub fn new(camera: PinholeCamera, config: IaIcpConfig) -> Self {
        Self {
            camera,
            config,
            source: None,
            target: None,
            predict: RigidTransform::identity(),
            transform: RigidTransform::identity(),
            salient: SalientSet::default(),
        }
    }

    /// The camera of both frames.
    pub fn camera(&self) -> &PinholeCamera {
        &self.camera
    }

    /// The configuration.
    pub fn config(&self) -> &IaIcpConfig {
        &self.config
    }

    fn check_dimensions(
        &self,
        name: &'static str,
        cloud: &OrganizedPointCloud,
    ) -> Result<(), IaIcpError> {
        if cloud.width() != self.camera.width || cloud.height() != self.camera.height {
            return Err(IaIcpError::DimensionMismatch {
                name,
                width: self.camera.width,
                height: self.camera.height,
                actual_width: cloud.width(),
                actual_height: cloud.height(),
            });
        }
        Ok(())
    }

    /// Sets the source frame.
    ///
    /// # Errors
    ///
    /// Returns [`IaIcpError::DimensionMismatch`] when the grid differs from the camera.
    pub fn setup_source(&mut self, cloud: OrganizedPointCloud) -> Result<(), IaIcpError> {
        self.check_dimensions("source", &cloud)?;
        self.source = Some(cloud);
        Ok(())
    }

    /// Sets the target frame.
    ///
    /// # Errors
    ///
    /// Returns [`IaIcpError::DimensionMismatch`] when the grid differs from the camera.
    pub fn setup_target(&mut self, cloud: OrganizedPointCloud) -> Result<(), IaIcpError> {
        self.check_dimensions("target", &cloud)?;
        self.target = Some(cloud);
        Ok(())
    }

    /// Sets the predicted source to target transform, also used as the starting estimate.
    pub fn setup_predict(&mut self, predict: RigidTransform) {
        self.predict = predict;
        self.transform = predict;
    }

    /// The current estimate: the prediction before a run, the result after it.
    pub fn transform(&self) -> &RigidTransform {
        &self.transform
    }

    /// The salient set of the last run.
    pub fn salient_source(&self) -> &SalientSet {
        &self.salient
    }

    /// Runs the registration with the thread local random generator.
    ///
    /// # Errors
    ///
    /// Returns [`IaIcpError::MissingInput`] when a frame has not been set up.
    pub fn run(&mut self) -> Result<IaIcpResult, IaIcpError> {
        self.run_with_rng(&mut rand::rng())
    }

    /// Runs the registration.
    ///
    /// Samples the salient source points once, then runs every level of the schedule
    /// for its fixed number of iterations starting from the prediction.
    ///
    /// # Arguments
    ///
    /// * `rng` - Random source for sampling and correspondence draws.
    ///
    /// # Errors
    ///
    /// Returns [`IaIcpError::MissingInput`] when a frame has not been set up.
    pub fn run_with_rng<R: Rng>(&mut self, rng: &mut R) -> Result<IaIcpResult, IaIcpError> {
        let source = self
            .source
            .as_ref()
            .ok_or(IaIcpError::MissingInput("source"))?;
        let target = self
            .target
            .as_ref()
            .ok_or(IaIcpError::MissingInput("target"))?;

        let salient = sample_salient_points(
            source,
            target,
            &self.camera,
            &self.predict,
            &self.config.sampler,
            rng,
        );

        let search = CorrespondenceSearch::new(
            target,
            &self.camera,
            self.config.search_radius,
            self.config.search_border_margin,
            self.config.max_match_gap,
            self.config.max_correspondences,
        );

        let mut state = RegistrationState::new(self.predict, self.config.initial_stats);
        let mut reports = Vec::with_capacity(self.config.total_iterations());
        for (level_index, level) in self.config.levels.iter().enumerate() {
            reports.extend(iterate_level(
                &search,
                salient.points(),
                level_index,
                level,
                self.config.gate_max_distance,
                &mut state,
                rng,
            ));
        }

        let skipped = reports.iter().filter(|r| r.skipped).count();
        log::info!(
            "registration done: {} iterations ({} skipped), translation {:.4}, rotation {:.4} rad",
            reports.len(),
            skipped,
            state.transform.translation_norm(),
            state.transform.rotation_angle()
        );

        let result = IaIcpResult {
            transform: state.transform,
            stats: state.stats,
            num_salient: salient.num_salient(),
            used_fallback: salient.is_fallback(),
            num_iterations: reports.len(),
            reports,
        };

        self.transform = state.transform;
        self.salient = salient;

        Ok(result)
    }
}
