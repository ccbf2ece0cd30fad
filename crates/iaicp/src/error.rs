use iaicp_3d::cloud::CloudError;

use crate::point_cloud_transformation::SolverError;

/// Error types for the intensity-assisted ICP registration.
#[derive(thiserror::Error, Debug)]
pub enum IaIcpError {
    /// The input cloud could not be built.
    #[error(transparent)]
    Cloud(#[from] CloudError),

    /// The cloud grid does not match the camera grid.
    #[error("The {name} cloud is {actual_width}x{actual_height} but the camera expects {width}x{height}")]
    DimensionMismatch {
        /// Which input failed the check.
        name: &'static str,
        /// Camera grid width.
        width: usize,
        /// Camera grid height.
        height: usize,
        /// Cloud grid width.
        actual_width: usize,
        /// Cloud grid height.
        actual_height: usize,
    },

    /// `run` was called before the named cloud was set up.
    #[error("The {0} cloud has not been set up")]
    MissingInput(&'static str),

    /// No correspondence was accepted, the residual statistics are undefined.
    #[error("No correspondences were accepted")]
    EmptyCorrespondenceSet,

    /// The weighted rigid solver failed.
    #[error(transparent)]
    Solver(#[from] SolverError),
}
