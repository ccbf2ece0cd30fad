#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

mod error;
pub use error::IaIcpError;

/// Sampler, search and schedule parameters.
pub mod config;
pub use config::IaIcpConfig;

pub mod correspondence;

mod iaicp;
pub use iaicp::*;

pub mod iteration;

/// Intensity comparisons between grid points.
pub mod photometric;

pub mod robust;

pub mod sampler;

// Re-export the point_cloud_transformation module
mod point_cloud_transformation;
pub use point_cloud_transformation::{
    compute_weighted_centroids, fit_weighted_transformation, SolverError,
};

pub use iaicp_3d::{camera::PinholeCamera, cloud::OrganizedPointCloud, transforms::RigidTransform};
