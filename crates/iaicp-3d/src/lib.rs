#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Pinhole camera model.
pub mod camera;

/// Organized point clouds with an intensity channel.
pub mod cloud;

/// 3D transforms algorithms.
pub mod transforms;

/// Ray-cast synthetic frames of textured surfaces.
pub mod synthetic;
