//! Geometry utilities: SE3 transforms, stereo triangulation.

pub mod se3;
pub mod triangulation;

pub use se3::SE3;
pub use triangulation::{transform_to_world, triangulate};
