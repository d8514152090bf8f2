pub mod camera;
pub mod config;
pub mod error;
pub mod filter;
pub mod geometry;
pub mod io;
pub mod synthetic;
pub mod tracking;
