//! Dockerfile frontend shim.
//!
//! Before the Dockerfile reaches the build engine, an external transform process
//! rewrites it. While it runs, the transform can pull extra files out of the build
//! contexts through a per-build file relay.

pub mod config;
pub mod context;
pub mod error;
pub mod frontend;
pub mod local;
pub mod logging;
pub mod relay;
pub mod transform;
pub mod ui;

pub use error::{FrontendError, Result};
