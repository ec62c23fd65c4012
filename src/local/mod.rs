//! Local-directory build collaborators used by the CLI.

pub mod client;
pub mod engine;
pub mod resolver;

pub use client::LocalClient;
pub use engine::{RenderEngine, RenderOutput};
pub use resolver::{ContextSnapshot, LocalContextResolver};
