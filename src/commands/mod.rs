pub mod fetch;
pub mod render;

pub use fetch::fetch;
pub use render::render;
