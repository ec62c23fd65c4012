pub mod progress;

pub use progress::{create_spinner, fail_spinner, finish_spinner};
