//! Shared CLI argument types

mod common;
mod global;

pub use common::{HttpMethod, OutputFormat};
pub use global::GlobalOptions;
