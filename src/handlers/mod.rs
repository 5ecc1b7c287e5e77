// Handlers mounted outside the versioned API
pub mod public;

pub use public::*;
