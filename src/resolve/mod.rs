//! Fuzzy file resolution.

pub mod fuzzy;

pub use fuzzy::{FileResolver, MIN_CONFIDENCE};
