//! Small shared helpers: reading, hashing, classification, paths.

pub mod classify;
pub mod encoding;
pub mod hashing;
pub mod paths;

pub use classify::is_likely_generated;
pub use encoding::{is_binary_file, read_source};
pub use hashing::content_hash;
pub use paths::{is_contained_path, normalize_path, relative_path};
