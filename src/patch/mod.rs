//! Search/replace patch parsing and application.

pub mod apply;
pub mod wire;

pub use apply::{BlockStrategy, Outcome, PatchEngine, PatchReport};
pub use wire::{parse_blocks, ParsedPatch};
