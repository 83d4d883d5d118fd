//! Source index: persisted record of files, symbols, and raw imports.

pub mod scanner;
pub mod schema;
pub mod store;

pub use scanner::{file_type_for, ScanStats, Scanner};
pub use store::{FileRecord, IndexCounts, IndexStore, SymbolLocation};
