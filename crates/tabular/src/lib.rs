//! Delimited-text ingestion and the shared `RecordSet` type.

pub mod loader;
pub mod types;

pub use loader::load_files;
pub use types::RecordSet;
