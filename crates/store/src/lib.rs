//! Archive persistence and the merge algorithm.
//!
//! A store is one self-contained JSON archive holding a record set plus one
//! embedding matrix per encoded column. Row `i` of every matrix corresponds
//! to row `i` of the record set; that positional alignment is the invariant
//! everything here protects.

pub mod archive;
pub mod matrix;
pub mod merge;

pub use archive::{list_stores, EmbeddingStore};
pub use matrix::{matrix_from_rows, MatrixData};
pub use merge::{merge, MergeOutcome};
