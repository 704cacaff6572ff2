//! Vector math and query ranking.

pub mod engine;
pub mod similarity;

pub use engine::{RankedResult, SimilarityEngine};
pub use similarity::{batch_cosine_similarity, cosine_similarity};
