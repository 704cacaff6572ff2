use crate::similarity::batch_cosine_similarity;
use ndarray::Array2;
use semtable_common::{Result, SemtableError};
use semtable_embed::Embedder;
use semtable_tabular::RecordSet;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// One row of the record set plus its relevance to the query
#[derive(Debug, Clone, Serialize)]
pub struct RankedResult {
    /// The row's full metadata, (column, value) pairs in schema order
    pub row: Vec<(String, String)>,

    /// Cosine similarity in [-1, 1], rounded to 2 decimal places
    pub similarity: f64,
}

/// Ranks rows of a record set against a query string
pub struct SimilarityEngine {
    embedder: Arc<dyn Embedder>,
}

impl SimilarityEngine {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    /// Score every row of `matrix` against `query` and return the `top_n`
    /// best rows, highest first.
    ///
    /// `matrix` must be the embedding column derived from `record_set`: one
    /// row per record, in the same order. The query is encoded at full
    /// dimension; a mismatch with the stored dimension aborts the search
    /// rather than truncating either side.
    pub async fn search(
        &self,
        query: &str,
        record_set: &RecordSet,
        matrix: &Array2<f32>,
        top_n: usize,
    ) -> Result<Vec<RankedResult>> {
        if query.trim().is_empty() {
            return Err(SemtableError::EmptyQuery);
        }
        if matrix.nrows() != record_set.len() {
            return Err(SemtableError::invariant(format!(
                "{} embeddings for {} rows",
                matrix.nrows(),
                record_set.len()
            )));
        }

        let query_vector = self.embedder.embed_one(query).await?;
        if query_vector.len() != matrix.ncols() {
            return Err(SemtableError::invariant(format!(
                "query embedding dimension {} does not match stored dimension {}",
                query_vector.len(),
                matrix.ncols()
            )));
        }

        let scores = batch_cosine_similarity(matrix, &query_vector)?;
        debug!("Scored {} rows for query", scores.len());

        // Stable sort keeps equal-score rows in record order, so identical
        // inputs always produce identical rankings
        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| {
            scores[b]
                .partial_cmp(&scores[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        order.truncate(top_n);

        let mut results = Vec::with_capacity(order.len());
        for index in order {
            let row = record_set
                .row_mapping(index)
                .ok_or_else(|| SemtableError::invariant(format!("row {} out of range", index)))?;
            results.push(RankedResult {
                row,
                similarity: round2(scores[index]),
            });
        }
        Ok(results)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
