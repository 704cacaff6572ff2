//! Text-to-vector encoding capability.
//!
//! The model itself is opaque to the rest of the system: anything that can
//! turn a batch of strings into fixed-dimension vectors implements
//! [`Embedder`]. The production implementation talks to Ollama over HTTP.

pub mod ollama;

use async_trait::async_trait;
use semtable_common::{Result, SemtableError};

pub use ollama::OllamaEmbedder;

/// Maps text to fixed-dimension vectors.
///
/// Implementations must be deterministic in output dimension across calls
/// for a given underlying model. Encoding is always batched; per-row calls
/// are a throughput bug, not a style choice.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Name of the underlying model
    fn model(&self) -> &str;

    /// Encode a batch of texts, one vector per input in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Encode a single text
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        if vectors.len() != 1 {
            return Err(SemtableError::encoding(format!(
                "embedder returned {} vectors for one input",
                vectors.len()
            )));
        }
        Ok(vectors.remove(0))
    }
}
