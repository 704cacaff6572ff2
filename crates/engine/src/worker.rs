use crate::jobs::RegenerationTracker;
use ndarray::Array2;
use semtable_common::{Result, SemtableError};
use semtable_embed::Embedder;
use semtable_store::{matrix_from_rows, EmbeddingStore};
use semtable_tabular::RecordSet;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Messages a regeneration publishes to whoever triggered it.
///
/// The worker never touches caller state; applying results is the
/// receiver's job, and it happens only after `Completed` arrives.
#[derive(Debug, Clone, PartialEq)]
pub enum RegenerationEvent {
    /// Another column finished encoding
    Progress { completed: usize, total: usize },
    /// All columns encoded and the archive saved
    Completed,
    /// Encoding or saving failed; nothing was persisted
    Failed { message: String },
}

/// Encode every column of `record_set` as one embedding matrix each.
///
/// Every column is encodable; values are already coerced to strings by the
/// loader. One `embed_batch` call per column, a `Progress` event after each.
/// Any failure aborts the whole pass, so a column is never visible as
/// half-encoded.
pub async fn encode_columns(
    record_set: &RecordSet,
    embedder: &dyn Embedder,
    events: Option<&mpsc::Sender<RegenerationEvent>>,
) -> Result<BTreeMap<String, Array2<f32>>> {
    let total = record_set.columns().len();
    let mut matrices = BTreeMap::new();

    for (index, column) in record_set.columns().iter().enumerate() {
        let values = record_set.column_values(column)?;
        let vectors = embedder.embed_batch(&values).await?;
        if vectors.len() != values.len() {
            return Err(SemtableError::encoding(format!(
                "column '{}': embedder returned {} vectors for {} values",
                column,
                vectors.len(),
                values.len()
            )));
        }
        matrices.insert(column.clone(), matrix_from_rows(vectors)?);

        if let Some(tx) = events {
            let _ = tx
                .send(RegenerationEvent::Progress {
                    completed: index + 1,
                    total,
                })
                .await;
        }
    }

    Ok(matrices)
}

/// Re-encodes a full record set off the caller's thread of control and
/// replaces the store's archive on success.
pub struct RegenerationWorker {
    store: EmbeddingStore,
    record_set: RecordSet,
    embedder: Arc<dyn Embedder>,
    tracker: Arc<RegenerationTracker>,
    events: mpsc::Sender<RegenerationEvent>,
}

impl RegenerationWorker {
    pub fn new(
        store: EmbeddingStore,
        record_set: RecordSet,
        embedder: Arc<dyn Embedder>,
        tracker: Arc<RegenerationTracker>,
        events: mpsc::Sender<RegenerationEvent>,
    ) -> Self {
        Self {
            store,
            record_set,
            embedder,
            tracker,
            events,
        }
    }

    /// Run to completion or failure. The caller must already hold the
    /// store's slot in the tracker; it is released here either way.
    pub async fn run(self) {
        let store_name = self.store.name().to_string();
        info!(
            "Regenerating store '{}': {} rows, {} columns",
            store_name,
            self.record_set.len(),
            self.record_set.columns().len()
        );
        self.tracker
            .update_progress(&store_name, 10, "Encoding columns...".to_string())
            .await;

        let outcome = match encode_columns(
            &self.record_set,
            self.embedder.as_ref(),
            Some(&self.events),
        )
        .await
        {
            Ok(matrices) => {
                self.tracker
                    .update_progress(&store_name, 90, "Saving archive...".to_string())
                    .await;
                self.store.save(&self.record_set, &matrices)
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                self.tracker.complete(&store_name).await;
                let _ = self.events.send(RegenerationEvent::Completed).await;
            }
            Err(e) => {
                error!("Regeneration of store '{}' failed: {}", store_name, e);
                self.tracker.fail(&store_name, e.to_string()).await;
                let _ = self
                    .events
                    .send(RegenerationEvent::Failed {
                        message: e.to_string(),
                    })
                    .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tempfile::TempDir;

    /// Deterministic embedder: a small fixed-dimension signature per text.
    /// The constant last component keeps every vector off zero.
    struct SignatureEmbedder;

    fn signature(text: &str) -> Vec<f32> {
        let sum: u32 = text.bytes().map(u32::from).sum();
        vec![text.len() as f32, (sum % 97) as f32, 1.0]
    }

    #[async_trait]
    impl Embedder for SignatureEmbedder {
        fn model(&self) -> &str {
            "signature"
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| signature(t)).collect())
        }
    }

    /// Fails on any batch containing the marker value
    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn model(&self) -> &str {
            "failing"
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if texts.iter().any(|t| t == "boom") {
                return Err(SemtableError::encoding("model exploded"));
            }
            Ok(texts.iter().map(|t| signature(t)).collect())
        }
    }

    fn sample_record_set() -> RecordSet {
        let mut rs = RecordSet::new(vec!["name".into(), "genre".into()]).unwrap();
        rs.push_row(vec!["Alien".into(), "horror".into()]).unwrap();
        rs.push_row(vec!["Heat".into(), "crime".into()]).unwrap();
        rs
    }

    async fn drain(mut rx: mpsc::Receiver<RegenerationEvent>) -> Vec<RegenerationEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            let terminal = !matches!(event, RegenerationEvent::Progress { .. });
            events.push(event);
            if terminal {
                break;
            }
        }
        events
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_archive_saved() {
        let dir = TempDir::new().unwrap();
        let rs = sample_record_set();
        let tracker = Arc::new(RegenerationTracker::new());
        tracker.begin("movies").await.unwrap();

        let (tx, rx) = mpsc::channel(8);
        let worker = RegenerationWorker::new(
            EmbeddingStore::open(dir.path(), "movies"),
            rs.clone(),
            Arc::new(SignatureEmbedder),
            tracker.clone(),
            tx,
        );
        worker.run().await;

        let events = drain(rx).await;
        assert_eq!(
            events,
            vec![
                RegenerationEvent::Progress {
                    completed: 1,
                    total: 2
                },
                RegenerationEvent::Progress {
                    completed: 2,
                    total: 2
                },
                RegenerationEvent::Completed,
            ]
        );
        assert!(!tracker.in_flight("movies").await);

        let store = EmbeddingStore::open(dir.path(), "movies");
        assert_eq!(store.load().unwrap(), rs);
        assert_eq!(store.embedding_columns().unwrap(), vec!["name", "genre"]);
        let matrix = store.load_embedding_column("name").unwrap();
        assert_eq!(matrix.nrows(), 2);
        assert_eq!(matrix.ncols(), 3);
    }

    #[tokio::test]
    async fn test_failure_leaves_no_archive() {
        let dir = TempDir::new().unwrap();
        let mut rs = sample_record_set();
        rs.push_row(vec!["boom".into(), "action".into()]).unwrap();
        let tracker = Arc::new(RegenerationTracker::new());
        tracker.begin("movies").await.unwrap();

        let (tx, rx) = mpsc::channel(8);
        let worker = RegenerationWorker::new(
            EmbeddingStore::open(dir.path(), "movies"),
            rs,
            Arc::new(FailingEmbedder),
            tracker.clone(),
            tx,
        );
        worker.run().await;

        let events = drain(rx).await;
        assert!(matches!(
            events.last(),
            Some(RegenerationEvent::Failed { .. })
        ));
        assert!(!EmbeddingStore::open(dir.path(), "movies").exists());
        assert!(!tracker.in_flight("movies").await);
    }

    #[tokio::test]
    async fn test_encode_columns_batches_per_column() {
        let rs = sample_record_set();
        let matrices = encode_columns(&rs, &SignatureEmbedder, None).await.unwrap();

        assert_eq!(matrices.len(), 2);
        let name_matrix = &matrices["name"];
        assert_eq!(name_matrix.nrows(), rs.len());
        // Row order follows record order
        assert_eq!(name_matrix.row(0).to_vec(), signature("Alien"));
        assert_eq!(name_matrix.row(1).to_vec(), signature("Heat"));
    }
}
