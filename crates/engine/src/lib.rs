//! Orchestration layer: the only surface the presentation side calls.
//!
//! The engine never reaches into caller state; long-running regenerations
//! report back exclusively through [`RegenerationEvent`] messages.

pub mod jobs;
pub mod worker;

use semtable_common::{AppConfig, Result, SemtableError};
use semtable_embed::Embedder;
use semtable_search::{RankedResult, SimilarityEngine};
use semtable_store::{list_stores, merge, EmbeddingStore, MergeOutcome};
use semtable_tabular::{load_files, RecordSet};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

pub use jobs::{RegenerationTracker, TaskInfo, TaskStatus};
pub use worker::{encode_columns, RegenerationEvent, RegenerationWorker};

/// What the caller is searching: one store, one embedding column.
///
/// Passed explicitly on every query; the engine keeps no current-selection
/// state of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSession {
    pub store: String,
    pub column: String,
}

/// Result of kicking off a merge
pub enum MergeKickoff {
    /// The upload added nothing new; the archive is already up to date
    NoChange,

    /// Regeneration started; progress and completion arrive on `events`
    Started {
        task_id: String,
        events: mpsc::Receiver<RegenerationEvent>,
    },
}

/// Facade over loading, merging, regeneration and search
pub struct SemanticEngine {
    config: AppConfig,
    embedder: Arc<dyn Embedder>,
    similarity: SimilarityEngine,
    tracker: Arc<RegenerationTracker>,
}

impl SemanticEngine {
    pub fn new(config: AppConfig, embedder: Arc<dyn Embedder>) -> Self {
        let similarity = SimilarityEngine::new(embedder.clone());
        Self {
            config,
            embedder,
            similarity,
            tracker: Arc::new(RegenerationTracker::new()),
        }
    }

    /// Names of all persisted stores
    pub fn list_available_stores(&self) -> Result<Vec<String>> {
        list_stores(&self.config.store_dir)
    }

    /// Columns of `store` that carry embeddings, in schema order
    pub fn select_store(&self, store: &str) -> Result<Vec<String>> {
        self.open_existing(store)?.embedding_columns()
    }

    /// Regeneration task states, for progress display
    pub async fn regeneration_tasks(&self) -> Vec<TaskInfo> {
        self.tracker.tasks().await
    }

    /// Rank the session's store rows against `text`.
    ///
    /// Reads only the fully saved archive, so it is safe to call while a
    /// regeneration for the same store is in flight; it sees the previous
    /// state until the new archive lands.
    pub async fn run_query(
        &self,
        session: &SearchSession,
        text: &str,
        top_n: usize,
    ) -> Result<Vec<RankedResult>> {
        let store = self.open_existing(&session.store)?;
        if !store
            .embedding_columns()?
            .iter()
            .any(|c| c == &session.column)
        {
            return Err(SemtableError::no_embeddings(format!(
                "store '{}' has no embeddings for column '{}'",
                session.store, session.column
            )));
        }

        let record_set = store.load()?;
        let matrix = store.load_embedding_column(&session.column)?;
        self.similarity.search(text, &record_set, &matrix, top_n).await
    }

    /// Load delimited sources, encode every column, and create the store.
    ///
    /// Runs to completion before returning; the store name is locked while
    /// it does, so an ingest cannot overlap a regeneration of the same name.
    pub async fn ingest_and_save<P: AsRef<Path>>(
        &self,
        paths: &[P],
        output_name: &str,
    ) -> Result<()> {
        let record_set = load_files(paths)?;
        if record_set.is_empty() {
            return Err(SemtableError::parse("sources contained no data rows"));
        }

        self.tracker.begin(output_name).await?;
        let result = self.encode_and_save(output_name, &record_set).await;
        match &result {
            Ok(()) => self.tracker.complete(output_name).await,
            Err(e) => self.tracker.fail(output_name, e.to_string()).await,
        }
        result
    }

    /// Merge uploaded rows into `store` and, when anything changed, start a
    /// background regeneration of every embedding column.
    pub async fn merge_and_regenerate<P: AsRef<Path>>(
        &self,
        store: &str,
        paths: &[P],
    ) -> Result<MergeKickoff> {
        let handle = self.open_existing(store)?;
        let existing = handle.load()?;
        let incoming = load_files(paths)?;

        let merged = match merge(&existing, &incoming)? {
            MergeOutcome::Unchanged => {
                info!("Store '{}' is already up to date", store);
                return Ok(MergeKickoff::NoChange);
            }
            MergeOutcome::Merged(rs) => rs,
        };

        let task_id = self.tracker.begin(store).await?;
        // Capacity covers one progress event per column plus the terminal
        // message, so the worker never blocks on a slow consumer
        let (tx, rx) = mpsc::channel(merged.columns().len() + 2);
        let worker = RegenerationWorker::new(
            handle,
            merged,
            self.embedder.clone(),
            self.tracker.clone(),
            tx,
        );
        tokio::spawn(worker.run());

        Ok(MergeKickoff::Started {
            task_id,
            events: rx,
        })
    }

    async fn encode_and_save(&self, name: &str, record_set: &RecordSet) -> Result<()> {
        let matrices = encode_columns(record_set, self.embedder.as_ref(), None).await?;
        EmbeddingStore::open(&self.config.store_dir, name).save(record_set, &matrices)
    }

    fn open_existing(&self, name: &str) -> Result<EmbeddingStore> {
        let store = EmbeddingStore::open(&self.config.store_dir, name);
        if !store.exists() {
            return Err(SemtableError::not_found(format!(
                "store '{}' does not exist",
                name
            )));
        }
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::io::Write;
    use tempfile::TempDir;

    /// Deterministic embedder: identical texts map to identical vectors
    struct SignatureEmbedder;

    #[async_trait]
    impl Embedder for SignatureEmbedder {
        fn model(&self) -> &str {
            "signature"
        }

        async fn embed_batch(
            &self,
            texts: &[String],
        ) -> semtable_common::Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let sum: u32 = t.bytes().map(u32::from).sum();
                    vec![t.len() as f32, (sum % 97) as f32, (sum % 13) as f32, 1.0]
                })
                .collect())
        }
    }

    fn engine(dir: &TempDir) -> SemanticEngine {
        let config = AppConfig {
            store_dir: dir.path().to_path_buf(),
            ..AppConfig::default()
        };
        SemanticEngine::new(config, Arc::new(SignatureEmbedder))
    }

    fn write_csv(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[tokio::test]
    async fn test_ingest_select_query() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let csv = write_csv(&dir, "in.csv", "name,genre\nAlien,horror\nHeat,crime\n");

        engine.ingest_and_save(&[csv], "movies").await.unwrap();

        assert_eq!(engine.list_available_stores().unwrap(), vec!["movies"]);
        assert_eq!(
            engine.select_store("movies").unwrap(),
            vec!["name", "genre"]
        );

        let session = SearchSession {
            store: "movies".to_string(),
            column: "name".to_string(),
        };
        let results = engine.run_query(&session, "Alien", 1).await.unwrap();
        assert_eq!(results.len(), 1);
        // Identical text, identical vector: exact match ranks first at 1.00
        assert_eq!(results[0].row[0], ("name".to_string(), "Alien".to_string()));
        assert_eq!(results[0].similarity, 1.0);
    }

    #[tokio::test]
    async fn test_query_errors() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let csv = write_csv(&dir, "in.csv", "name\nAlien\n");
        engine.ingest_and_save(&[csv], "movies").await.unwrap();

        let missing_store = SearchSession {
            store: "books".to_string(),
            column: "name".to_string(),
        };
        assert!(matches!(
            engine.run_query(&missing_store, "x", 5).await.unwrap_err(),
            SemtableError::NotFound(_)
        ));

        let missing_column = SearchSession {
            store: "movies".to_string(),
            column: "genre".to_string(),
        };
        assert!(matches!(
            engine.run_query(&missing_column, "x", 5).await.unwrap_err(),
            SemtableError::NoEmbeddings(_)
        ));

        let session = SearchSession {
            store: "movies".to_string(),
            column: "name".to_string(),
        };
        assert!(matches!(
            engine.run_query(&session, "  ", 5).await.unwrap_err(),
            SemtableError::EmptyQuery
        ));
    }

    #[tokio::test]
    async fn test_merge_no_change_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let csv = write_csv(&dir, "in.csv", "name\nAlien\nHeat\n");
        engine.ingest_and_save(&[csv.clone()], "movies").await.unwrap();

        // Same rows in a different order dedup back to the existing set
        let again = write_csv(&dir, "again.csv", "name\nHeat\nAlien\n");
        match engine.merge_and_regenerate("movies", &[again]).await.unwrap() {
            MergeKickoff::NoChange => {}
            MergeKickoff::Started { .. } => panic!("expected no change"),
        }
        assert!(!engine.tracker.in_flight("movies").await);
    }

    #[tokio::test]
    async fn test_merge_regenerates_and_extends_store() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        let csv = write_csv(&dir, "in.csv", "name\nAlien\nHeat\n");
        engine.ingest_and_save(&[csv], "movies").await.unwrap();

        let upload = write_csv(&dir, "up.csv", "name\nHeat\nBlade Runner\n");
        let mut events = match engine
            .merge_and_regenerate("movies", &[upload])
            .await
            .unwrap()
        {
            MergeKickoff::Started { events, .. } => events,
            MergeKickoff::NoChange => panic!("expected a merge"),
        };

        let mut last_progress = 0;
        loop {
            match events.recv().await.expect("worker dropped channel") {
                RegenerationEvent::Progress { completed, total } => {
                    assert!(completed > last_progress, "progress must increase");
                    assert_eq!(total, 1);
                    last_progress = completed;
                }
                RegenerationEvent::Completed => break,
                RegenerationEvent::Failed { message } => panic!("failed: {}", message),
            }
        }

        let store = EmbeddingStore::open(dir.path(), "movies");
        let rows = store.load().unwrap();
        let names: Vec<_> = rows.rows().iter().map(|r| r[0].clone()).collect();
        assert_eq!(names, ["Alien", "Heat", "Blade Runner"]);

        let session = SearchSession {
            store: "movies".to_string(),
            column: "name".to_string(),
        };
        let results = engine.run_query(&session, "Blade Runner", 1).await.unwrap();
        assert_eq!(
            results[0].row[0],
            ("name".to_string(), "Blade Runner".to_string())
        );
    }
}
