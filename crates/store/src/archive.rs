use crate::matrix::MatrixData;
use chrono::{DateTime, Utc};
use ndarray::Array2;
use semtable_common::{Result, SemtableError};
use semtable_tabular::RecordSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Prefix distinguishing embedding sections from metadata inside an archive
const EMBEDDING_KEY_PREFIX: &str = "embeddings_";

/// Archive key for a source column: prefix plus spaces mapped to underscores.
///
/// The transform alone is not injective for names that already contain
/// underscores, so reverse lookups always go through the archive's stored
/// column list instead of string-replacing back.
fn sanitize_column(name: &str) -> String {
    format!("{}{}", EMBEDDING_KEY_PREFIX, name.replace(' ', "_"))
}

/// On-disk layout of one store: row metadata plus named embedding matrices
#[derive(Debug, Serialize, Deserialize)]
struct ArchiveDocument {
    /// Store name (matches the file stem)
    name: String,

    /// Timestamp of the save that produced this document
    created_at: DateTime<Utc>,

    /// Column schema, in order
    columns: Vec<String>,

    /// Ordered row mappings, original column names to string values
    metadata: Vec<serde_json::Map<String, serde_json::Value>>,

    /// Embedding matrices keyed by sanitized column identifier
    embeddings: BTreeMap<String, MatrixData>,
}

/// A named persisted unit: one record set and its per-column embeddings.
///
/// The archive file is the unit of atomicity. `save` replaces it wholesale
/// through a temp-file rename, so readers only ever observe a fully written
/// state.
pub struct EmbeddingStore {
    name: String,
    path: PathBuf,
}

impl EmbeddingStore {
    /// Handle to the store `name` under `store_dir` (file need not exist yet)
    pub fn open(store_dir: &Path, name: &str) -> Self {
        Self {
            name: name.to_string(),
            path: store_dir.join(format!("{}.json", name)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Persist the record set together with its embedding matrices.
    ///
    /// Every matrix must have exactly one row per record and belong to a
    /// column of the record set; a mismatch is a programming error upstream
    /// and fails the save before anything touches disk.
    pub fn save(
        &self,
        record_set: &RecordSet,
        matrices: &BTreeMap<String, Array2<f32>>,
    ) -> Result<()> {
        for (column, matrix) in matrices {
            if record_set.column_index(column).is_none() {
                return Err(SemtableError::invariant(format!(
                    "embedding matrix for unknown column '{}'",
                    column
                )));
            }
            if matrix.nrows() != record_set.len() {
                return Err(SemtableError::invariant(format!(
                    "column '{}' has {} embeddings for {} rows",
                    column,
                    matrix.nrows(),
                    record_set.len()
                )));
            }
        }

        let metadata = record_set
            .rows()
            .iter()
            .map(|row| {
                record_set
                    .columns()
                    .iter()
                    .zip(row.iter())
                    .map(|(col, val)| (col.clone(), serde_json::Value::String(val.clone())))
                    .collect()
            })
            .collect();

        let embeddings = matrices
            .iter()
            .map(|(column, matrix)| (sanitize_column(column), MatrixData::from_matrix(matrix)))
            .collect();

        let document = ArchiveDocument {
            name: self.name.clone(),
            created_at: Utc::now(),
            columns: record_set.columns().to_vec(),
            metadata,
            embeddings,
        };

        let dir = self
            .path
            .parent()
            .ok_or_else(|| SemtableError::config("store path has no parent directory"))?;
        let tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer(tmp.as_file(), &document)?;
        tmp.persist(&self.path)
            .map_err(|e| SemtableError::Io(e.error))?;

        info!(
            "Saved store '{}': {} rows, {} embedding columns",
            self.name,
            record_set.len(),
            matrices.len()
        );
        Ok(())
    }

    /// Reconstruct the record set, preserving row order
    pub fn load(&self) -> Result<RecordSet> {
        let document = self.read_document()?;
        let mut record_set = RecordSet::new(document.columns.clone())?;

        for mapping in &document.metadata {
            let row = document
                .columns
                .iter()
                .map(|col| {
                    mapping
                        .get(col)
                        .map(value_to_string)
                        .unwrap_or_default()
                })
                .collect();
            record_set.push_row(row)?;
        }

        Ok(record_set)
    }

    /// Source-column names that have a stored embedding matrix, in schema order
    pub fn embedding_columns(&self) -> Result<Vec<String>> {
        let document = self.read_document()?;
        Ok(document
            .columns
            .iter()
            .filter(|col| document.embeddings.contains_key(&sanitize_column(col)))
            .cloned()
            .collect())
    }

    /// Embedding matrix for one source column
    pub fn load_embedding_column(&self, column: &str) -> Result<Array2<f32>> {
        let mut document = self.read_document()?;
        document
            .embeddings
            .remove(&sanitize_column(column))
            .ok_or_else(|| {
                SemtableError::missing_column(format!(
                    "store '{}' has no embeddings for '{}'",
                    self.name, column
                ))
            })?
            .into_matrix()
    }

    fn read_document(&self) -> Result<ArchiveDocument> {
        if !self.path.exists() {
            return Err(SemtableError::not_found(format!(
                "store '{}' does not exist",
                self.name
            )));
        }
        let data = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

/// Names of all stores under `store_dir`, sorted
pub fn list_stores(store_dir: &Path) -> Result<Vec<String>> {
    if !store_dir.exists() {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    for entry in std::fs::read_dir(store_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Metadata values are written as strings; tolerate older archives holding
/// bare scalars by coercing, with null mapped to the empty string
fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tempfile::TempDir;

    fn sample_record_set() -> RecordSet {
        let mut rs =
            RecordSet::new(vec!["movie title".to_string(), "genre".to_string()]).unwrap();
        rs.push_row(vec!["Alien".into(), "horror".into()]).unwrap();
        rs.push_row(vec!["Heat".into(), "crime".into()]).unwrap();
        rs
    }

    fn sample_matrices() -> BTreeMap<String, Array2<f32>> {
        let mut m = BTreeMap::new();
        m.insert(
            "movie title".to_string(),
            array![[1.0f32, 0.0], [0.0, 1.0]],
        );
        m.insert("genre".to_string(), array![[0.5f32, 0.5], [0.25, 0.75]]);
        m
    }

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = EmbeddingStore::open(dir.path(), "movies");
        let rs = sample_record_set();
        let matrices = sample_matrices();

        store.save(&rs, &matrices).unwrap();

        assert_eq!(store.load().unwrap(), rs);
        for (column, matrix) in &matrices {
            assert_eq!(&store.load_embedding_column(column).unwrap(), matrix);
        }
    }

    #[test]
    fn test_embedding_columns_in_schema_order() {
        let dir = TempDir::new().unwrap();
        let store = EmbeddingStore::open(dir.path(), "movies");
        store.save(&sample_record_set(), &sample_matrices()).unwrap();

        // Schema order, not BTreeMap key order
        assert_eq!(
            store.embedding_columns().unwrap(),
            vec!["movie title", "genre"]
        );
    }

    #[test]
    fn test_missing_column() {
        let dir = TempDir::new().unwrap();
        let store = EmbeddingStore::open(dir.path(), "movies");
        store.save(&sample_record_set(), &sample_matrices()).unwrap();

        let err = store.load_embedding_column("year").unwrap_err();
        assert!(matches!(err, SemtableError::MissingColumn(_)));
    }

    #[test]
    fn test_row_count_mismatch_fails_save() {
        let dir = TempDir::new().unwrap();
        let store = EmbeddingStore::open(dir.path(), "movies");
        let rs = sample_record_set();

        let mut matrices = BTreeMap::new();
        matrices.insert("genre".to_string(), array![[1.0f32, 0.0]]); // 1 row for 2

        let err = store.save(&rs, &matrices).unwrap_err();
        assert!(matches!(err, SemtableError::InvariantViolation(_)));
        assert!(!store.exists(), "failed save must not create the archive");
    }

    #[test]
    fn test_matrix_for_unknown_column_fails_save() {
        let dir = TempDir::new().unwrap();
        let store = EmbeddingStore::open(dir.path(), "movies");
        let mut matrices = BTreeMap::new();
        matrices.insert("year".to_string(), array![[1.0f32], [2.0]]);

        assert!(store.save(&sample_record_set(), &matrices).is_err());
    }

    #[test]
    fn test_save_replaces_whole_archive() {
        let dir = TempDir::new().unwrap();
        let store = EmbeddingStore::open(dir.path(), "movies");
        store.save(&sample_record_set(), &sample_matrices()).unwrap();

        let mut smaller = RecordSet::new(vec!["movie title".to_string()]).unwrap();
        smaller.push_row(vec!["Alien".into()]).unwrap();
        store.save(&smaller, &BTreeMap::new()).unwrap();

        assert_eq!(store.load().unwrap(), smaller);
        assert!(store.embedding_columns().unwrap().is_empty());
    }

    #[test]
    fn test_list_stores() {
        let dir = TempDir::new().unwrap();
        assert!(list_stores(dir.path()).unwrap().is_empty());

        EmbeddingStore::open(dir.path(), "b")
            .save(&sample_record_set(), &BTreeMap::new())
            .unwrap();
        EmbeddingStore::open(dir.path(), "a")
            .save(&sample_record_set(), &BTreeMap::new())
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        assert_eq!(list_stores(dir.path()).unwrap(), vec!["a", "b"]);
    }
}
