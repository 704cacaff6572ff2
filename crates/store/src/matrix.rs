use ndarray::Array2;
use semtable_common::{Result, SemtableError};
use serde::{Deserialize, Serialize};

/// Serialized form of an embedding matrix inside an archive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixData {
    /// (row_count, embedding_dim)
    pub shape: (usize, usize),
    /// Row-major values, `shape.0 * shape.1` of them
    pub data: Vec<f32>,
}

impl MatrixData {
    pub fn from_matrix(matrix: &Array2<f32>) -> Self {
        Self {
            shape: (matrix.nrows(), matrix.ncols()),
            data: matrix.iter().copied().collect(),
        }
    }

    pub fn into_matrix(self) -> Result<Array2<f32>> {
        Array2::from_shape_vec(self.shape, self.data).map_err(|e| {
            SemtableError::invariant(format!("stored matrix shape is inconsistent: {}", e))
        })
    }
}

/// Build a dense matrix from embedder output, one row per input text.
///
/// All rows must share one dimension; a ragged batch is an embedder fault.
pub fn matrix_from_rows(rows: Vec<Vec<f32>>) -> Result<Array2<f32>> {
    let dim = match rows.first() {
        Some(first) => first.len(),
        None => return Ok(Array2::zeros((0, 0))),
    };
    if dim == 0 {
        return Err(SemtableError::encoding("embedder returned empty vectors"));
    }

    let row_count = rows.len();
    let mut flat = Vec::with_capacity(row_count * dim);
    for (i, row) in rows.into_iter().enumerate() {
        if row.len() != dim {
            return Err(SemtableError::encoding(format!(
                "embedding {} has dimension {}, expected {}",
                i,
                row.len(),
                dim
            )));
        }
        flat.extend(row);
    }

    Array2::from_shape_vec((row_count, dim), flat)
        .map_err(|e| SemtableError::invariant(e.to_string()))
}
