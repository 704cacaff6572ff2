use ndarray::Array2;
use semtable_common::{Result, SemtableError};

/// Cosine similarity between two vectors, in [-1, 1].
///
/// Accumulates in f64. A zero-norm vector on either side is an error, never
/// a NaN propagated into a ranking.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(SemtableError::invariant(format!(
            "vector dimensions differ: {} vs {}",
            a.len(),
            b.len()
        )));
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Err(SemtableError::degenerate_vector(
            "cosine similarity is undefined for a zero vector",
        ));
    }

    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Cosine similarity of `query` against every row of `matrix`.
///
/// Element-by-element identical to calling [`cosine_similarity`] per row.
pub fn batch_cosine_similarity(matrix: &Array2<f32>, query: &[f32]) -> Result<Vec<f64>> {
    if matrix.ncols() != query.len() {
        return Err(SemtableError::invariant(format!(
            "query dimension {} does not match matrix dimension {}",
            query.len(),
            matrix.ncols()
        )));
    }

    let mut scores = Vec::with_capacity(matrix.nrows());
    for row in matrix.outer_iter() {
        let score = match row.as_slice() {
            Some(slice) => cosine_similarity(slice, query)?,
            None => cosine_similarity(&row.to_vec(), query)?,
        };
        scores.push(score);
    }
    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_self_similarity_is_one() {
        let v = [0.3f32, -1.2, 4.5];
        let score = cosine_similarity(&v, &v).unwrap();
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_orthogonal_is_zero() {
        let score = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap();
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_opposite_is_minus_one() {
        let score = cosine_similarity(&[2.0, 0.0], &[-3.0, 0.0]).unwrap();
        assert!((score + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_vector_is_degenerate() {
        let err = cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]).unwrap_err();
        assert!(matches!(err, SemtableError::DegenerateVector(_)));
        let err = cosine_similarity(&[1.0, 1.0], &[0.0, 0.0]).unwrap_err();
        assert!(matches!(err, SemtableError::DegenerateVector(_)));
    }

    #[test]
    fn test_length_mismatch() {
        let err = cosine_similarity(&[1.0], &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, SemtableError::InvariantViolation(_)));
    }

    #[test]
    fn test_batch_matches_scalar_elementwise() {
        let matrix = array![
            [1.0f32, 0.0, 0.0],
            [0.7, 0.7, 0.0],
            [-1.0, 2.0, 0.5],
            [0.1, 0.1, 0.1],
        ];
        let query = [0.5f32, 0.25, -1.0];

        let batch = batch_cosine_similarity(&matrix, &query).unwrap();
        assert_eq!(batch.len(), matrix.nrows());
        for (i, row) in matrix.outer_iter().enumerate() {
            let scalar = cosine_similarity(row.as_slice().unwrap(), &query).unwrap();
            assert_eq!(batch[i], scalar, "row {}", i);
        }
    }

    #[test]
    fn test_batch_dimension_mismatch() {
        let matrix = array![[1.0f32, 0.0], [0.0, 1.0]];
        let err = batch_cosine_similarity(&matrix, &[1.0, 0.0, 0.0]).unwrap_err();
        assert!(matches!(err, SemtableError::InvariantViolation(_)));
    }
}
