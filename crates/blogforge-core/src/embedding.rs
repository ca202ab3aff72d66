//! Vector helpers shared by every embedding consumer.
//!
//! Embeddings are stored as little-endian `f32` BLOBs, compared with cosine
//! similarity and checked against their collection's dimensionality before
//! they touch a store.

use anyhow::{bail, Result};

use crate::error::Error;

/// Encode a vector as little-endian `f32` bytes (`len × 4` bytes).
///
/// ```rust
/// use blogforge_core::embedding::{blob_to_vec, vec_to_blob};
///
/// let v = vec![0.25f32, -1.0];
/// assert_eq!(blob_to_vec(&vec_to_blob(&v)).unwrap(), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode a BLOB written by [`vec_to_blob`].
///
/// Fails when the byte length is not a multiple of four.
pub fn blob_to_vec(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        bail!("corrupt embedding blob: {} bytes is not a whole number of f32s", blob.len());
    }
    Ok(blob
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Cosine similarity in `[-1, 1]`.
///
/// Mismatched lengths, empty vectors and zero-norm vectors score `0.0`.
/// Accumulates in `f64` so long vectors stay stable.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a.iter().zip(b).fold((0.0f64, 0.0f64, 0.0f64), |acc, (x, y)| {
        let (x, y) = (*x as f64, *y as f64);
        (acc.0 + x * y, acc.1 + x * x, acc.2 + y * y)
    });

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f64::EPSILON {
        return 0.0;
    }
    (dot / denom).clamp(-1.0, 1.0)
}

/// Reject a vector whose length differs from `expected`.
pub fn ensure_dims(collection: &str, expected: usize, vector: &[f32]) -> Result<()> {
    if vector.len() != expected {
        return Err(Error::DimensionMismatch {
            collection: collection.to_string(),
            expected,
            actual: vector.len(),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::classify;

    #[test]
    fn test_blob_rejects_truncated_bytes() {
        assert!(blob_to_vec(&[0, 0, 128]).is_err());
        assert!(blob_to_vec(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_cosine_basics() {
        let v = [1.0f32, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_ensure_dims() {
        assert!(ensure_dims("kb", 3, &[0.0; 3]).is_ok());
        let err = ensure_dims("kb", 3, &[0.0; 4]).unwrap_err();
        match classify(&err) {
            Some(Error::DimensionMismatch { expected, actual, .. }) => {
                assert_eq!((*expected, *actual), (3, 4));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
