use crate::error::{Result, RetrievalError};
use ndarray::{Array2, ArrayView1, Axis};

/// A stored vector's position in the index paired with its squared L2 distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: usize,
    pub distance: f32,
}

/// Exact nearest-neighbour index over a contiguous row arena.
///
/// Row `i` holds the vector added `i`-th, so ids are insertion order and are
/// never reused until [`VectorIndex::clear`].
#[derive(Debug, Default)]
pub struct VectorIndex {
    vectors: Option<Array2<f32>>,
}

impl VectorIndex {
    pub fn new() -> Self {
        VectorIndex { vectors: None }
    }

    pub fn dimension(&self) -> Option<usize> {
        self.vectors.as_ref().map(|v| v.ncols())
    }

    pub fn len(&self) -> usize {
        self.vectors.as_ref().map_or(0, |v| v.nrows())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends `vectors` as one unit. The first non-empty batch fixes the
    /// dimension; any vector disagreeing with it, or holding a NaN or
    /// infinite value, rejects the whole batch without touching the index.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        let Some(first) = vectors.first() else {
            return Ok(());
        };

        let expected = self.dimension().unwrap_or(first.len());
        if expected == 0 {
            return Err(RetrievalError::validation("Embeddings must have at least one dimension"));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            return Err(RetrievalError::DimensionMismatch {
                expected,
                actual: bad.len(),
            });
        }
        if let Some(pos) = vectors.iter().position(|v| !is_finite(v)) {
            return Err(RetrievalError::EmbeddingProvider(format!(
                "Embedding {pos} contains a non-finite value"
            )));
        }

        let flat: Vec<f32> = vectors.iter().flatten().copied().collect();
        let batch = Array2::from_shape_vec((vectors.len(), expected), flat)
            .map_err(|e| RetrievalError::validation(format!("Bad embedding batch: {e}")))?;

        match self.vectors.as_mut() {
            Some(arena) => arena
                .append(Axis(0), batch.view())
                .map_err(|e| RetrievalError::validation(format!("Bad embedding batch: {e}")))?,
            None => self.vectors = Some(batch),
        }
        Ok(())
    }

    /// Returns the `k` closest vectors by squared Euclidean distance, ascending,
    /// ties broken by lower id. `k` is clamped to the index size.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        let Some(arena) = self.vectors.as_ref() else {
            return Ok(Vec::new());
        };
        if query.len() != arena.ncols() {
            return Err(RetrievalError::DimensionMismatch {
                expected: arena.ncols(),
                actual: query.len(),
            });
        }
        if !is_finite(query) {
            return Err(RetrievalError::EmbeddingProvider(
                "Query embedding contains a non-finite value".to_string(),
            ));
        }

        let query = ArrayView1::from(query);
        let mut neighbors: Vec<Neighbor> = arena
            .outer_iter()
            .enumerate()
            .map(|(id, row)| {
                let diff = &row - &query;
                // Finite inputs can still overflow the sum of squares.
                let distance = diff.dot(&diff).min(f32::MAX);
                Neighbor { id, distance }
            })
            .collect();

        neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.id.cmp(&b.id)));
        neighbors.truncate(k.min(arena.nrows()));
        Ok(neighbors)
    }

    pub fn clear(&mut self) {
        self.vectors = None;
    }
}

fn is_finite(vector: &[f32]) -> bool {
    vector.iter().all(|x| x.is_finite())
}
