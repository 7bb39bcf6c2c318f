//! Brute-force Euclidean nearest-neighbour index.

use meditrack_common::{euclidean_distance, EngineError, Result};
use ndarray::{Array2, ArrayView1, ArrayView2};

#[derive(Debug, Clone)]
pub struct NearestNeighbors {
    points: Array2<f64>,
    n_neighbors: usize,
}

impl NearestNeighbors {
    /// Index the rows of `points`. The default query size is
    /// `min(n_neighbors, rows)`.
    pub fn fit(points: &ArrayView2<f64>, n_neighbors: usize) -> Result<Self> {
        if points.nrows() == 0 {
            return Err(EngineError::InsufficientData("no points to index".to_string()));
        }
        Ok(Self {
            points: points.to_owned(),
            n_neighbors: n_neighbors.min(points.nrows()),
        })
    }

    fn len(&self) -> usize {
        self.points.nrows()
    }

    pub fn n_neighbors(&self) -> usize {
        self.n_neighbors
    }

    /// The `k` indexed rows closest to `query` as `(row, distance)`, nearest
    /// first. Equal distances keep index order. `k` is clamped to the index
    /// size; `None` uses the fitted neighbour count.
    pub fn kneighbors(&self, query: &ArrayView1<f64>, k: Option<usize>) -> Result<Vec<(usize, f64)>> {
        if query.len() != self.points.ncols() {
            return Err(EngineError::DimensionMismatch {
                expected: self.points.ncols(),
                actual: query.len(),
            });
        }
        let k = k.unwrap_or(self.n_neighbors).min(self.len());

        let mut ranked: Vec<(usize, f64)> = self
            .points
            .rows()
            .into_iter()
            .enumerate()
            .map(|(row, point)| (row, euclidean_distance(&point, query)))
            .collect();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
        ranked.truncate(k);
        Ok(ranked)
    }
}
