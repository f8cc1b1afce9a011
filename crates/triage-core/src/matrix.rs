//! Dense label matrices and sparse feature matrices.

use crate::error::{Result, TriageError};
use serde::{Deserialize, Serialize};

/// Row-major matrix of integer labels, one column per label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelMatrix {
    n_rows: usize,
    n_cols: usize,
    data: Vec<u8>,
}

impl LabelMatrix {
    /// Create an empty matrix with `n_cols` columns.
    pub fn new(n_cols: usize) -> Self {
        Self {
            n_rows: 0,
            n_cols,
            data: Vec::new(),
        }
    }

    /// Build a matrix from equally sized rows.
    pub fn from_rows(n_cols: usize, rows: &[Vec<u8>]) -> Result<Self> {
        let mut matrix = Self::new(n_cols);
        matrix.data.reserve(n_cols * rows.len());
        for row in rows {
            matrix.push_row(row)?;
        }
        Ok(matrix)
    }

    /// Append a row. Fails if its width differs from the matrix.
    pub fn push_row(&mut self, row: &[u8]) -> Result<()> {
        if row.len() != self.n_cols {
            return Err(TriageError::Data(format!(
                "label row has {} columns, expected {}",
                row.len(),
                self.n_cols
            )));
        }
        self.data.extend_from_slice(row);
        self.n_rows += 1;
        Ok(())
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn get(&self, row: usize, col: usize) -> u8 {
        self.data[row * self.n_cols + col]
    }

    pub fn row(&self, row: usize) -> &[u8] {
        &self.data[row * self.n_cols..(row + 1) * self.n_cols]
    }

    /// Copy of one column.
    pub fn column(&self, col: usize) -> Vec<u8> {
        (0..self.n_rows).map(|r| self.get(r, col)).collect()
    }

    /// New matrix holding the given rows, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        let mut data = Vec::with_capacity(rows.len() * self.n_cols);
        for &r in rows {
            data.extend_from_slice(self.row(r));
        }
        Self {
            n_rows: rows.len(),
            n_cols: self.n_cols,
            data,
        }
    }
}

/// One row of a sparse matrix; indices are strictly increasing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseRow {
    indices: Vec<usize>,
    values: Vec<f64>,
}

impl SparseRow {
    /// Build a row from `(column, value)` pairs sorted by column.
    /// Zero values are dropped.
    pub fn from_sorted(entries: impl IntoIterator<Item = (usize, f64)>) -> Self {
        let mut row = Self::default();
        for (idx, value) in entries {
            debug_assert!(row.indices.last().map_or(true, |&last| last < idx));
            if value != 0.0 {
                row.indices.push(idx);
                row.values.push(value);
            }
        }
        row
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Value at `col`; absent entries are zero.
    pub fn get(&self, col: usize) -> f64 {
        match self.indices.binary_search(&col) {
            Ok(pos) => self.values[pos],
            Err(_) => 0.0,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    pub(crate) fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }
}

/// Compressed-row sparse matrix of `f64` features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseMatrix {
    n_cols: usize,
    rows: Vec<SparseRow>,
}

impl SparseMatrix {
    pub fn new(n_cols: usize) -> Self {
        Self {
            n_cols,
            rows: Vec::new(),
        }
    }

    pub fn from_rows(n_cols: usize, rows: Vec<SparseRow>) -> Result<Self> {
        if let Some(bad) = rows
            .iter()
            .find(|r| r.indices.last().map_or(false, |&i| i >= n_cols))
        {
            return Err(TriageError::Data(format!(
                "sparse row references column {} but matrix has {} columns",
                bad.indices.last().copied().unwrap_or_default(),
                n_cols
            )));
        }
        Ok(Self { n_cols, rows })
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn row(&self, row: usize) -> &SparseRow {
        &self.rows[row]
    }

    pub fn rows(&self) -> &[SparseRow] {
        &self.rows
    }

    pub(crate) fn rows_mut(&mut self) -> &mut [SparseRow] {
        &mut self.rows
    }

    pub fn nnz(&self) -> usize {
        self.rows.iter().map(SparseRow::nnz).sum()
    }
}
