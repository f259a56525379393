use std::ops::Mul;

use crate::csr::CsrMatrix;

impl CsrMatrix {
    /// Transposed copy.
    pub fn transpose(&self) -> Self {
        let mut rows: Vec<Vec<(u32, f64)>> = vec![Vec::new(); self.ncols];
        for (i, j, v) in self.iter() {
            rows[j].push((i as u32, v));
        }
        Self::from_rows(self.nrows, rows)
    }

    /// Matrix product `self · other` (Gustavson's row-by-row algorithm).
    /// Panics if the inner dimensions disagree.
    pub fn matmul(&self, other: &CsrMatrix) -> CsrMatrix {
        assert_eq!(
            self.ncols, other.nrows,
            "matmul shape mismatch: {:?} x {:?}", self.shape(), other.shape()
        );

        let mut acc = vec![0.0; other.ncols];
        let mut touched = vec![false; other.ncols];
        let mut cols: Vec<u32> = Vec::new();
        let mut rows = Vec::with_capacity(self.nrows);

        for i in 0..self.nrows {
            for (k, a) in self.row(i) {
                for (j, b) in other.row(k) {
                    if !touched[j] {
                        touched[j] = true;
                        cols.push(j as u32);
                    }
                    acc[j] += a * b;
                }
            }
            let mut row = Vec::with_capacity(cols.len());
            for &j in &cols {
                row.push((j, acc[j as usize]));
                acc[j as usize] = 0.0;
                touched[j as usize] = false;
            }
            cols.clear();
            rows.push(row);
        }

        Self::from_rows(other.ncols, rows)
    }

    /// Elementwise (Hadamard) product. Panics if the shapes differ.
    pub fn hadamard(&self, other: &CsrMatrix) -> CsrMatrix {
        assert_eq!(
            self.shape(), other.shape(),
            "hadamard shape mismatch: {:?} vs {:?}", self.shape(), other.shape()
        );

        let rows: Vec<Vec<(u32, f64)>> = (0..self.nrows)
            .map(|i| {
                let mut out = Vec::new();
                let mut theirs = other.row(i).peekable();
                for (j, a) in self.row(i) {
                    while theirs.next_if(|&(k, _)| k < j).is_some() {}
                    if let Some(&(k, b)) = theirs.peek() {
                        if k == j { out.push((j as u32, a * b)); }
                    }
                }
                out
            })
            .collect();

        Self::from_rows(self.ncols, rows)
    }

    /// Multiply row `i` by `factors[i]`; same as `diag(factors) · self`.
    pub fn scale_rows(&self, factors: &[f64]) -> CsrMatrix {
        assert_eq!(factors.len(), self.nrows, "one factor per row required");
        let rows: Vec<Vec<(u32, f64)>> = (0..self.nrows)
            .map(|i| self.row(i).map(|(j, v)| (j as u32, v * factors[i])).collect())
            .collect();
        Self::from_rows(self.ncols, rows)
    }

    /// Multiply column `j` by `factors[j]`; same as `self · diag(factors)`.
    pub fn scale_cols(&self, factors: &[f64]) -> CsrMatrix {
        assert_eq!(factors.len(), self.ncols, "one factor per column required");
        let rows: Vec<Vec<(u32, f64)>> = (0..self.nrows)
            .map(|i| self.row(i).map(|(j, v)| (j as u32, v * factors[j])).collect())
            .collect();
        Self::from_rows(self.ncols, rows)
    }

    /// Apply `f` to every stored value; results equal to zero are dropped.
    pub fn map_values<F: Fn(f64) -> f64>(&self, f: F) -> CsrMatrix {
        let rows: Vec<Vec<(u32, f64)>> = (0..self.nrows)
            .map(|i| self.row(i).map(|(j, v)| (j as u32, f(v))).collect())
            .collect();
        Self::from_rows(self.ncols, rows)
    }

    /// Keep rows for which `keep(row)` holds; other rows become empty. Shape is unchanged.
    pub fn retain_rows<F: Fn(usize) -> bool>(&self, keep: F) -> CsrMatrix {
        let rows: Vec<Vec<(u32, f64)>> = (0..self.nrows)
            .map(|i| if keep(i) { self.row(i).map(|(j, v)| (j as u32, v)).collect() } else { Vec::new() })
            .collect();
        Self::from_rows(self.ncols, rows)
    }

    /// Keep columns for which `keep(col)` holds; other columns become empty. Shape is unchanged.
    pub fn retain_cols<F: Fn(usize) -> bool>(&self, keep: F) -> CsrMatrix {
        let rows: Vec<Vec<(u32, f64)>> = (0..self.nrows)
            .map(|i| self.row(i).filter(|&(j, _)| keep(j)).map(|(j, v)| (j as u32, v)).collect())
            .collect();
        Self::from_rows(self.ncols, rows)
    }

    /// Dense vector-matrix product `x · self`; length = `ncols`.
    pub fn left_mul_vec(&self, x: &[f64]) -> Vec<f64> {
        assert_eq!(x.len(), self.nrows, "vector length must equal row count");
        let mut out = vec![0.0; self.ncols];
        for (i, j, v) in self.iter() {
            out[j] += x[i] * v;
        }
        out
    }
}

impl Mul<&CsrMatrix> for &CsrMatrix {
    type Output = CsrMatrix;

    fn mul(self, rhs: &CsrMatrix) -> CsrMatrix { self.matmul(rhs) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagonal_scaling_matches_product() {
        let m = CsrMatrix::from_triplets(2, 2, [(0, 0, 1.0), (0, 1, 2.0), (1, 0, 3.0)]);
        let d = CsrMatrix::from_diagonal(&[2.0, 10.0]);
        assert_eq!(m.scale_rows(&[2.0, 10.0]), d.matmul(&m));
        assert_eq!(m.scale_cols(&[2.0, 10.0]), m.matmul(&d));
    }

    #[test]
    fn hadamard_skips_unmatched_entries() {
        let a = CsrMatrix::from_triplets(1, 4, [(0, 0, 2.0), (0, 2, 3.0), (0, 3, 4.0)]);
        let b = CsrMatrix::from_triplets(1, 4, [(0, 1, 5.0), (0, 2, 6.0), (0, 3, 0.5)]);
        let h = a.hadamard(&b);
        assert_eq!(h.nnz(), 2);
        assert_eq!(h.get(0, 2), 18.0);
        assert_eq!(h.get(0, 3), 2.0);
    }
}
