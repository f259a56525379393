/// A sparse `f64` matrix in compressed sparse row format.
///
/// `offsets[i]..offsets[i+1]` indexes into `indices`/`values` to give the
/// non-zero entries of row `i`.  Column indices are strictly increasing within
/// each row, so every (row, col) pair appears at most once.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    pub(crate) nrows: usize,
    pub(crate) ncols: usize,
    /// Row offsets; length = `nrows + 1`.
    pub(crate) offsets: Vec<usize>,
    /// Flattened column indices; sorted within each row.
    pub(crate) indices: Vec<u32>,
    pub(crate) values: Vec<f64>,
}

impl CsrMatrix {
    /// An `nrows` x `ncols` matrix with no stored entries.
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            offsets: vec![0; nrows + 1],
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// The `n` x `n` identity matrix.
    pub fn identity(n: usize) -> Self {
        Self::from_diagonal(&vec![1.0; n])
    }

    /// Square matrix with `diag` on the main diagonal. Zero entries are not stored.
    pub fn from_diagonal(diag: &[f64]) -> Self {
        Self::from_triplets(
            diag.len(),
            diag.len(),
            diag.iter().enumerate().map(|(i, &v)| (i, i, v)),
        )
    }

    /// Assemble from (row, col, value) triplets.
    /// Duplicate coordinates are summed, zero values are not stored.
    /// Panics if a coordinate falls outside the given shape.
    pub fn from_triplets<I>(nrows: usize, ncols: usize, triplets: I) -> Self
    where
        I: IntoIterator<Item = (usize, usize, f64)>,
    {
        let mut rows: Vec<Vec<(u32, f64)>> = vec![Vec::new(); nrows];
        for (r, c, v) in triplets {
            assert!(r < nrows, "row index {r} out of bounds for {nrows} rows");
            assert!(c < ncols, "column index {c} out of bounds for {ncols} columns");
            rows[r].push((c as u32, v));
        }
        Self::from_rows(ncols, rows)
    }

    /// Assemble from per-row (col, value) lists in any order.
    pub(crate) fn from_rows(ncols: usize, rows: Vec<Vec<(u32, f64)>>) -> Self {
        let nrows = rows.len();
        let mut offsets = Vec::with_capacity(nrows + 1);
        let mut indices = Vec::new();
        let mut values = Vec::new();
        offsets.push(0);

        for mut row in rows {
            row.sort_unstable_by_key(|&(c, _)| c);
            let start = indices.len();
            for (c, v) in row {
                // Merge duplicates into the previous entry of the same row.
                if indices.len() > start && indices[indices.len() - 1] == c {
                    let last = values.len() - 1;
                    values[last] += v;
                } else {
                    indices.push(c);
                    values.push(v);
                }
            }
            // Drop entries that are (or summed to) exactly zero.
            let mut write = start;
            for read in start..indices.len() {
                if values[read] != 0.0 {
                    indices[write] = indices[read];
                    values[write] = values[read];
                    write += 1;
                }
            }
            indices.truncate(write);
            values.truncate(write);
            offsets.push(indices.len());
        }

        Self { nrows, ncols, offsets, indices, values }
    }

    #[inline] pub fn nrows(&self) -> usize { self.nrows }

    #[inline] pub fn ncols(&self) -> usize { self.ncols }

    #[inline] pub fn shape(&self) -> (usize, usize) { (self.nrows, self.ncols) }

    /// Number of stored (non-zero) entries.
    #[inline] pub fn nnz(&self) -> usize { self.values.len() }

    #[inline]
    fn range(&self, row: usize) -> std::ops::Range<usize> {
        self.offsets[row]..self.offsets[row + 1]
    }

    /// Iterator over the (col, value) entries of `row`, in column order.
    pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.range(row).map(move |k| (self.indices[k] as usize, self.values[k]))
    }

    /// Iterator over all (row, col, value) entries in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.nrows).flat_map(move |i| self.row(i).map(move |(j, v)| (i, j, v)))
    }

    /// Value at (row, col); zero when not stored.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        assert!(row < self.nrows && col < self.ncols, "({row}, {col}) out of bounds");
        let range = self.range(row);
        match self.indices[range.clone()].binary_search(&(col as u32)) {
            Ok(k) => self.values[range.start + k],
            Err(_) => 0.0,
        }
    }

    /// Sum of all entries.
    pub fn sum(&self) -> f64 { self.values.iter().sum() }

    /// Per-row sums; length = `nrows`.
    pub fn row_sums(&self) -> Vec<f64> {
        (0..self.nrows).map(|i| self.range(i).map(|k| self.values[k]).sum()).collect()
    }

    /// Per-column sums; length = `ncols`.
    pub fn col_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.ncols];
        for (&c, &v) in self.indices.iter().zip(&self.values) {
            sums[c as usize] += v;
        }
        sums
    }

    /// Main diagonal; length = `min(nrows, ncols)`.
    pub fn diagonal(&self) -> Vec<f64> {
        (0..self.nrows.min(self.ncols)).map(|i| self.get(i, i)).collect()
    }

    /// Dense row-major copy, mostly useful in tests.
    pub fn to_dense(&self) -> Vec<Vec<f64>> {
        let mut dense = vec![vec![0.0; self.ncols]; self.nrows];
        for (i, j, v) in self.iter() {
            dense[i][j] = v;
        }
        dense
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_summed() {
        let m = CsrMatrix::from_triplets(2, 3, [(0, 2, 1.0), (0, 2, 2.5), (1, 0, 4.0)]);
        assert_eq!(m.nnz(), 2);
        assert_eq!(m.get(0, 2), 3.5);
        assert_eq!(m.get(1, 0), 4.0);
        assert_eq!(m.get(1, 1), 0.0);
    }

    #[test]
    fn zeros_are_not_stored() {
        let m = CsrMatrix::from_triplets(2, 2, [(0, 0, 0.0), (1, 1, 2.0), (1, 1, -2.0)]);
        assert_eq!(m.nnz(), 0);
        assert_eq!(m.offsets, vec![0, 0, 0]);
    }

    #[test]
    fn columns_are_sorted_within_rows() {
        let m = CsrMatrix::from_triplets(1, 4, [(0, 3, 1.0), (0, 0, 2.0), (0, 2, 3.0)]);
        assert_eq!(m.indices, vec![0, 2, 3]);
        assert_eq!(m.values, vec![2.0, 3.0, 1.0]);
    }

    #[test]
    fn sums() {
        let m = CsrMatrix::from_triplets(2, 2, [(0, 0, 1.0), (0, 1, 2.0), (1, 1, 3.0)]);
        assert_eq!(m.sum(), 6.0);
        assert_eq!(m.row_sums(), vec![3.0, 3.0]);
        assert_eq!(m.col_sums(), vec![1.0, 5.0]);
        assert_eq!(m.diagonal(), vec![1.0, 3.0]);
    }

    #[test]
    #[should_panic]
    fn out_of_bounds_triplet_panics() {
        CsrMatrix::from_triplets(1, 1, [(0, 1, 1.0)]);
    }
}
