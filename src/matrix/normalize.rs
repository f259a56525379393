use csrmat::CsrMatrix;

/// `1 / x` for every non-zero `x`; zeros stay zero.
pub fn reciprocal(values: &[f64]) -> Vec<f64> {
    values.iter()
        .map(|&x| if x != 0.0 { 1.0 / x } else { 0.0 })
        .collect()
}

/// Diagonal `N` with `N_ii = 1 / Σ_j A_ij`, so every non-empty row of
/// `N · A` sums to one.
pub fn row_normalization(matrix: &CsrMatrix) -> CsrMatrix {
    let diagonal = reciprocal(&matrix.row_sums());
    tracing::debug!(
        rows = diagonal.len(),
        empty = diagonal.iter().filter(|&&x| x == 0.0).count(),
        "row normalization"
    );
    CsrMatrix::from_diagonal(&diagonal)
}

/// Normalization of the loaded transport: `N · G · L` is row-stochastic.
pub fn loading_normalization(geo_transform: &CsrMatrix, loading: &CsrMatrix) -> CsrMatrix {
    row_normalization(&geo_transform.matmul(loading))
}
