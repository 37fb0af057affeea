use faer::Mat;

/// Column-wise concatenation of a ragged matrix collection.
///
/// All blocks must share a row count; an empty collection yields a `0 x 0`
/// matrix.
#[must_use]
pub fn cbind_columns(blocks: &[Mat<f64>]) -> Mat<f64> {
    let Some(first) = blocks.first() else {
        return Mat::<f64>::zeros(0, 0);
    };
    let rows = first.nrows();
    let total_cols = blocks.iter().map(Mat::ncols).sum();

    let mut combined = Mat::<f64>::zeros(rows, total_cols);
    let mut offset = 0;
    for block in blocks {
        debug_assert_eq!(block.nrows(), rows);
        for col in 0..block.ncols() {
            for row in 0..rows {
                combined[(row, offset + col)] = block[(row, col)];
            }
        }
        offset += block.ncols();
    }
    combined
}

/// Copy of `matrix` keeping rows `first_row..nrows`.
#[must_use]
pub fn trim_rows(matrix: &Mat<f64>, first_row: usize) -> Mat<f64> {
    debug_assert!(first_row <= matrix.nrows());
    Mat::from_fn(matrix.nrows() - first_row, matrix.ncols(), |row, col| {
        matrix[(row + first_row, col)]
    })
}
