//! How many chunks a dataset is delivered in.

/// Fewest chunks any dataset is split into.
pub const MIN_CHUNKS: usize = 20;

/// Rows per chunk once a dataset outgrows [`MIN_CHUNKS`].
pub const ROWS_PER_CHUNK: usize = 50_000;

/// Number of chunks to split a dataset of `row_count` rows into.
///
/// Never fewer than [`MIN_CHUNKS`]; above a million rows the count grows by one
/// per [`ROWS_PER_CHUNK`] rows.
///
/// ```
/// use predictables::planner::plan_chunk_count;
///
/// assert_eq!(plan_chunk_count(0), 20);
/// assert_eq!(plan_chunk_count(150), 20);
/// assert_eq!(plan_chunk_count(2_000_000), 41);
/// ```
pub fn plan_chunk_count(row_count: usize) -> usize {
    (row_count / ROWS_PER_CHUNK + 1).max(MIN_CHUNKS)
}
