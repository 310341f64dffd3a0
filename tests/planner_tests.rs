use predictables::planner::{MIN_CHUNKS, ROWS_PER_CHUNK, plan_chunk_count};

#[test]
fn small_datasets_get_the_minimum() {
    for rows in [0, 1, 19, 20, 150, 50_000, 999_999] {
        assert_eq!(plan_chunk_count(rows), MIN_CHUNKS, "rows = {rows}");
    }
}

#[test]
fn large_datasets_grow_one_chunk_per_block() {
    assert_eq!(plan_chunk_count(1_000_000), 21);
    assert_eq!(plan_chunk_count(1_049_999), 21);
    assert_eq!(plan_chunk_count(1_050_000), 22);
    assert_eq!(plan_chunk_count(2_000_000), 41);

    for rows in (1_000_000..5_000_000).step_by(123_457) {
        assert_eq!(plan_chunk_count(rows), rows / ROWS_PER_CHUNK + 1);
    }
}

#[test]
fn never_below_minimum() {
    for rows in (0..3_000_000).step_by(77_777) {
        assert!(plan_chunk_count(rows) >= MIN_CHUNKS);
    }
}
