use proptest::prelude::*;

/// Number of elements selected by a split
pub fn element_count_strategy() -> impl Strategy<Value = usize> {
    0usize..64
}

/// Positive batch sizes
pub fn batch_size_strategy() -> impl Strategy<Value = usize> {
    1usize..16
}

/// Configured batch sizes, including zero and negative values
pub fn configured_batch_size_strategy() -> impl Strategy<Value = i64> {
    -32i64..32
}

/// Element names accepted by the element path parser
pub fn element_name_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z_][a-zA-Z0-9_-]{0,15}"
}
