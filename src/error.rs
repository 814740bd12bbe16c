// Join engine errors

use arrow::datatypes::DataType;
use arrow::error::ArrowError;
use thiserror::Error;

/// Errors raised while configuring an engine or adapting relations.
///
/// Join algorithms themselves cannot fail on valid input; everything here is either a bad
/// configuration, a resource limit, or a malformed Arrow batch.
#[derive(Error, Debug)]
pub enum JoinError {
    #[error("Parallelism must be at least 1, got {0}")]
    InvalidParallelism(usize),

    #[error("Failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Radix width must be within 1..={max} bits, got {bits}")]
    InvalidRadixBits { bits: u32, max: u32 },

    #[error("Cache budget must be at least one row, got {0} bytes")]
    InvalidCacheBudget(usize),

    #[error("Output offset overflow while summing {0} match counts")]
    OffsetOverflow(usize),

    #[error("Trie would need {0} nodes, exceeding the arena capacity")]
    TrieCapacity(usize),

    #[error("Column '{0}' not found")]
    MissingColumn(String),

    #[error("Column '{column}' has type {actual:?}, expected {expected:?}")]
    ColumnType {
        column: String,
        expected: DataType,
        actual: DataType,
    },

    #[error("Column '{column}' has a null at row {row}")]
    NullValue { column: String, row: usize },

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),
}

pub type Result<T> = std::result::Result<T, JoinError>;
