// Public API for the join engine

pub mod error;
pub mod execution;
pub mod types;

pub use error::{JoinError, Result};
pub use execution::operators::JoinOperator;
pub use execution::{Executor, JoinStrategy};
pub use types::{combine, CastRow, ResultRow, TitleRow};
