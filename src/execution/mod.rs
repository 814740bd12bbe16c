pub mod batch;
pub mod executor;
pub mod operators;
pub mod output;
pub mod scheduler;

pub use executor::{Executor, JoinStrategy};
pub use scheduler::{Schedule, WorkerPool};
