mod error;
mod executor;
mod resolver;

pub use error::WorkflowError;
pub use executor::{EnsureOutcome, TransitionExecutor};
