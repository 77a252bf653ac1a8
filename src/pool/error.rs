use thiserror::Error;

/// Why a task's completion handle was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// The engine failed to load inside one execution unit
    #[error("execution unit {slot} failed to initialize: {message}")]
    Initialization { slot: usize, message: String },

    /// The engine failed on this task's input
    #[error("{0}")]
    Task(String),

    /// The unit running the task died outside the message protocol
    #[error("execution unit {slot} stopped unexpectedly")]
    Transport { slot: usize },

    /// The pool is in a failed state and no longer runs work
    #[error("worker pool unavailable: {0}")]
    Unavailable(String),

    #[error("worker pool shut down")]
    ShutDown,
}
