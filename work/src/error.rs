use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkError {
    #[error("difficulty {difficulty} exceeds the maximum of {max}")]
    DifficultyOutOfRange { difficulty: u32, max: u32 },

    #[error("work generation cancelled")]
    Cancelled,

    #[error("failed to build work thread pool: {0}")]
    ThreadPool(String),
}
