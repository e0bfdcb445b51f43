use babbler_dict::DictionaryFull;
use babbler_model::BrainError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Brain error: {0}")]
    Brain(#[from] BrainError),

    #[error("Capacity error: {0}")]
    Capacity(#[from] DictionaryFull),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
