use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("corrupt usage row: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, Error>;
