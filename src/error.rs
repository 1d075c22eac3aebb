use reqwest::StatusCode;
use thiserror::Error;

/// Erros das operações de comando e do store.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("URL {0} not found")]
    NotFound(String),
    #[error("URL {0} is not in a state that allows this operation")]
    Conflict(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

pub type Result<T> = std::result::Result<T, MonitorError>;

impl From<tokio_postgres::Error> for MonitorError {
    fn from(err: tokio_postgres::Error) -> Self {
        MonitorError::StoreUnavailable(err.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for MonitorError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        MonitorError::StoreUnavailable(err.to_string())
    }
}

/// Falha de um ping individual. Nunca sai do executor.
#[derive(Error, Debug)]
pub enum PingFailure {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(StatusCode),
}
