use thiserror::Error;

use crate::api::client::IdentityError;
use crate::sink::SinkError;
use crate::storage::StorageError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("could not encode configuration: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("contact not found: {0}")]
    ContactNotFound(String),

    #[error("invalid contact: {0}")]
    InvalidContact(String),

    #[error("invalid time of day {0:?}, expected HH:MM")]
    InvalidTimeOfDay(String),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("spreadsheet import is not available yet")]
    ImportUnavailable,
}
