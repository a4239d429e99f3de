use std::io;

use thiserror::Error;
use waylist_core::sync::SyncError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] waylist_core::Error),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Search query cannot be empty")]
    EmptySearchQuery,
    #[error("Post text cannot be empty")]
    EmptyPostText,
    #[error("Invalid profile field '{0}', expected NAME=VALUE")]
    InvalidProfileField(String),
    #[error("Cannot tell the image type of {0}; pass --mime-type")]
    UnknownPhotoType(String),
    #[error("Place {1} not found in {0}. Run `waylist refresh places {0}` first.")]
    PlaceNotFound(String, i64),
    #[error("Configuration error: {0}")]
    Config(String),
}
