use std::path::Path;

use waylist_core::Session;

use crate::commands::common::{flush_after_enqueue, guess_mime_type};
use crate::error::CliError;

pub async fn run_photo(
    session: &Session,
    location_id: i64,
    path: &Path,
    caption: &str,
    mime_type: Option<&str>,
    offline: bool,
) -> Result<(), CliError> {
    let mime_type = match mime_type {
        Some(mime_type) => mime_type.to_string(),
        None => guess_mime_type(path)?.to_string(),
    };
    let bytes = tokio::fs::read(path).await?;

    let operation = session
        .queue()
        .enqueue_photo(None, location_id, caption, &mime_type, &bytes)
        .await?;
    println!("{}", operation.title);
    flush_after_enqueue(session, offline).await
}
