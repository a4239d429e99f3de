use waylist_core::queue::OperationPayload;
use waylist_core::Session;

use crate::commands::common::{flush_after_enqueue, normalize_post_text};
use crate::error::CliError;

pub async fn run_post(
    session: &Session,
    location_id: i64,
    text_parts: &[String],
    offline: bool,
) -> Result<(), CliError> {
    let text = normalize_post_text(text_parts)?;
    let operation = session
        .queue()
        .enqueue(None, OperationPayload::PostPublish { location_id, text })
        .await?;
    println!("{}", operation.title);
    flush_after_enqueue(session, offline).await
}
