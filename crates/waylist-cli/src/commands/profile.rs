use std::collections::BTreeMap;

use waylist_core::queue::OperationPayload;
use waylist_core::Session;

use crate::commands::common::{flush_after_enqueue, parse_profile_field};
use crate::error::CliError;

pub async fn run_profile_update(
    session: &Session,
    raw_fields: &[String],
    offline: bool,
) -> Result<(), CliError> {
    let fields = raw_fields
        .iter()
        .map(|raw| parse_profile_field(raw))
        .collect::<Result<BTreeMap<_, _>, _>>()?;

    let operation = session
        .queue()
        .enqueue(None, OperationPayload::ProfileUpdate { fields })
        .await?;
    println!("{}", operation.title);
    flush_after_enqueue(session, offline).await
}
