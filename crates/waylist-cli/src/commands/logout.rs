use std::path::Path;

use waylist_core::Session;

use crate::commands::login::store_token;
use crate::error::CliError;

pub async fn run_logout(session: &Session, config_path: Option<&Path>) -> Result<(), CliError> {
    session.logout().await?;
    if let Some(path) = config_path {
        store_token(path, None)?;
    }

    let pending = session.queue().len().await;
    if pending == 0 {
        println!("Logged out.");
    } else {
        println!("Logged out. {pending} queued operation(s) stay on disk.");
    }
    Ok(())
}
