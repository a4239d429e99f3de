use std::path::Path;

use waylist_core::config::ClientConfig;
use waylist_core::Session;

use crate::commands::common::flush_after_enqueue;
use crate::error::CliError;

pub async fn run_login(
    session: &Session,
    config_path: Option<&Path>,
    token: &str,
    offline: bool,
) -> Result<(), CliError> {
    session.sign_in(token).await?;
    match config_path {
        Some(path) => {
            store_token(path, Some(token.trim()))?;
            println!("Signed in. Token saved to {}.", path.display());
        }
        None => println!("Signed in for this run only; no config file location is known."),
    }

    if !session.queue().is_empty().await {
        flush_after_enqueue(session, offline).await?;
    }
    Ok(())
}

/// Rewrite `auth_token` in the config file, keeping every other field.
pub fn store_token(path: &Path, token: Option<&str>) -> Result<(), CliError> {
    let mut config = ClientConfig::load_from_path(path)?;
    if config.auth_token.as_deref() == token {
        return Ok(());
    }
    config.auth_token = token.map(str::to_string);
    config.save_to_path(path)?;
    Ok(())
}
