mod cli;
mod commands;
mod error;


use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::checkin::run_set_visited;
use crate::commands::common::{open_session, resolve_config_path};
use crate::commands::completions::run_completions;
use crate::commands::list::run_list;
use crate::commands::login::run_login;
use crate::commands::logout::run_logout;
use crate::commands::photo::run_photo;
use crate::commands::post::run_post;
use crate::commands::profile::run_profile_update;
use crate::commands::queue::{run_flush, run_queue};
use crate::commands::refresh::run_refresh;
use crate::commands::search::run_search;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("waylist=info".parse().unwrap()),
        )
        .init();

    let Cli {
        command,
        data_dir,
        config,
        offline,
    } = Cli::parse();

    if let Commands::Completions { shell, output } = &command {
        return run_completions(*shell, output.as_deref());
    }

    let config_path = resolve_config_path(config);
    let session = open_session(data_dir, config_path.as_deref()).await?;
    match command {
        Commands::Refresh { target, force } => run_refresh(&session, target, force).await,
        Commands::List {
            list,
            limit,
            visited,
            json,
        } => run_list(&session, list, limit, visited, json),
        Commands::Search {
            list,
            query,
            limit,
            json,
        } => run_search(&session, list, &query, limit, json),
        Commands::Checkin { list, item_id } => {
            run_set_visited(&session, list, item_id, true, offline).await
        }
        Commands::Checkout { list, item_id } => {
            run_set_visited(&session, list, item_id, false, offline).await
        }
        Commands::Photo {
            location_id,
            path,
            caption,
            mime_type,
        } => {
            run_photo(
                &session,
                location_id,
                &path,
                &caption,
                mime_type.as_deref(),
                offline,
            )
            .await
        }
        Commands::Post { location_id, text } => run_post(&session, location_id, &text, offline).await,
        Commands::Profile { fields } => run_profile_update(&session, &fields, offline).await,
        Commands::Queue { json } => run_queue(&session, json).await,
        Commands::Flush => run_flush(&session).await,
        Commands::Login { token } => {
            run_login(&session, config_path.as_deref(), &token, offline).await
        }
        Commands::Logout => run_logout(&session, config_path.as_deref()).await,
        Commands::Completions { .. } => Ok(()),
    }
}
