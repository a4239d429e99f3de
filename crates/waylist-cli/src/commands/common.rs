use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;
use waylist_core::config::ClientConfig;
use waylist_core::models::Place;
use waylist_core::notify::{Notifier, ReportEvent, TracingNotifier};
use waylist_core::queue::{OutboundOperation, ProcessOutcome};
use waylist_core::Session;

use crate::error::CliError;

pub const DATA_DIR_ENV: &str = "WAYLIST_DATA_DIR";
const CONFIG_FILE_NAME: &str = "config.json";

/// Prints queue warnings to stderr and forwards reports to tracing.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn warn_once(&self, message: &str) {
        eprintln!("warning: {message}");
    }

    fn report_event(&self, event: ReportEvent) {
        TracingNotifier.report_event(event);
    }
}

#[derive(Debug, Serialize)]
pub struct PlaceListItem {
    pub id: i64,
    pub title: String,
    pub subtitle: String,
    pub region: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub visitors: i64,
    pub visited: bool,
}

pub fn resolve_data_dir(cli_data_dir: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_data_dir.or_else(|| env::var_os(DATA_DIR_ENV).map(PathBuf::from)) {
        return Ok(path);
    }
    dirs::data_dir()
        .map(|dir| dir.join("waylist"))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

pub fn resolve_config_path(cli_config: Option<PathBuf>) -> Option<PathBuf> {
    cli_config.or_else(|| dirs::config_dir().map(|dir| dir.join("waylist").join(CONFIG_FILE_NAME)))
}

pub fn load_config(path: Option<&Path>) -> Result<ClientConfig, CliError> {
    let config = match path {
        Some(path) => ClientConfig::load_from_path(path)?,
        None => ClientConfig::default(),
    };
    Ok(config.apply_env_overrides().validate()?)
}

pub async fn open_session(
    cli_data_dir: Option<PathBuf>,
    config_path: Option<&Path>,
) -> Result<Session, CliError> {
    let data_dir = resolve_data_dir(cli_data_dir)?;
    let config = load_config(config_path)?;
    Ok(Session::open(data_dir, &config, Arc::new(ConsoleNotifier)).await?)
}

pub fn place_to_list_item(place: &Place, visited: &HashSet<i64>) -> PlaceListItem {
    PlaceListItem {
        id: place.id,
        title: place.title.clone(),
        subtitle: place.subtitle.clone(),
        region: place.region.clone(),
        latitude: place.latitude,
        longitude: place.longitude,
        visitors: place.visitors,
        visited: visited.contains(&place.id),
    }
}

pub fn format_place_lines(places: &[Place], visited: &HashSet<i64>) -> Vec<String> {
    places
        .iter()
        .map(|place| {
            let mark = if visited.contains(&place.id) { "[x]" } else { "[ ]" };
            let title = truncate_chars(&place.title, 40);
            match place.region.as_deref() {
                Some(region) => format!("{mark} {:>6}  {title:<40}  {region}", place.id),
                None => format!("{mark} {:>6}  {title}", place.id),
            }
        })
        .collect()
}

pub fn format_queue_lines(operations: &[OutboundOperation], now: DateTime<Utc>) -> Vec<String> {
    operations
        .iter()
        .map(|operation| {
            let id = operation.id.to_string();
            let short_id = id.chars().take(13).collect::<String>();
            let title = truncate_chars(&operation.title, 40);
            let queued = format_relative_time(operation.created_at, now);
            if operation.failure_count == 0 {
                format!("{short_id:<13}  {title:<40}  {queued:<10}  {}", operation.subtitle)
            } else {
                format!(
                    "{short_id:<13}  {title:<40}  {queued:<10}  {} ({} failed attempts)",
                    operation.subtitle, operation.failure_count
                )
            }
        })
        .collect()
}

/// Describe flush results using the titles captured before the flush.
pub fn format_outcome_lines(
    outcomes: &[ProcessOutcome],
    before: &[OutboundOperation],
) -> Vec<String> {
    let title_of = |id: &Uuid| {
        before
            .iter()
            .find(|operation| &operation.id == id)
            .map_or_else(|| id.to_string(), |operation| operation.title.clone())
    };

    outcomes
        .iter()
        .filter_map(|outcome| match outcome {
            ProcessOutcome::Idle => None,
            ProcessOutcome::Sent { id } => Some(format!("Sent: {}", title_of(id))),
            ProcessOutcome::Dropped { id, reason } => {
                Some(format!("Dropped: {} ({reason})", title_of(id)))
            }
            ProcessOutcome::Retrying { id, failure_count } => Some(format!(
                "Will retry: {} (failed {failure_count} times)",
                title_of(id)
            )),
            ProcessOutcome::Deferred { until } => {
                Some(format!("Waiting until {}", until.format("%Y-%m-%d %H:%M:%S UTC")))
            }
        })
        .collect()
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_relative_time(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = (now - timestamp).num_seconds().max(0);
    let minute = 60;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn normalize_search_query(query: &str) -> Result<String, CliError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptySearchQuery)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn normalize_post_text(parts: &[String]) -> Result<String, CliError> {
    let joined = parts.join(" ");
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyPostText)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn parse_profile_field(raw: &str) -> Result<(String, String), CliError> {
    let Some((name, value)) = raw.split_once('=') else {
        return Err(CliError::InvalidProfileField(raw.to_string()));
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(CliError::InvalidProfileField(raw.to_string()));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

pub fn guess_mime_type(path: &Path) -> Result<&'static str, CliError> {
    let extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("jpg" | "jpeg") => Ok("image/jpeg"),
        Some("png") => Ok("image/png"),
        Some("heic") => Ok("image/heic"),
        Some("webp") => Ok("image/webp"),
        _ => Err(CliError::UnknownPhotoType(path.display().to_string())),
    }
}

/// Send what can be sent now unless running offline.
pub async fn flush_after_enqueue(session: &Session, offline: bool) -> Result<(), CliError> {
    if offline {
        println!("Queued; run `waylist flush` to send.");
        return Ok(());
    }

    let before = session.queue().snapshot().await;
    let outcomes = session.queue().run_until_blocked().await?;
    for line in format_outcome_lines(&outcomes, &before) {
        println!("{line}");
    }
    Ok(())
}
