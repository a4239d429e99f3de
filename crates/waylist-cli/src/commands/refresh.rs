use waylist_core::mirror::ReconcileReport;
use waylist_core::sync::{LoadOutcome, SyncError};
use waylist_core::Session;

use crate::cli::RefreshTarget;
use crate::error::CliError;

pub async fn run_refresh(
    session: &Session,
    target: RefreshTarget,
    force: bool,
) -> Result<(), CliError> {
    let client = session.client();
    let result = match target {
        RefreshTarget::Places { list } => client
            .refresh_places(list, force)
            .await
            .map(|outcome| outcome.map(|report| describe_report(&report))),
        RefreshTarget::Checklists => session
            .refresh_checklists(force)
            .await
            .map(|outcome| outcome.map(|report| describe_report(&report))),
        RefreshTarget::Rankings { list, page } => client
            .refresh_rankings(list, page, force)
            .await
            .map(|outcome| outcome.map(|report| describe_report(&report))),
        RefreshTarget::Photos { location_id } => client
            .refresh_location_photos(location_id, force)
            .await
            .map(|outcome| outcome.map(|report| describe_report(&report))),
        RefreshTarget::Posts { location_id } => client
            .refresh_location_posts(location_id, force)
            .await
            .map(|outcome| outcome.map(|report| describe_report(&report))),
        RefreshTarget::Profile => client
            .refresh_profile(force)
            .await
            .map(|outcome| outcome.map(|profile| format!("signed in as {}", profile.full_name))),
    };

    let label = target_label(target);
    match result {
        Ok(LoadOutcome::Fresh(summary)) => println!("{label}: {summary}"),
        Ok(LoadOutcome::NotModified) => println!("{label}: not modified"),
        Err(SyncError::Throttled) => {
            println!("{label}: fetched recently, skipped (use --force to refetch)");
        }
        Err(error) => return Err(error.into()),
    }
    Ok(())
}

pub fn target_label(target: RefreshTarget) -> String {
    match target {
        RefreshTarget::Places { list } => list.title().to_string(),
        RefreshTarget::Checklists => "Checklists".to_string(),
        RefreshTarget::Rankings { list, page } => format!("{} rankings, page {page}", list.title()),
        RefreshTarget::Photos { location_id } => format!("Photos of location #{location_id}"),
        RefreshTarget::Posts { location_id } => format!("Posts on location #{location_id}"),
        RefreshTarget::Profile => "Profile".to_string(),
    }
}

pub fn describe_report(report: &ReconcileReport) -> String {
    if report.is_empty() {
        return "up to date".to_string();
    }
    let summary = format!(
        "{} added, {} updated, {} removed",
        report.inserted, report.updated, report.deleted
    );
    if report.hidden_parents > 0 {
        format!("{summary}, {} grouped", report.hidden_parents)
    } else {
        summary
    }
}
