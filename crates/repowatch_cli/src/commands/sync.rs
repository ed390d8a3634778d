use chrono::{DateTime, Utc};
use console::style;
use repowatch::platform::RepoRef;
use repowatch::sync::{SyncReport, SyncService};

/// One-shot sync. Without `--since` or `--full`, resumes from the stored
/// watermark.
pub(crate) async fn handle_sync(
    service: &SyncService,
    repo: &RepoRef,
    since: Option<DateTime<Utc>>,
    full: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let report = match (since, full) {
        (None, false) => service.sync_from_watermark(repo).await?,
        (since, _) => service.sync_repository(&repo.owner, &repo.name, since).await?,
    };
    print_report(&report);
    Ok(())
}

/// Clear stored commits, move the watermark to `since`, then re-collect.
pub(crate) async fn handle_reset(
    service: &SyncService,
    repo: &RepoRef,
    since: DateTime<Utc>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (outcome, report) = service.reset_and_resync(repo, since).await?;
    println!(
        "{} Removed {} commit(s) from {}",
        style("✓").green(),
        outcome.deleted_commits,
        repo
    );
    print_report(&report);
    Ok(())
}

fn print_report(report: &SyncReport) {
    let label = if report.first_sync { " (first sync)" } else { "" };
    println!(
        "{} Synced {}{}: {} fetched, {} new",
        style("✓").green(),
        style(&report.full_name).bold(),
        label,
        report.fetched,
        report.inserted,
    );
    println!("  Watermark: {}", report.watermark.to_rfc3339());
}
