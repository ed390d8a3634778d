use clap::ValueEnum;
use repowatch::platform::RepoRef;
use repowatch::store::{AuthorCommitCount, CommitFilter, Pagination};
use repowatch::sync::SyncService;
use serde::Serialize;
use tabled::Tabled;

/// Output format for query results.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Display as a formatted table (default)
    #[default]
    Table,
    /// Display as JSON
    Json,
}

#[derive(Debug, Serialize, Tabled)]
struct CommitRow {
    #[tabled(rename = "SHA")]
    sha: String,
    #[tabled(rename = "Author")]
    author: String,
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Message")]
    message: String,
}

#[derive(Debug, Serialize, Tabled)]
struct AuthorRow {
    #[tabled(rename = "#")]
    rank: usize,
    #[tabled(rename = "Author")]
    author: String,
    #[tabled(rename = "Commits")]
    commits: i64,
}

const SHORT_SHA: usize = 10;
const MAX_SUBJECT: usize = 72;

/// First line of a commit message, cut to fit a table cell.
fn subject(message: &str) -> String {
    let line = message.lines().next().unwrap_or_default();
    if line.chars().count() <= MAX_SUBJECT {
        return line.to_string();
    }
    let cut: String = line.chars().take(MAX_SUBJECT - 1).collect();
    format!("{cut}…")
}

fn print_rows<T: Serialize + Tabled>(rows: Vec<T>, format: OutputFormat) -> serde_json::Result<()> {
    match format {
        OutputFormat::Table => {
            let mut table = tabled::Table::new(rows);
            table.with(tabled::settings::Style::rounded());
            println!("{table}");
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
    }
    Ok(())
}

pub(crate) async fn handle_commits(
    service: &SyncService,
    repo: &RepoRef,
    filter: CommitFilter,
    limit: u64,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let page = service
        .paginate_commits(repo, filter, Pagination::new(0, limit))
        .await?;

    let rows: Vec<_> = page
        .items
        .into_iter()
        .map(|c| CommitRow {
            sha: c.sha.chars().take(SHORT_SHA).collect(),
            author: c.author_name,
            date: c.author_date.to_rfc3339(),
            message: subject(&c.message),
        })
        .collect();

    let shown = rows.len();
    print_rows(rows, format)?;
    if matches!(format, OutputFormat::Table) {
        println!("Showing {shown} of {} commit(s)", page.total);
    }
    Ok(())
}

pub(crate) async fn handle_authors(
    service: &SyncService,
    repo: &RepoRef,
    limit: u64,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let authors = service.top_authors(repo, limit).await?;
    print_rows(author_rows(authors), format)?;
    Ok(())
}

fn author_rows(authors: Vec<AuthorCommitCount>) -> Vec<AuthorRow> {
    authors
        .into_iter()
        .enumerate()
        .map(|(i, a)| AuthorRow {
            rank: i + 1,
            author: a.author_name,
            commits: a.commit_count,
        })
        .collect()
}
