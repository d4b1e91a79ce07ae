//! `patchfleet status` — live state of recorded pull requests.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use patchfleet_core::config::{load_config, DEFAULT_CONFIG_FILE};
use patchfleet_core::types::DEFAULT_API_URL;
use patchfleet_core::{PrState, PrStatusOutcome, PrStatusResult};
use patchfleet_engine::{
    collect_status, EngineError, GithubForge, HistoryStore, DEFAULT_HISTORY_FILE,
};

/// Arguments for `patchfleet status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Only show pull requests opened by this patch.
    pub patch: Option<String>,

    /// PR history written by `patchfleet apply`.
    #[arg(long, default_value = DEFAULT_HISTORY_FILE)]
    pub history: PathBuf,

    /// Run configuration; only its `api-url` is used, when the file exists.
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,

    /// Forge token used for API calls.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

impl StatusArgs {
    pub async fn run(self) -> Result<ExitCode> {
        let store = HistoryStore::load(&self.history)?;
        let Some(token) = self.token.filter(|t| !t.trim().is_empty()) else {
            return Err(EngineError::MissingToken.into());
        };
        let api_url = if self.config.exists() {
            load_config(&self.config)
                .context("failed to load run configuration")?
                .api_url
        } else {
            DEFAULT_API_URL.to_string()
        };

        let forge = GithubForge::new(&api_url, &token);
        let report = collect_status(&forge, &store, self.patch.as_deref()).await;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize status JSON")?
            );
        } else {
            print_table(report, Utc::now());
        }
        Ok(ExitCode::SUCCESS)
    }
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "repository")]
    repo: String,
    #[tabled(rename = "PR")]
    pr: String,
    #[tabled(rename = "state")]
    state: String,
    #[tabled(rename = "reviews")]
    reviews: String,
    #[tabled(rename = "updated")]
    updated: String,
    #[tabled(rename = "mergeable")]
    mergeable: String,
}

fn print_table(report: Vec<PrStatusResult>, now: DateTime<Utc>) {
    if report.is_empty() {
        println!("No pull requests recorded.");
        return;
    }

    let failed = report
        .iter()
        .filter(|r| matches!(r.outcome, PrStatusOutcome::Failed { .. }))
        .count();
    println!(
        "patchfleet v{} | {} pull requests | {} unavailable",
        env!("CARGO_PKG_VERSION"),
        report.len(),
        failed,
    );

    let separator = "■".repeat(67).bright_black().to_string();
    println!("{separator}");
    println!(
        "Indicators: {} OPEN  {} MERGED  {} CLOSED  {} ERROR",
        state_indicator(Some(PrState::Open)),
        state_indicator(Some(PrState::Merged)),
        state_indicator(Some(PrState::Closed)),
        state_indicator(None),
    );
    println!("{separator}");

    for (patch, rows) in group_by_patch(report) {
        println!("{}", patch.bold());
        let table_rows: Vec<StatusTableRow> = rows.into_iter().map(|r| table_row(r, now)).collect();
        let mut table = Table::new(table_rows);
        table.with(Style::rounded());
        println!("{table}");
        println!("{separator}");
    }
}

/// Groups ordered by each patch's first appearance in the history, rows in
/// history order within a group.
fn group_by_patch(report: Vec<PrStatusResult>) -> Vec<(String, Vec<PrStatusResult>)> {
    let mut groups: Vec<(String, Vec<PrStatusResult>)> = Vec::new();
    for row in report {
        match groups.iter_mut().find(|(patch, _)| *patch == row.record.patch) {
            Some((_, rows)) => rows.push(row),
            None => groups.push((row.record.patch.clone(), vec![row])),
        }
    }
    groups
}

fn table_row(result: PrStatusResult, now: DateTime<Utc>) -> StatusTableRow {
    let repo = result.record.repo.to_string();
    let pr = format!("#{}", result.record.pr_number);
    match result.outcome {
        PrStatusOutcome::Live(live) => StatusTableRow {
            repo,
            pr,
            state: format!("{} {}", state_indicator(Some(live.state)), live.state),
            reviews: live.reviews.to_string(),
            updated: format_age(live.updated_at, now),
            mergeable: match live.mergeable {
                Some(true) => "yes".to_string(),
                Some(false) => "no".to_string(),
                None => "-".to_string(),
            },
        },
        PrStatusOutcome::Failed { error } => StatusTableRow {
            repo,
            pr,
            state: format!("{} ERROR", state_indicator(None)),
            reviews: "-".to_string(),
            updated: error,
            mergeable: "-".to_string(),
        },
    }
}

fn state_indicator(state: Option<PrState>) -> String {
    match state {
        Some(PrState::Open) => "■".green().bold().to_string(),
        Some(PrState::Merged) => "■".magenta().bold().to_string(),
        Some(PrState::Closed) => "■".bright_black().bold().to_string(),
        None => "■".red().bold().to_string(),
    }
}

fn format_age(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - at).num_seconds().max(0);
    match seconds {
        0..=59 => "just now".to_string(),
        60..=3_599 => format!("{}m ago", seconds / 60),
        3_600..=86_399 => format!("{}h ago", seconds / 3_600),
        _ => format!("{}d ago", seconds / 86_400),
    }
}
