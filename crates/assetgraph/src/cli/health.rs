//! `assetgraph health` command implementation.

use anyhow::Result;
use colored::{ColoredString, Colorize};

use assetgraph::domain::ReferenceKind;
use assetgraph::query::HealthStatus;

use super::display::print_bullets;
use super::{Session, kinds_or_default, parse_asset, print_json};

const MAX_LISTED: usize = 20;

fn colored_status(status: HealthStatus) -> ColoredString {
    let text = status.to_string();
    match status {
        HealthStatus::Valid => text.green(),
        HealthStatus::ValidWithSoftReferenceIssue => text.yellow(),
        HealthStatus::Invalid | HealthStatus::Missing => text.red().bold(),
        HealthStatus::Unknown => text.dimmed(),
    }
}

/// Run the health command.
pub async fn run(session: &Session, asset: &str, kinds: &[ReferenceKind]) -> Result<()> {
    let root = parse_asset(asset)?;
    let health = session
        .graph
        .assess_health(&root, kinds_or_default(kinds))
        .await?;

    if session.json {
        return print_json(&health);
    }

    println!(
        "{}: {}",
        root.to_string().cyan(),
        colored_status(health.status)
    );

    let to_strings = |ids: &[assetgraph::domain::AssetId]| -> Vec<String> {
        ids.iter().map(ToString::to_string).collect()
    };

    if !health.missing_hard.is_empty() {
        println!("  {}:", "Missing through hard references".red());
        print_bullets(&to_strings(&health.missing_hard), MAX_LISTED, "");
    }
    if !health.missing_other.is_empty() {
        println!("  {}:", "Missing through soft references".yellow());
        print_bullets(&to_strings(&health.missing_other), MAX_LISTED, "");
    }
    if !health.stale.is_empty() {
        println!("  {}:", "Stale (catalogue fetch failed)".yellow());
        print_bullets(&to_strings(&health.stale), MAX_LISTED, "");
    }
    if health.truncated {
        println!("  {}", "Visit budget exhausted; report may be incomplete.".yellow());
    }
    Ok(())
}
