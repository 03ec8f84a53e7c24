//! `assetgraph stats` command implementation.

use anyhow::Result;
use colored::Colorize;

use super::{Session, print_json};

/// Run the stats command.
pub async fn run(session: &Session) -> Result<()> {
    let stats = session.graph.stats().await?;

    if session.json {
        return print_json(&stats);
    }

    println!("{}", "Asset Graph Statistics".cyan().bold());
    println!();

    println!(
        "  {}: {}",
        "Assets".white().bold(),
        stats.store.nodes.to_string().green()
    );
    println!(
        "  {}: {}",
        "References".white().bold(),
        stats.store.edges.to_string().green()
    );
    println!("  {}: {}", "Epoch".white().bold(), stats.store.epoch);
    println!();

    if stats.store.missing > 0 {
        println!(
            "  {}: {} (dangling reference targets)",
            "Missing".red().bold(),
            stats.store.missing
        );
    }
    if stats.store.stale > 0 {
        println!(
            "  {}: {} (catalogue fetch failed, last known edges kept)",
            "Stale".yellow().bold(),
            stats.store.stale
        );
    }

    println!(
        "  {}: {} hits, {} misses, {}/{} entries",
        "Cache".white().bold(),
        stats.cache.hits,
        stats.cache.misses,
        stats.cache.entries,
        stats.cache.capacity
    );

    Ok(())
}
