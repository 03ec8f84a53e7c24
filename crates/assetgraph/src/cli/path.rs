//! `assetgraph path` command implementation.

use anyhow::Result;
use colored::Colorize;

use assetgraph::domain::ReferenceKind;
use assetgraph::query::PathLookup;

use super::{Session, kinds_or_default, parse_asset, print_json};

/// Run the path command.
pub async fn run(session: &Session, from: &str, to: &str, kinds: &[ReferenceKind]) -> Result<()> {
    let from = parse_asset(from)?;
    let to = parse_asset(to)?;
    let lookup = session
        .graph
        .shortest_path(&from, &to, kinds_or_default(kinds))
        .await;

    if session.json {
        return print_json(&lookup);
    }

    match lookup {
        PathLookup::Found(path) => {
            println!(
                "{} ({} hops):",
                "Shortest path".white().bold(),
                path.hops()
            );
            println!("    {}", path.assets()[0].to_string().cyan());
            for edge in path.edges() {
                println!(
                    "    {} {}",
                    format!("-[{}]->", edge.kind).dimmed(),
                    edge.target.to_string().cyan()
                );
            }
        }
        PathLookup::NoPath => {
            println!("No path from {from} to {to}.");
        }
        PathLookup::UnknownAsset(id) => {
            println!("{}: {} is not in the graph", "unknown asset".red().bold(), id.to_string().cyan());
        }
        PathLookup::Incomplete => {
            println!("{}", "Visit budget exhausted before a path was found.".yellow());
        }
    }
    Ok(())
}
