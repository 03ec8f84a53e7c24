//! `assetgraph cycle` and `assetgraph cycles` command implementation.

use anyhow::Result;
use colored::Colorize;

use assetgraph::domain::ReferenceKind;
use assetgraph::query::CycleLookup;

use super::{Session, kinds_or_default, parse_asset, print_json};

/// Run the cycle command for one asset.
pub async fn run_one(session: &Session, asset: &str, kinds: &[ReferenceKind]) -> Result<()> {
    let root = parse_asset(asset)?;
    let lookup = session.graph.find_cycle(&root, kinds_or_default(kinds)).await;

    if session.json {
        return print_json(&lookup);
    }

    match lookup {
        CycleLookup::Found(witness) => {
            println!(
                "{} reachable from {} ({} assets):",
                "Cycle".red().bold(),
                root.to_string().cyan(),
                witness.len()
            );
            for edge in witness.edges() {
                println!(
                    "    {} {} {}",
                    edge.source,
                    format!("-[{}]->", edge.kind).dimmed(),
                    edge.target
                );
            }
        }
        CycleLookup::Acyclic => {
            println!("{}", format!("No cycle reachable from {root}.").green());
        }
        CycleLookup::UnknownAsset(id) => {
            println!("{}: {} is not in the graph", "unknown asset".red().bold(), id.to_string().cyan());
        }
        CycleLookup::Incomplete => {
            println!("{}", "Visit budget exhausted before the search finished.".yellow());
        }
    }
    Ok(())
}

/// Run the cycles command over the whole graph.
pub async fn run_all(session: &Session, kinds: &[ReferenceKind]) -> Result<()> {
    let scan = session.graph.all_cycles(kinds_or_default(kinds)).await;

    if session.json {
        return print_json(&scan);
    }

    let Some(groups) = scan.groups() else {
        println!(
            "{}",
            "Graph is larger than the visit budget; cycle scan skipped.".yellow()
        );
        return Ok(());
    };

    if groups.is_empty() {
        println!("{}", "No circular references detected.".green());
        return Ok(());
    }

    println!(
        "Found {} circular reference groups:",
        groups.len().to_string().red().bold()
    );
    println!();

    for (i, group) in groups.iter().enumerate() {
        println!(
            "  {} {} ({} assets):",
            "Group".yellow().bold(),
            i + 1,
            group.assets.len()
        );
        for asset in &group.assets {
            println!("    {} {}", "•".dimmed(), asset.to_string().dimmed());
        }
    }

    Ok(())
}
