//! `assetgraph deps` and `assetgraph refs` command implementation.

use std::collections::BTreeMap;

use anyhow::Result;
use colored::Colorize;

use assetgraph::domain::{AssetId, ReferenceKind};
use assetgraph::query::{QueryResult, TraversalRule};
use assetgraph::store::Direction;

use super::display::{asset_label, print_bullets};
use super::{Session, kinds_or_default, parse_asset, print_json};

/// Maximum assets to display per depth level.
const MAX_PER_DEPTH: usize = 25;

/// Traversal options from the command line.
#[derive(Debug, Clone, Default)]
pub struct Filters {
    pub depth: Option<i64>,
    pub kinds: Vec<ReferenceKind>,
    pub allow_types: Vec<String>,
    pub deny_types: Vec<String>,
    pub breadth: Option<usize>,
    pub no_native: bool,
    pub packages: Vec<String>,
}

/// Build the traversal rule, falling back to configured defaults.
pub fn build_rule(
    session: &Session,
    direction: Direction,
    filters: &Filters,
) -> assetgraph::Result<TraversalRule> {
    let config = session.graph.config();
    let mut rule = TraversalRule::dependencies()
        .direction(direction)
        .kinds(kinds_or_default(&filters.kinds))
        .exclude_native(filters.no_native || config.exclude_native_packages);

    rule = match (filters.depth, config.default_max_depth) {
        (Some(depth), _) => rule.signed_depth(depth)?,
        (None, Some(depth)) => rule.max_depth(depth),
        (None, None) => rule,
    };
    if !filters.allow_types.is_empty() {
        rule = rule.allow_types(filters.allow_types.iter().cloned());
    }
    if !filters.deny_types.is_empty() {
        rule = rule.deny_types(filters.deny_types.iter().cloned());
    }
    if let Some(breadth) = filters.breadth {
        rule = rule.max_breadth(breadth);
    }
    if !filters.packages.is_empty() {
        rule = rule.only_packages(filters.packages.iter().cloned());
    }
    Ok(rule)
}

/// Run the deps/refs command.
pub async fn run(
    session: &Session,
    asset: &str,
    direction: Direction,
    filters: &Filters,
) -> Result<()> {
    let root = parse_asset(asset)?;
    let rule = build_rule(session, direction, filters)?;
    let result = session.graph.query(std::slice::from_ref(&root), &rule).await?;

    if session.json {
        return print_json(&*result);
    }

    print_result(session, &root, direction, &result).await;
    Ok(())
}

async fn print_result(session: &Session, root: &AssetId, direction: Direction, result: &QueryResult) {
    if !result.unknown_roots.is_empty() {
        println!("{}: {} is not in the graph", "unknown asset".red().bold(), root.to_string().cyan());
        return;
    }

    let title = match direction {
        Direction::Dependencies => "Dependencies",
        Direction::Dependents => "Dependents",
    };
    println!(
        "{} of {} ({} assets):",
        title.white().bold(),
        root.to_string().cyan(),
        result.len().saturating_sub(1)
    );

    // Group by depth, keeping discovery order within a level
    let mut by_depth: BTreeMap<u32, Vec<&AssetId>> = BTreeMap::new();
    for id in &result.assets {
        if let Some(depth) = result.depth_of(id) {
            if depth > 0 {
                by_depth.entry(depth).or_default().push(id);
            }
        }
    }

    if by_depth.is_empty() {
        println!("    {}", "(none)".dimmed());
    }

    let store = session.graph.read().await;
    for (depth, ids) in by_depth {
        println!("  {} {depth}:", "Depth".yellow());
        let labels: Vec<String> = ids
            .into_iter()
            .map(|id| {
                let mut label = asset_label(id, store.node(id));
                if let Some(hidden) = result.collapsed.get(id) {
                    label.push_str(&format!(" {}", format!("(+{hidden} collapsed)").dimmed()));
                }
                label
            })
            .collect();
        print_bullets(&labels, MAX_PER_DEPTH, "(none)");
    }

    if !result.missing.is_empty() {
        println!(
            "  {}: {} dangling reference(s)",
            "Missing".red().bold(),
            result.missing.len()
        );
    }
    if let Some(hidden) = result.collapsed.get(root) {
        println!("  {} {hidden} more at depth 1 hidden by --breadth", "•".dimmed());
    }
    if result.budget_exhausted {
        println!("  {}", "Visit budget exhausted; results are incomplete.".yellow());
    } else if result.truncated {
        println!("  {}", "Depth limit reached; more assets lie beyond.".dimmed());
    }
}
