//! Common display utilities for CLI commands.

use colored::Colorize;

use assetgraph::domain::{AssetId, AssetNode};

/// Render an asset with its type tag and state badges.
///
/// `/Game/A.A [Material]`, with `missing` in red for dangling references and
/// `stale` in yellow when the last catalogue fetch failed.
pub fn asset_label(id: &AssetId, node: Option<&AssetNode>) -> String {
    let mut label = id.to_string();
    let Some(node) = node else {
        return label;
    };

    if let Some(asset_type) = &node.asset_type {
        label.push_str(&format!(" {}", format!("[{asset_type}]").dimmed()));
    }
    if node.is_missing() {
        label.push_str(&format!(" {}", "missing".red().bold()));
    }
    if node.stale {
        label.push_str(&format!(" {}", "stale".yellow()));
    }
    label
}

/// Print a bulleted list, showing at most `limit` items.
pub fn print_bullets(items: &[String], limit: usize, empty_message: &str) {
    if items.is_empty() {
        println!("    {}", empty_message.dimmed());
        return;
    }

    for item in items.iter().take(limit) {
        println!("    {} {item}", "•".dimmed());
    }

    if items.len() > limit {
        println!("    {} ... and {} more", "•".dimmed(), items.len() - limit);
    }
}
