//! Level-order closure over the graph.

use std::collections::{BTreeSet, HashSet, VecDeque};

use super::{Charge, QueryResult, TraversalRule, VisitBudget};
use crate::domain::{AssetId, ReferenceEdge};
use crate::error::Result;
use crate::store::{Direction, GraphStore};

/// Collect every asset reachable from `roots` under `rule`.
///
/// Roots are deduplicated, sorted, and always included at depth 0 regardless
/// of the rule's filters. Neighbours are expanded in ascending [`AssetId`]
/// order so the discovery order is a pure function of graph and rule. Filtered
/// assets are neither included nor expanded through.
///
/// The traversal stops early (with `truncated` set) when the budget runs out,
/// and with `cancelled` set when the budget's cancel token fires. A depth
/// limit sets `truncated` only if some eligible asset was actually left out.
///
/// # Errors
///
/// Returns `Error::InvalidRequest` if the rule fails validation.
pub fn traverse(
    store: &GraphStore,
    roots: &[AssetId],
    rule: &TraversalRule,
    budget: &mut VisitBudget,
) -> Result<QueryResult> {
    rule.validate()?;

    let mut result = QueryResult {
        epoch: store.epoch(),
        ..QueryResult::default()
    };
    let mut queue: VecDeque<(AssetId, u32)> = VecDeque::new();

    let roots: BTreeSet<&AssetId> = roots.iter().collect();
    for root in roots {
        if !store.contains_node(root) {
            result.unknown_roots.push(root.clone());
            continue;
        }
        if !admit(store, &mut result, budget, root, 0) {
            return Ok(finish(store, result));
        }
        queue.push_back((root.clone(), 0));
    }

    'expand: while let Some((current, depth)) = queue.pop_front() {
        let edges = store.neighbor_edges(&current, rule.direction, rule.kinds);

        if rule.max_depth.is_some_and(|max| depth >= max) {
            let left_out = edges.iter().any(|edge| {
                let other = far_end(edge, rule.direction);
                !result.contains(other) && rule.admits(store, other)
            });
            result.truncated |= left_out;
            continue;
        }

        let mut added = 0usize;
        let mut overflow = 0usize;
        let mut last_skipped: Option<&AssetId> = None;

        for edge in &edges {
            let other = far_end(edge, rule.direction);
            if result.contains(other) {
                result.edges.push(edge.clone());
                continue;
            }
            if !rule.admits(store, other) {
                continue;
            }
            if rule.max_breadth.is_some_and(|max| added >= max) {
                if last_skipped != Some(other) {
                    overflow += 1;
                    last_skipped = Some(other);
                }
                continue;
            }
            if !admit(store, &mut result, budget, other, depth + 1) {
                break 'expand;
            }
            result.edges.push(edge.clone());
            queue.push_back((other.clone(), depth + 1));
            added += 1;
        }

        if overflow > 0 {
            result.collapsed.insert(current, overflow);
        }
    }

    Ok(finish(store, result))
}

/// Charge the budget for one asset and record it. Returns `false` when the
/// traversal must stop.
fn admit(
    store: &GraphStore,
    result: &mut QueryResult,
    budget: &mut VisitBudget,
    id: &AssetId,
    depth: u32,
) -> bool {
    match budget.charge() {
        Charge::Granted => {
            result.assets.push(id.clone());
            result.depths.insert(id.clone(), depth);
            if store.node(id).is_some_and(|node| node.is_missing()) {
                result.missing.push(id.clone());
            }
            true
        }
        Charge::Exhausted => {
            tracing::debug!(asset = %id, "Visit budget exhausted");
            result.truncated = true;
            result.budget_exhausted = true;
            false
        }
        Charge::Cancelled => {
            result.cancelled = true;
            false
        }
    }
}

fn finish(store: &GraphStore, result: QueryResult) -> QueryResult {
    debug_assert_eq!(result.epoch, store.epoch());
    debug_assert_eq!(
        result.assets.iter().collect::<HashSet<_>>().len(),
        result.assets.len()
    );
    result
}

fn far_end(edge: &ReferenceEdge, direction: Direction) -> &AssetId {
    match direction {
        Direction::Dependencies => &edge.target,
        Direction::Dependents => &edge.source,
    }
}
