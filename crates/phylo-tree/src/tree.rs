//! Spanning tree extraction and parent assignment.

use std::collections::VecDeque;

use petgraph::algo::min_spanning_tree;
use petgraph::data::Element;
use petgraph::graph::{NodeIndex, UnGraph};
use tracing::{debug, warn};

use phylo_core::types::{ClusteredItem, DateRange, PhylogenyTree, TreeNode};

use crate::dates::format_day;
use crate::graph::SquareMatrix;

/// MST over the complete graph where missing edges weigh `fallback`, so the
/// result always spans every node. Returns `(a, b, weight)` edges.
pub fn spanning_edges(distances: &SquareMatrix<Option<f64>>, fallback: f64) -> Vec<(usize, usize, f64)> {
    let n = distances.len();
    let mut graph: UnGraph<(), f64> = UnGraph::with_capacity(n, n * n.saturating_sub(1) / 2);
    let nodes: Vec<NodeIndex> = (0..n).map(|_| graph.add_node(())).collect();
    let mut fallback_edges = 0usize;
    for i in 0..n {
        for j in (i + 1)..n {
            let w = distances.get(i, j).unwrap_or_else(|| {
                fallback_edges += 1;
                fallback
            });
            graph.add_edge(nodes[i], nodes[j], w);
        }
    }
    debug!(n, fallback_edges, "distance graph built");

    min_spanning_tree(&graph)
        .filter_map(|element| match element {
            Element::Edge { source, target, weight } => Some((source, target, weight)),
            Element::Node { .. } => None,
        })
        .collect()
}

/// Index of the earliest timestamp; the first one wins on ties.
pub fn root_index(timestamps: &[i64]) -> Option<usize> {
    timestamps.iter().enumerate().min_by_key(|(_, &t)| t).map(|(i, _)| i)
}

/// Breadth-first parent pointers from `root` over the undirected `edges`,
/// visiting neighbors in ascending index order. Nodes the traversal never
/// reaches are attached directly to the root.
pub fn assign_parents(n: usize, edges: &[(usize, usize, f64)], root: usize) -> Vec<Option<usize>> {
    let mut adjacency = vec![Vec::new(); n];
    for &(a, b, _) in edges {
        adjacency[a].push(b);
        adjacency[b].push(a);
    }
    for neighbors in &mut adjacency {
        neighbors.sort_unstable();
        neighbors.dedup();
    }

    let mut visited = vec![false; n];
    let mut parent = vec![None; n];
    let mut queue = VecDeque::from([root]);
    visited[root] = true;
    while let Some(node) = queue.pop_front() {
        for &next in &adjacency[node] {
            if !visited[next] {
                visited[next] = true;
                parent[next] = Some(node);
                queue.push_back(next);
            }
        }
    }

    let orphans: Vec<usize> = (0..n).filter(|&i| !visited[i]).collect();
    if !orphans.is_empty() {
        warn!(count = orphans.len(), "attaching nodes unreachable from the root directly to it");
        for i in orphans {
            parent[i] = Some(root);
        }
    }
    parent
}

/// Assemble the serializable tree from parent indices.
pub fn build_tree(items: &[ClusteredItem], parents: &[Option<usize>], root: usize) -> PhylogenyTree {
    let nodes = items
        .iter()
        .zip(parents.iter())
        .map(|(ci, parent)| TreeNode {
            id: ci.item.id.clone(),
            parent: parent.map(|p| items[p].item.id.clone()),
            timestamp: ci.item.timestamp,
            date: format_day(ci.item.timestamp),
            cluster: ci.cluster,
        })
        .collect();

    let root_ts = items[root].item.timestamp;
    let max_ts = items.iter().map(|ci| ci.item.timestamp).max().unwrap_or(root_ts);
    PhylogenyTree {
        nodes,
        root_id: items[root].item.id.clone(),
        root_date: format_day(root_ts),
        date_range: DateRange { min: format_day(root_ts), max: format_day(max_ts) },
    }
}
