//! Stable topological ordering.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};

/// Kahn's algorithm where, among ready nodes, the one with the smallest
/// priority key is emitted first.
///
/// Returns the nodes left over when the graph has a cycle.
pub fn prioritized_toposort<N, E, K>(
  graph: &DiGraph<N, E>,
  priority: impl Fn(NodeIndex) -> K,
) -> Result<Vec<NodeIndex>, Vec<NodeIndex>>
where
  K: Ord,
{
  let mut in_degree: Vec<usize> = graph
    .node_indices()
    .map(|idx| graph.neighbors_directed(idx, Direction::Incoming).count())
    .collect();

  let mut ready: BinaryHeap<Reverse<(K, NodeIndex)>> = graph
    .node_indices()
    .filter(|idx| in_degree[idx.index()] == 0)
    .map(|idx| Reverse((priority(idx), idx)))
    .collect();

  let mut sorted = Vec::with_capacity(graph.node_count());
  while let Some(Reverse((_, idx))) = ready.pop() {
    sorted.push(idx);
    for next in graph.neighbors_directed(idx, Direction::Outgoing) {
      let degree = &mut in_degree[next.index()];
      *degree -= 1;
      if *degree == 0 {
        ready.push(Reverse((priority(next), next)));
      }
    }
  }

  if sorted.len() < graph.node_count() {
    let left = graph.node_indices().filter(|idx| in_degree[idx.index()] > 0).collect();
    return Err(left);
  }
  Ok(sorted)
}
