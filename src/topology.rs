//! Graph topology analysis using CSR format.
//!
//! Builds a compressed sparse row snapshot of a network's enabled
//! feed-forward connections. Recurrent connections are left out: they read
//! the previous step's activations and never constrain evaluation order.
//!
//! ## Determinism
//!
//! Nodes are ordered by uid and edges by innovation number, so equivalent
//! networks yield identical traversal orders regardless of mutation history.

use std::collections::VecDeque;

use crate::gene::{ConnectionId, NodeId};
use crate::network::NetworkChromosome;

/// CSR-format graph topology of a network.
#[derive(Debug, Clone)]
pub struct GraphTopology {
    node_count: usize,
    /// Maps NodeId to dense index (0..node_count), sorted by NodeId.
    node_to_idx: Vec<(NodeId, usize)>,
    /// Maps dense index back to NodeId.
    idx_to_node: Vec<NodeId>,
    /// CSR offsets for outgoing edges. Length = node_count + 1.
    fwd_offsets: Vec<usize>,
    /// fwd_targets[fwd_offsets[i]..fwd_offsets[i+1]] are successors of node i.
    fwd_targets: Vec<usize>,
    /// Connection IDs parallel to fwd_targets.
    fwd_conn_ids: Vec<ConnectionId>,
    /// CSR offsets for incoming edges. Length = node_count + 1.
    rev_offsets: Vec<usize>,
    /// rev_sources[rev_offsets[i]..rev_offsets[i+1]] are predecessors of node i.
    rev_sources: Vec<usize>,
}

impl GraphTopology {
    /// Build topology from a network's enabled, non-recurrent connections.
    #[must_use]
    pub fn from_network(network: &NetworkChromosome) -> Self {
        let mut node_entries: Vec<(NodeId, u32)> = network
            .nodes
            .iter()
            .map(|(id, node)| (id, node.uid))
            .collect();
        node_entries.sort_by_key(|(_, uid)| *uid);

        let node_count = node_entries.len();
        let idx_to_node: Vec<NodeId> = node_entries.iter().map(|(id, _)| *id).collect();

        let mut node_to_idx: Vec<(NodeId, usize)> = idx_to_node
            .iter()
            .enumerate()
            .map(|(i, &id)| (id, i))
            .collect();
        node_to_idx.sort_by_key(|(id, _)| *id);

        let mut edges: Vec<(ConnectionId, usize, usize, u64)> = network
            .connections
            .iter()
            .filter(|(_, c)| c.enabled && !c.recurrent)
            .filter_map(|(id, c)| {
                let from = lookup_idx(&node_to_idx, c.source)?;
                let to = lookup_idx(&node_to_idx, c.target)?;
                Some((id, from, to, c.innovation))
            })
            .collect();
        edges.sort_by_key(|(_, _, _, inn)| *inn);

        let (fwd_offsets, fwd_targets, fwd_conn_ids) =
            build_csr(node_count, edges.iter().map(|&(id, from, to, _)| (from, to, id)));
        let (rev_offsets, rev_sources, _) =
            build_csr(node_count, edges.iter().map(|&(id, from, to, _)| (to, from, id)));

        Self {
            node_count,
            node_to_idx,
            idx_to_node,
            fwd_offsets,
            fwd_targets,
            fwd_conn_ids,
            rev_offsets,
            rev_sources,
        }
    }

    /// Get the dense index for a NodeId.
    #[inline]
    pub fn node_index(&self, id: NodeId) -> Option<usize> {
        lookup_idx(&self.node_to_idx, id)
    }

    /// Get the NodeId for a dense index.
    #[inline]
    pub fn node_id(&self, idx: usize) -> Option<NodeId> {
        self.idx_to_node.get(idx).copied()
    }

    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Iterate over successors of a node.
    #[inline]
    pub fn successors(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        let start = self.fwd_offsets[idx];
        let end = self.fwd_offsets[idx + 1];
        self.fwd_targets[start..end].iter().copied()
    }

    /// Iterate over predecessors of a node.
    #[inline]
    pub fn predecessors(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        let start = self.rev_offsets[idx];
        let end = self.rev_offsets[idx + 1];
        self.rev_sources[start..end].iter().copied()
    }

    /// Check if adding edge from `from_id` to `to_id` would create a cycle.
    ///
    /// BFS forward from `to_id`; reaching `from_id` means a path back exists.
    #[must_use]
    pub fn would_create_cycle(&self, from_id: NodeId, to_id: NodeId) -> bool {
        let (Some(from_idx), Some(to_idx)) = (self.node_index(from_id), self.node_index(to_id))
        else {
            return false;
        };

        if from_idx == to_idx {
            return true;
        }

        let mut visited = vec![false; self.node_count];
        let mut queue = VecDeque::new();
        queue.push_back(to_idx);
        visited[to_idx] = true;

        while let Some(current) = queue.pop_front() {
            for succ in self.successors(current) {
                if succ == from_idx {
                    return true;
                }
                if !visited[succ] {
                    visited[succ] = true;
                    queue.push_back(succ);
                }
            }
        }

        false
    }

    /// Detect if the feed-forward graph contains any cycle.
    #[must_use]
    pub fn has_cycle(&self) -> bool {
        self.topological_order().is_none()
    }

    /// Find a back edge using iterative DFS.
    ///
    /// Returns the back edge with the lowest absolute weight, to disturb the
    /// signal as little as possible when it is turned recurrent.
    pub fn find_back_edge(&self, network: &NetworkChromosome) -> Option<ConnectionId> {
        // 0=white, 1=gray (on the path), 2=black (done)
        let mut color = vec![0u8; self.node_count];
        let mut back_edges: Vec<ConnectionId> = Vec::new();
        let mut stack: Vec<(usize, usize, bool)> = Vec::with_capacity(self.node_count);

        for start in 0..self.node_count {
            if color[start] != 0 {
                continue;
            }

            stack.push((start, 0, true));

            while let Some((node, edge_offset, is_entering)) = stack.pop() {
                if is_entering {
                    color[node] = 1;
                }

                let start_pos = self.fwd_offsets[node];
                let num_edges = self.fwd_offsets[node + 1] - start_pos;

                let mut found_unvisited = false;
                for offset in edge_offset..num_edges {
                    let actual_idx = start_pos + offset;
                    let neighbor = self.fwd_targets[actual_idx];

                    if color[neighbor] == 1 {
                        back_edges.push(self.fwd_conn_ids[actual_idx]);
                    } else if color[neighbor] == 0 {
                        stack.push((node, offset + 1, false));
                        stack.push((neighbor, 0, true));
                        found_unvisited = true;
                        break;
                    }
                }

                if !found_unvisited {
                    color[node] = 2;
                }
            }
        }

        let weight = |id: ConnectionId| {
            network
                .connections
                .get(id)
                .map(|c| c.weight.abs())
                .unwrap_or(0.0)
        };
        back_edges
            .into_iter()
            .min_by(|&a, &b| weight(a).total_cmp(&weight(b)))
    }

    /// Node indices in topological order (Kahn's algorithm, lowest uid first
    /// among ready nodes). Returns None if the graph has cycles.
    #[must_use]
    pub fn topological_order(&self) -> Option<Vec<usize>> {
        let mut in_degree: Vec<usize> = (0..self.node_count)
            .map(|idx| self.rev_offsets[idx + 1] - self.rev_offsets[idx])
            .collect();

        let mut queue: VecDeque<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &deg)| deg == 0)
            .map(|(idx, _)| idx)
            .collect();

        let mut order = Vec::with_capacity(self.node_count);
        while let Some(u) = queue.pop_front() {
            order.push(u);
            for v in self.successors(u) {
                in_degree[v] -= 1;
                if in_degree[v] == 0 {
                    queue.push_back(v);
                }
            }
        }

        (order.len() == self.node_count).then_some(order)
    }
}

/// Group `(row, column, id)` edges by row into CSR arrays.
fn build_csr(
    node_count: usize,
    edges: impl Iterator<Item = (usize, usize, ConnectionId)> + Clone,
) -> (Vec<usize>, Vec<usize>, Vec<ConnectionId>) {
    let mut counts = vec![0usize; node_count];
    for (row, _, _) in edges.clone() {
        counts[row] += 1;
    }

    let mut offsets = Vec::with_capacity(node_count + 1);
    let mut total = 0;
    offsets.push(0);
    for count in counts {
        total += count;
        offsets.push(total);
    }

    let mut columns = vec![0usize; total];
    let mut ids = vec![ConnectionId::default(); total];
    let mut write_pos = offsets[..node_count].to_vec();
    for (row, column, id) in edges {
        let pos = write_pos[row];
        columns[pos] = column;
        ids[pos] = id;
        write_pos[row] += 1;
    }

    (offsets, columns, ids)
}

/// Binary search for NodeId in sorted vec.
fn lookup_idx(sorted: &[(NodeId, usize)], id: NodeId) -> Option<usize> {
    sorted
        .binary_search_by_key(&id, |(k, _)| *k)
        .ok()
        .map(|pos| sorted[pos].1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::Activation;
    use crate::event::Event;
    use crate::innovation::InnovationTracker;
    use crate::randomness::Randomness;

    fn network(tracker: &mut InnovationTracker) -> NetworkChromosome {
        let mut rng = Randomness::new(42);
        let mut network = NetworkChromosome::minimal(2, &[Event::ClickStage]);
        network.connect_sources_to_outputs(tracker, 1.0, 1.0, &mut rng);
        network
    }

    #[test]
    fn test_topology_basic() {
        let mut tracker = InnovationTracker::new();
        let network = network(&mut tracker);
        let topo = GraphTopology::from_network(&network);

        // bias + 2 inputs + 1 output
        assert_eq!(topo.node_count(), 4);
        assert!(!topo.has_cycle());
        let output = topo.node_index(network.output_ids[0]).unwrap();
        assert_eq!(topo.predecessors(output).count(), 3);
    }

    #[test]
    fn test_would_create_cycle() {
        let mut tracker = InnovationTracker::new();
        let mut network = network(&mut tracker);
        let split = network.connections.keys().next().unwrap();
        let hidden = network
            .add_node(split, Activation::Sigmoid, &mut tracker)
            .unwrap();
        let topo = GraphTopology::from_network(&network);

        let output = network.output_ids[0];
        assert!(topo.would_create_cycle(output, hidden));
        assert!(!topo.would_create_cycle(network.input_ids[1], hidden));
    }

    #[test]
    fn test_recurrent_edges_are_ignored() {
        let mut tracker = InnovationTracker::new();
        let mut network = network(&mut tracker);
        let split = network.connections.keys().next().unwrap();
        let hidden = network
            .add_node(split, Activation::Sigmoid, &mut tracker)
            .unwrap();
        network.add_connection(hidden, hidden, 0.5, true, &mut tracker);

        let topo = GraphTopology::from_network(&network);
        assert!(!topo.has_cycle());
        assert_eq!(topo.topological_order().map(|o| o.len()), Some(5));
    }

    #[test]
    fn test_find_back_edge_picks_weakest() {
        let mut tracker = InnovationTracker::new();
        let mut network = network(&mut tracker);
        let split = network.connections.keys().next().unwrap();
        let a = network
            .add_node(split, Activation::Sigmoid, &mut tracker)
            .unwrap();
        let out_of_a = network
            .connections
            .iter()
            .find(|(_, c)| c.source == a)
            .map(|(id, _)| id)
            .unwrap();
        let b = network
            .add_node(out_of_a, Activation::Sigmoid, &mut tracker)
            .unwrap();

        // Force a feed-forward cycle a -> b -> a with a weak closing edge
        let closing = network.add_connection(b, a, 0.01, true, &mut tracker).unwrap();
        network.connections[closing].recurrent = false;

        let topo = GraphTopology::from_network(&network);
        assert!(topo.has_cycle());
        assert_eq!(topo.find_back_edge(&network), Some(closing));
    }
}
