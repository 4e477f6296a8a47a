//! Innovation tracking for NEAT.
//!
//! Every structurally new connection receives a historical marking from a
//! monotonically increasing counter. Within one generation, connections
//! between the same pair of nodes get the same number, so that gene
//! alignment during crossover is meaningful. Node splits are deduplicated
//! the same way so that splitting the same connection in two networks yields
//! the same hidden node uid.
//!
//! The tracker is owned by the population of one run and passed by
//! `&mut` to mutation operators. Starting an independent run means creating
//! (or [`reset`](InnovationTracker::reset)ting) a tracker.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::network::NetworkChromosome;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InnovationTracker {
    next_innovation: u64,
    next_node_uid: u32,
    /// (source uid, target uid) -> innovation, for the current generation.
    #[serde(skip)]
    connections: HashMap<(u32, u32), u64>,
    /// split connection innovation -> node uid, for the current generation.
    #[serde(skip)]
    splits: HashMap<u64, u32>,
}

impl InnovationTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A tracker whose counters continue after everything in `networks`,
    /// with the networks' connections registered for the current generation.
    #[must_use]
    pub fn seeded_from(networks: &[NetworkChromosome]) -> Self {
        let mut tracker = Self::new();
        for network in networks {
            tracker.observe(network);
        }
        tracker
    }

    /// Advance the counters past the innovations and uids used by `network`.
    pub fn observe(&mut self, network: &NetworkChromosome) {
        for node in network.nodes.values() {
            self.next_node_uid = self.next_node_uid.max(node.uid + 1);
        }
        for connection in network.connections.values() {
            self.next_innovation = self.next_innovation.max(connection.innovation + 1);
            if let (Some(source), Some(target)) = (
                network.nodes.get(connection.source),
                network.nodes.get(connection.target),
            ) {
                self.connections
                    .entry((source.uid, target.uid))
                    .or_insert(connection.innovation);
            }
        }
    }

    /// Innovation number for a connection `source_uid -> target_uid`,
    /// reusing the number assigned earlier in this generation.
    pub fn connection_innovation(&mut self, source_uid: u32, target_uid: u32) -> u64 {
        let next = &mut self.next_innovation;
        *self
            .connections
            .entry((source_uid, target_uid))
            .or_insert_with(|| {
                let innovation = *next;
                *next += 1;
                innovation
            })
    }

    /// Uid for the hidden node created by splitting `connection_innovation`.
    pub fn split_node_uid(&mut self, connection_innovation: u64) -> u32 {
        let next = &mut self.next_node_uid;
        *self.splits.entry(connection_innovation).or_insert_with(|| {
            let uid = *next;
            *next += 1;
            uid
        })
    }

    /// Make sure freshly allocated uids are greater than `uid`.
    pub fn reserve_node_uid(&mut self, uid: u32) {
        self.next_node_uid = self.next_node_uid.max(uid + 1);
    }

    /// A node uid nobody has used yet.
    pub fn fresh_node_uid(&mut self) -> u32 {
        let uid = self.next_node_uid;
        self.next_node_uid += 1;
        uid
    }

    /// Forget this generation's structural innovations; counters keep
    /// increasing.
    pub fn new_generation(&mut self) {
        self.connections.clear();
        self.splits.clear();
    }

    /// Start over for an independent run.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    #[must_use]
    pub fn next_innovation(&self) -> u64 {
        self.next_innovation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_generation_deduplicates() {
        let mut tracker = InnovationTracker::new();
        let a = tracker.connection_innovation(1, 2);
        let b = tracker.connection_innovation(1, 2);
        let c = tracker.connection_innovation(2, 1);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_new_generation_allocates_new_numbers() {
        let mut tracker = InnovationTracker::new();
        let first = tracker.connection_innovation(1, 2);
        tracker.new_generation();
        let second = tracker.connection_innovation(1, 2);
        assert!(second > first);
    }

    #[test]
    fn test_split_uids_are_shared_within_generation() {
        let mut tracker = InnovationTracker::new();
        let a = tracker.split_node_uid(10);
        let b = tracker.split_node_uid(10);
        let c = tracker.split_node_uid(11);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(tracker.fresh_node_uid(), c);
    }

    #[test]
    fn test_reset_restarts_counters() {
        let mut tracker = InnovationTracker::new();
        tracker.connection_innovation(0, 1);
        tracker.connection_innovation(0, 2);
        tracker.reset();
        assert_eq!(tracker.next_innovation(), 0);
    }
}
