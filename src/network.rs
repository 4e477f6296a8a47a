//! NEAT network chromosomes.
//!
//! A [`NetworkChromosome`] plays the program-under-test directly: every
//! step it reads the program's feature vector, activates, and picks an event
//! from its classification outputs. Nodes and connections live in slotmap
//! arenas, so recurrent edges and self-loops need no special ownership.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::activation::Activation;
use crate::chromosome::{Chromosome, ChromosomeId, Evaluation};
use crate::event::Event;
use crate::gene::{ConnectionGene, ConnectionId, NodeGene, NodeId, NodeType};
use crate::innovation::InnovationTracker;
use crate::neat::properties::Compatibility;
use crate::randomness::Randomness;
use crate::topology::GraphTopology;

/// Genomes with fewer connections than this are compared without
/// normalising excess and disjoint counts.
const NORMALISATION_THRESHOLD: usize = 20;

/// A network genome plus its per-generation NEAT bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkChromosome {
    #[serde(skip)]
    id: ChromosomeId,
    /// Arena storage for nodes.
    pub nodes: SlotMap<NodeId, NodeGene>,
    /// Arena storage for connections.
    pub connections: SlotMap<ConnectionId, ConnectionGene>,
    /// Input nodes, in feature order.
    pub input_ids: Vec<NodeId>,
    pub bias_id: Option<NodeId>,
    /// Classification outputs followed by regression outputs.
    pub output_ids: Vec<NodeId>,
    /// Scalar fitness assigned by the network fitness function.
    #[serde(default)]
    pub network_fitness: f64,
    /// Fitness shared among species members; drives offspring quotas.
    #[serde(skip)]
    pub shared_fitness: f64,
    /// Species this network was assigned to in the current generation.
    #[serde(skip)]
    pub species: Option<u32>,
    #[serde(skip)]
    evaluation: Evaluation,
}

impl NetworkChromosome {
    /// Nodes only: a bias, `num_inputs` inputs, one classification output
    /// per event and one regression output per event parameter.
    ///
    /// Uids are assigned in that order starting at 0, so two minimal
    /// networks built from the same inputs and events share all uids.
    #[must_use]
    pub fn minimal(num_inputs: usize, events: &[Event]) -> Self {
        let mut nodes: SlotMap<NodeId, NodeGene> = SlotMap::with_key();
        let mut uid = 0u32;
        let mut next_uid = || {
            let current = uid;
            uid += 1;
            current
        };

        let bias_id = Some(nodes.insert(NodeGene::bias(next_uid())));
        let input_ids = (0..num_inputs)
            .map(|_| nodes.insert(NodeGene::input(next_uid())))
            .collect();

        let mut output_ids: Vec<NodeId> = events
            .iter()
            .map(|event| nodes.insert(NodeGene::classification(next_uid(), event.identifier())))
            .collect();
        for event in events {
            for parameter in 0..event.num_parameters() {
                output_ids.push(nodes.insert(NodeGene::regression(
                    next_uid(),
                    event.identifier(),
                    parameter,
                )));
            }
        }

        Self {
            id: ChromosomeId::fresh(),
            nodes,
            connections: SlotMap::with_key(),
            input_ids,
            bias_id,
            output_ids,
            network_fitness: 0.0,
            shared_fitness: 0.0,
            species: None,
            evaluation: Evaluation::default(),
        }
    }

    /// Connect the bias and every input to every output. Each connection is
    /// enabled with `enable_probability` and weighted uniformly in
    /// `[-weight_range, weight_range]`.
    pub fn connect_sources_to_outputs(
        &mut self,
        tracker: &mut InnovationTracker,
        enable_probability: f64,
        weight_range: f64,
        rng: &mut Randomness,
    ) {
        let sources: Vec<NodeId> = self.bias_id.into_iter().chain(self.input_ids.clone()).collect();
        for source in sources {
            for target in self.output_ids.clone() {
                let weight = rng.next_double_between(-weight_range, weight_range);
                if let Some(connection) = self.add_connection(source, target, weight, false, tracker)
                {
                    self.connections[connection].enabled = rng.chance(enable_probability);
                }
            }
        }
    }

    /// Add a connection between two nodes, numbered through `tracker`.
    ///
    /// Returns `None` if either node is missing, the target is an input or
    /// the bias, the source is an output, or the nodes are already connected.
    /// Feed-forward connections that would close a cycle are rejected unless
    /// `recurrent` is set.
    pub fn add_connection(
        &mut self,
        source: NodeId,
        target: NodeId,
        weight: f64,
        recurrent: bool,
        tracker: &mut InnovationTracker,
    ) -> Option<ConnectionId> {
        let source_node = self.nodes.get(source)?;
        let target_node = self.nodes.get(target)?;
        if target_node.node_type.is_source() || source_node.node_type.is_output() {
            return None;
        }
        if self
            .connections
            .values()
            .any(|c| c.source == source && c.target == target)
        {
            return None;
        }
        let closes_cycle = GraphTopology::from_network(self).would_create_cycle(source, target);
        if closes_cycle && !recurrent {
            return None;
        }

        let innovation = tracker.connection_innovation(source_node.uid, target_node.uid);
        let mut connection = ConnectionGene::new(innovation, source, target, weight);
        connection.recurrent = closes_cycle;
        Some(self.connections.insert(connection))
    }

    /// Split `connection` with a new hidden node.
    ///
    /// The original connection is disabled; the incoming connection gets
    /// weight 1.0 and the outgoing one inherits the old weight. Returns
    /// `None` for missing or disabled connections.
    pub fn add_node(
        &mut self,
        connection: ConnectionId,
        activation: Activation,
        tracker: &mut InnovationTracker,
    ) -> Option<NodeId> {
        let split = self.connections.get_mut(connection)?;
        if !split.enabled {
            return None;
        }
        split.enabled = false;
        let (source, target, weight, innovation, recurrent) = (
            split.source,
            split.target,
            split.weight,
            split.innovation,
            split.recurrent,
        );
        let source_uid = self.nodes.get(source)?.uid;
        let target_uid = self.nodes.get(target)?.uid;

        if let Some(max_uid) = self.nodes.values().map(|n| n.uid).max() {
            tracker.reserve_node_uid(max_uid);
        }
        // The same split in another network of this generation shares the uid
        let mut uid = tracker.split_node_uid(innovation);
        if self.node_by_uid(uid).is_some() {
            uid = tracker.fresh_node_uid();
        }
        let hidden = self.nodes.insert(NodeGene::hidden(uid, activation));

        let incoming = tracker.connection_innovation(source_uid, uid);
        self.connections
            .insert(ConnectionGene::new(incoming, source, hidden, 1.0));

        let outgoing = tracker.connection_innovation(uid, target_uid);
        let mut out = ConnectionGene::new(outgoing, hidden, target, weight);
        out.recurrent = recurrent;
        self.connections.insert(out);
        Some(hidden)
    }

    /// Mark enabled feed-forward connections that close a cycle as recurrent.
    /// Returns how many were marked.
    pub fn mark_recurrent_cycles(&mut self) -> usize {
        let mut marked = 0;
        loop {
            let topology = GraphTopology::from_network(self);
            let Some(back_edge) = topology.find_back_edge(self) else {
                return marked;
            };
            match self.connections.get_mut(back_edge) {
                Some(connection) => {
                    connection.recurrent = true;
                    marked += 1;
                }
                None => return marked,
            }
        }
    }

    #[must_use]
    pub fn node_by_uid(&self, uid: u32) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, node)| node.uid == uid)
            .map(|(id, _)| id)
    }

    #[must_use]
    pub fn find_connection_by_innovation(&self, innovation: u64) -> Option<ConnectionId> {
        self.connections
            .iter()
            .find(|(_, c)| c.innovation == innovation)
            .map(|(id, _)| id)
    }

    #[must_use]
    pub fn hidden_ids(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, n)| n.node_type == NodeType::Hidden)
            .map(|(id, _)| id)
            .collect()
    }

    #[must_use]
    pub fn num_enabled_connections(&self) -> usize {
        self.connections.values().filter(|c| c.enabled).count()
    }

    /// Event identifiers of the classification outputs, in output order.
    #[must_use]
    pub fn classification_events(&self) -> Vec<&str> {
        self.output_ids
            .iter()
            .filter_map(|&id| match &self.nodes.get(id)?.node_type {
                NodeType::Classification { event } => Some(event.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Every connection endpoint and every listed input/output exists.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let endpoints_exist = self
            .connections
            .values()
            .all(|c| self.nodes.contains_key(c.source) && self.nodes.contains_key(c.target));
        let listed_exist = self
            .input_ids
            .iter()
            .chain(&self.output_ids)
            .chain(&self.bias_id)
            .all(|&id| self.nodes.contains_key(id));
        endpoints_exist && listed_exist
    }

    /// Genetic distance used for speciation: weighted excess and disjoint
    /// gene counts plus the average weight difference of matching genes.
    #[must_use]
    pub fn compatibility_distance(&self, other: &NetworkChromosome, coefficients: &Compatibility) -> f64 {
        let own: HashMap<u64, f64> = self
            .connections
            .values()
            .map(|c| (c.innovation, c.weight))
            .collect();
        let theirs: HashMap<u64, f64> = other
            .connections
            .values()
            .map(|c| (c.innovation, c.weight))
            .collect();
        let own_max = own.keys().copied().max().unwrap_or(0);
        let their_max = theirs.keys().copied().max().unwrap_or(0);

        let mut matching = 0usize;
        let mut weight_difference = 0.0;
        let mut disjoint = 0usize;
        let mut excess = 0usize;

        for (innovation, weight) in &own {
            match theirs.get(innovation) {
                Some(other_weight) => {
                    matching += 1;
                    weight_difference += (weight - other_weight).abs();
                }
                None if *innovation > their_max => excess += 1,
                None => disjoint += 1,
            }
        }
        for innovation in theirs.keys().filter(|i| !own.contains_key(i)) {
            if *innovation > own_max {
                excess += 1;
            } else {
                disjoint += 1;
            }
        }

        let size = own.len().max(theirs.len());
        let normaliser = if size >= NORMALISATION_THRESHOLD {
            size as f64
        } else {
            1.0
        };
        let average_weight_difference = if matching > 0 {
            weight_difference / matching as f64
        } else {
            0.0
        };

        coefficients.excess_coefficient * excess as f64 / normaliser
            + coefficients.disjoint_coefficient * disjoint as f64 / normaliser
            + coefficients.weight_coefficient * average_weight_difference
    }

    /// Same genes, new identity and no evaluation or NEAT bookkeeping.
    #[must_use]
    pub fn clone_structure(&self) -> Self {
        Self {
            id: ChromosomeId::fresh(),
            nodes: self.nodes.clone(),
            connections: self.connections.clone(),
            input_ids: self.input_ids.clone(),
            bias_id: self.bias_id,
            output_ids: self.output_ids.clone(),
            network_fitness: 0.0,
            shared_fitness: 0.0,
            species: None,
            evaluation: Evaluation::default(),
        }
    }

    /// Assign a fresh identity after deserialisation or structural edits.
    pub fn renew_id(&mut self) {
        self.id = ChromosomeId::fresh();
    }
}

impl Chromosome for NetworkChromosome {
    fn id(&self) -> ChromosomeId {
        self.id
    }

    /// Number of events played in the last playthrough, or the number of
    /// enabled connections before the first one.
    fn length(&self) -> usize {
        self.trace()
            .map(|trace| trace.len())
            .unwrap_or_else(|| self.num_enabled_connections())
    }

    fn evaluation(&self) -> &Evaluation {
        &self.evaluation
    }

    fn evaluation_mut(&mut self) -> &mut Evaluation {
        &mut self.evaluation
    }
}
