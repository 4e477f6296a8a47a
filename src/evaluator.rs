//! Stateful activation of network chromosomes.
//!
//! A [`NetworkEvaluator`] compiles a [`NetworkChromosome`] into flat CSR
//! arrays once per playthrough. Feed-forward edges are summed in
//! topological order; recurrent edges read the activations of the previous
//! call to [`activate`](NetworkEvaluator::activate), which is what lets a
//! network remember earlier game states.

use std::collections::HashMap;

use thiserror::Error;

use crate::activation::{softmax, Activation};
use crate::gene::{NodeId, NodeType};
use crate::network::NetworkChromosome;
use crate::topology::GraphTopology;

/// Error type for evaluator construction failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluatorError {
    /// Enabled feed-forward connections form a cycle; such edges must be
    /// marked recurrent first.
    #[error("network contains a feed-forward cycle")]
    CyclicNetwork,
}

/// A compiled, evaluation-ready network.
#[derive(Debug, Clone)]
pub struct NetworkEvaluator {
    /// Node activations of the current step.
    activations: Vec<f64>,
    /// Node activations of the previous step, read by recurrent edges.
    previous: Vec<f64>,
    activation_fns: Vec<Activation>,
    // For node i, feed-forward inputs are at [csr_offsets[i]..csr_offsets[i+1]).
    csr_offsets: Vec<usize>,
    csr_sources: Vec<usize>,
    csr_weights: Vec<f64>,
    // Same layout for recurrent inputs.
    rec_offsets: Vec<usize>,
    rec_sources: Vec<usize>,
    rec_weights: Vec<f64>,
    input_indices: Vec<usize>,
    bias_index: Option<usize>,
    output_indices: Vec<usize>,
    output_types: Vec<NodeType>,
    /// Non-source nodes in topological order.
    eval_order: Vec<usize>,
}

impl NetworkEvaluator {
    /// Compile a network.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluatorError::CyclicNetwork`] if enabled, non-recurrent
    /// connections contain a cycle.
    pub fn try_new(network: &NetworkChromosome) -> Result<Self, EvaluatorError> {
        let topo = GraphTopology::from_network(network);
        let order = topo
            .topological_order()
            .ok_or(EvaluatorError::CyclicNetwork)?;

        // Dense evaluator indices follow the topological order
        let mut index_of: HashMap<NodeId, usize> = HashMap::with_capacity(order.len());
        let mut activation_fns = Vec::with_capacity(order.len());
        let mut eval_order = Vec::new();
        let mut bias_index = None;
        for (idx, &topo_idx) in order.iter().enumerate() {
            let Some(id) = topo.node_id(topo_idx) else {
                continue;
            };
            let Some(node) = network.nodes.get(id) else {
                continue;
            };
            index_of.insert(id, idx);
            activation_fns.push(node.activation);
            match node.node_type {
                NodeType::Input => {}
                NodeType::Bias => bias_index = Some(idx),
                _ => eval_order.push(idx),
            }
        }

        let input_indices = network
            .input_ids
            .iter()
            .filter_map(|id| index_of.get(id).copied())
            .collect();
        let (output_indices, output_types): (Vec<usize>, Vec<NodeType>) = network
            .output_ids
            .iter()
            .filter_map(|id| Some((*index_of.get(id)?, network.nodes.get(*id)?.node_type.clone())))
            .unzip();

        let mut forward = Vec::new();
        let mut recurrent = Vec::new();
        for connection in network.connections.values().filter(|c| c.enabled) {
            let (Some(&from), Some(&to)) =
                (index_of.get(&connection.source), index_of.get(&connection.target))
            else {
                continue;
            };
            let edge = (to, from, connection.weight, connection.innovation);
            if connection.recurrent {
                recurrent.push(edge);
            } else {
                forward.push(edge);
            }
        }
        let node_count = activation_fns.len();
        let (csr_offsets, csr_sources, csr_weights) = build_incoming(node_count, forward);
        let (rec_offsets, rec_sources, rec_weights) = build_incoming(node_count, recurrent);

        Ok(Self {
            activations: vec![0.0; node_count],
            previous: vec![0.0; node_count],
            activation_fns,
            csr_offsets,
            csr_sources,
            csr_weights,
            rec_offsets,
            rec_sources,
            rec_weights,
            input_indices,
            bias_index,
            output_indices,
            output_types,
            eval_order,
        })
    }

    /// Forget all remembered activations.
    pub fn reset(&mut self) {
        self.activations.fill(0.0);
        self.previous.fill(0.0);
    }

    /// Run one step and return the output activations in output order.
    ///
    /// Missing inputs read as 0.0; surplus inputs are ignored, so networks
    /// survive programs whose feature vector changes length.
    pub fn activate(&mut self, inputs: &[f64]) -> Vec<f64> {
        self.previous.copy_from_slice(&self.activations);

        for (i, &idx) in self.input_indices.iter().enumerate() {
            self.activations[idx] = inputs.get(i).copied().unwrap_or(0.0);
        }
        if let Some(bias) = self.bias_index {
            self.activations[bias] = 1.0;
        }

        for &node in &self.eval_order {
            let mut sum = 0.0;
            for i in self.csr_offsets[node]..self.csr_offsets[node + 1] {
                sum += self.activations[self.csr_sources[i]] * self.csr_weights[i];
            }
            for i in self.rec_offsets[node]..self.rec_offsets[node + 1] {
                sum += self.previous[self.rec_sources[i]] * self.rec_weights[i];
            }
            self.activations[node] = self.activation_fns[node].apply(sum);
        }

        self.output_indices
            .iter()
            .map(|&idx| self.activations[idx])
            .collect()
    }

    /// Kind of each output, parallel to the result of [`activate`](Self::activate).
    #[must_use]
    pub fn output_types(&self) -> &[NodeType] {
        &self.output_types
    }

    #[must_use]
    pub fn num_inputs(&self) -> usize {
        self.input_indices.len()
    }

    #[must_use]
    pub fn num_outputs(&self) -> usize {
        self.output_indices.len()
    }

    /// Softmax probabilities over the classification outputs whose event
    /// passes `available`, as `(event identifier, probability)` pairs.
    #[must_use]
    pub fn event_probabilities<'a>(
        &'a self,
        outputs: &[f64],
        available: impl Fn(&str) -> bool,
    ) -> Vec<(&'a str, f64)> {
        let (events, logits): (Vec<&str>, Vec<f64>) = self
            .output_types
            .iter()
            .zip(outputs)
            .filter_map(|(kind, &value)| match kind {
                NodeType::Classification { event } if available(event) => {
                    Some((event.as_str(), value))
                }
                _ => None,
            })
            .unzip();
        events.into_iter().zip(softmax(&logits)).collect()
    }

    /// Regression output for parameter `parameter` of `event`, if present.
    #[must_use]
    pub fn regression_output(&self, outputs: &[f64], event: &str, parameter: usize) -> Option<f64> {
        self.output_types
            .iter()
            .zip(outputs)
            .find_map(|(kind, &value)| match kind {
                NodeType::Regression {
                    event: e,
                    parameter: p,
                } if e == event && *p == parameter => Some(value),
                _ => None,
            })
    }
}

/// Group `(target, source, weight, innovation)` edges into incoming CSR
/// arrays, summing in innovation order for bit-identical results.
fn build_incoming(
    node_count: usize,
    mut edges: Vec<(usize, usize, f64, u64)>,
) -> (Vec<usize>, Vec<usize>, Vec<f64>) {
    edges.sort_by_key(|&(to, _, _, innovation)| (to, innovation));

    let mut offsets = vec![0usize; node_count + 1];
    for &(to, _, _, _) in &edges {
        offsets[to + 1] += 1;
    }
    for i in 0..node_count {
        offsets[i + 1] += offsets[i];
    }

    let sources = edges.iter().map(|&(_, from, _, _)| from).collect();
    let weights = edges.iter().map(|&(_, _, weight, _)| weight).collect();
    (offsets, sources, weights)
}
