//! Gene types for NEAT networks.
//!
//! This module defines the building blocks of a [`NetworkChromosome`](crate::network::NetworkChromosome):
//! - [`NodeGene`]: a neuron, identified across networks by its `uid`
//! - [`ConnectionGene`]: a weighted edge, aligned across networks by its innovation number

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

use crate::activation::Activation;

new_key_type! {
    /// Arena key of a node within one network.
    ///
    /// Keys are local to a network; use [`NodeGene::uid`] to identify the
    /// same node across networks.
    pub struct NodeId;

    /// Arena key of a connection within one network.
    pub struct ConnectionId;
}

/// The role of a node in the network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    /// Receives one program feature.
    Input,
    /// Always outputs 1.0.
    Bias,
    /// Internal node added by mutation.
    Hidden,
    /// One output per selectable event; the event with the highest
    /// probability is sent.
    Classification { event: String },
    /// Supplies parameter `parameter` of `event`.
    Regression { event: String, parameter: usize },
}

impl NodeType {
    #[must_use]
    pub fn is_output(&self) -> bool {
        matches!(self, Self::Classification { .. } | Self::Regression { .. })
    }

    /// Whether this node's value is set from outside the network.
    #[must_use]
    pub fn is_source(&self) -> bool {
        matches!(self, Self::Input | Self::Bias)
    }
}

/// A neuron.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeGene {
    /// Identity shared by structurally equivalent nodes in different networks.
    pub uid: u32,
    pub node_type: NodeType,
    pub activation: Activation,
}

impl NodeGene {
    #[must_use]
    pub fn input(uid: u32) -> Self {
        Self {
            uid,
            node_type: NodeType::Input,
            activation: Activation::Identity,
        }
    }

    #[must_use]
    pub fn bias(uid: u32) -> Self {
        Self {
            uid,
            node_type: NodeType::Bias,
            activation: Activation::Identity,
        }
    }

    #[must_use]
    pub fn hidden(uid: u32, activation: Activation) -> Self {
        Self {
            uid,
            node_type: NodeType::Hidden,
            activation,
        }
    }

    /// Classification outputs are linear; probabilities come from a softmax
    /// over all of them.
    #[must_use]
    pub fn classification(uid: u32, event: impl Into<String>) -> Self {
        Self {
            uid,
            node_type: NodeType::Classification {
                event: event.into(),
            },
            activation: Activation::Identity,
        }
    }

    #[must_use]
    pub fn regression(uid: u32, event: impl Into<String>, parameter: usize) -> Self {
        Self {
            uid,
            node_type: NodeType::Regression {
                event: event.into(),
                parameter,
            },
            activation: Activation::Tanh,
        }
    }
}

/// A weighted link between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionGene {
    /// Historical marking; equal numbers denote the same structural
    /// innovation in different networks.
    pub innovation: u64,
    pub source: NodeId,
    pub target: NodeId,
    pub weight: f64,
    /// Disabled connections are skipped during activation but kept for crossover.
    pub enabled: bool,
    /// Recurrent connections read the source's activation from the previous step.
    pub recurrent: bool,
}

impl ConnectionGene {
    /// Create a new enabled, feed-forward connection.
    #[must_use]
    pub fn new(innovation: u64, source: NodeId, target: NodeId, weight: f64) -> Self {
        Self {
            innovation,
            source,
            target,
            weight,
            enabled: true,
            recurrent: false,
        }
    }
}
