//! Historical-marking crossover of two networks.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::error;

use crate::chromosome::Chromosome;
use crate::gene::{ConnectionGene, NodeId};
use crate::neat::properties::NeatCrossoverRates;
use crate::network::NetworkChromosome;
use crate::randomness::Randomness;

/// Chance that a gene disabled in either parent stays disabled in the child.
const DISABLE_INHERITANCE: f64 = 0.75;

#[derive(Debug, Clone)]
pub struct NeatCrossover {
    rates: NeatCrossoverRates,
}

impl NeatCrossover {
    #[must_use]
    pub fn new(rates: NeatCrossoverRates) -> Self {
        Self { rates }
    }

    #[must_use]
    pub fn rates(&self) -> &NeatCrossoverRates {
        &self.rates
    }

    /// Recombine two networks into one unevaluated child.
    ///
    /// Genes are aligned by innovation number. Matching genes come from a
    /// random parent (or average their weights); disjoint and excess genes
    /// come from the fitter parent, or from either with equal chance when
    /// both are equally fit. The child is never empty: a degenerate result
    /// is replaced by a copy of the fitter parent.
    #[must_use]
    pub fn apply(
        &self,
        first: &NetworkChromosome,
        second: &NetworkChromosome,
        rng: &mut Randomness,
    ) -> NetworkChromosome {
        let (fitter, other) = if first.network_fitness >= second.network_fitness {
            (first, second)
        } else {
            (second, first)
        };
        let equally_fit = first.network_fitness == second.network_fitness;

        let fitter_genes = genes_by_innovation(fitter);
        let other_genes = genes_by_innovation(other);
        let innovations: BTreeSet<u64> = fitter_genes
            .keys()
            .chain(other_genes.keys())
            .copied()
            .collect();

        let mut child = fitter.clone_structure();
        child.connections.clear();
        let mut uid_to_node: HashMap<u32, NodeId> =
            child.nodes.iter().map(|(id, node)| (node.uid, id)).collect();

        for innovation in innovations {
            let inherited = match (fitter_genes.get(&innovation), other_genes.get(&innovation)) {
                (Some(&a), Some(&b)) => {
                    let (chosen, owner) = if rng.coin() { (a, fitter) } else { (b, other) };
                    let mut gene = chosen.clone();
                    if rng.chance(self.rates.weight_average_rate) {
                        gene.weight = (a.weight + b.weight) / 2.0;
                    }
                    gene.enabled = if !a.enabled || !b.enabled {
                        !rng.chance(DISABLE_INHERITANCE)
                    } else {
                        true
                    };
                    Some((gene, owner))
                }
                (Some(&a), None) if !equally_fit || rng.coin() => Some((a.clone(), fitter)),
                (None, Some(&b)) if equally_fit && rng.coin() => Some((b.clone(), other)),
                _ => None,
            };
            let Some((mut gene, owner)) = inherited else {
                continue;
            };
            let (Some(source), Some(target)) = (
                import_node(&mut child, &mut uid_to_node, owner, gene.source),
                import_node(&mut child, &mut uid_to_node, owner, gene.target),
            ) else {
                continue;
            };
            gene.source = source;
            gene.target = target;
            child.connections.insert(gene);
        }

        if child.connections.is_empty() {
            error!(
                "crossover of {} and {} produced an empty network; cloning the fitter parent",
                first.id(),
                second.id()
            );
            return fitter.clone_structure();
        }
        // Genes from different parents may close new cycles
        child.mark_recurrent_cycles();
        child
    }
}

fn genes_by_innovation(network: &NetworkChromosome) -> BTreeMap<u64, &ConnectionGene> {
    network
        .connections
        .values()
        .map(|c| (c.innovation, c))
        .collect()
}

/// The child's node for `node` of `owner`, copying the gene over if the
/// child has no node with that uid yet.
fn import_node(
    child: &mut NetworkChromosome,
    uid_to_node: &mut HashMap<u32, NodeId>,
    owner: &NetworkChromosome,
    node: NodeId,
) -> Option<NodeId> {
    let gene = owner.nodes.get(node)?;
    if let Some(&existing) = uid_to_node.get(&gene.uid) {
        return Some(existing);
    }
    let id = child.nodes.insert(gene.clone());
    uid_to_node.insert(gene.uid, id);
    Some(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::Activation;
    use crate::event::Event;
    use crate::innovation::InnovationTracker;

    fn test_rng() -> Randomness {
        Randomness::new(42)
    }

    /// A 5-connection parent and a 7-connection parent that share the
    /// first five innovations except for one split.
    fn parents() -> (NetworkChromosome, NetworkChromosome) {
        let mut rng = test_rng();
        let mut tracker = InnovationTracker::new();
        let mut small = NetworkChromosome::minimal(4, &[Event::ClickStage]);
        small.connect_sources_to_outputs(&mut tracker, 1.0, 1.0, &mut rng);

        let mut large = small.clone_structure();
        let split = large.connections.keys().next().unwrap();
        large.add_node(split, Activation::Sigmoid, &mut tracker).unwrap();
        assert_eq!(small.connections.len(), 5);
        assert_eq!(large.connections.len(), 7);
        (small, large)
    }

    #[test]
    fn test_child_takes_structure_of_fitter_parent() {
        let crossover = NeatCrossover::new(NeatCrossoverRates::default());
        let mut rng = test_rng();

        let (mut small, mut large) = parents();
        small.network_fitness = 10.0;
        large.network_fitness = 1.0;
        for _ in 0..20 {
            let child = crossover.apply(&small, &large, &mut rng);
            assert_eq!(child.connections.len(), 5);
            assert!(child.is_consistent());
        }

        small.network_fitness = 1.0;
        large.network_fitness = 10.0;
        for _ in 0..20 {
            let child = crossover.apply(&small, &large, &mut rng);
            assert_eq!(child.connections.len(), 7);
            assert_eq!(child.hidden_ids().len(), 1);
            assert!(child.is_consistent());
        }
    }

    #[test]
    fn test_equal_fitness_stays_within_bounds() {
        let crossover = NeatCrossover::new(NeatCrossoverRates::default());
        let mut rng = test_rng();
        let (small, large) = parents();
        for _ in 0..50 {
            let child = crossover.apply(&small, &large, &mut rng);
            assert!((4..=7).contains(&child.connections.len()));
            assert!(child.is_consistent());
        }
    }

    #[test]
    fn test_empty_parents_fall_back_to_clone() {
        let crossover = NeatCrossover::new(NeatCrossoverRates::default());
        let mut rng = test_rng();
        let mut fitter = NetworkChromosome::minimal(2, &[Event::wait()]);
        fitter.network_fitness = 3.0;
        let other = NetworkChromosome::minimal(2, &[Event::wait()]);

        let child = crossover.apply(&other, &fitter, &mut rng);
        assert_eq!(child.nodes.len(), fitter.nodes.len());
        assert_ne!(child.id(), fitter.id());
        assert!(!child.evaluation().is_evaluated());
    }
}
