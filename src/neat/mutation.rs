//! Structural and weight mutation of networks.
//!
//! Each operator is gated by its own probability and evaluated
//! independently, so several can fire on one call.

use crate::gene::{ConnectionId, NodeId};
use crate::innovation::InnovationTracker;
use crate::neat::properties::NeatMutationRates;
use crate::network::NetworkChromosome;
use crate::randomness::Randomness;

/// Probability that a connection created by mutation starts enabled.
const NEW_CONNECTION_ENABLED: f64 = 0.8;

#[derive(Debug, Clone)]
pub struct NeatMutation {
    rates: NeatMutationRates,
}

impl NeatMutation {
    #[must_use]
    pub fn new(rates: NeatMutationRates) -> Self {
        Self { rates }
    }

    #[must_use]
    pub fn rates(&self) -> &NeatMutationRates {
        &self.rates
    }

    /// A mutated, unevaluated copy of `network`.
    #[must_use]
    pub fn apply(
        &self,
        network: &NetworkChromosome,
        tracker: &mut InnovationTracker,
        rng: &mut Randomness,
    ) -> NetworkChromosome {
        let mut child = network.clone_structure();
        if rng.chance(self.rates.mutate_weights) {
            self.mutate_weights(&mut child, rng);
        }
        if rng.chance(self.rates.mutation_add_connection) {
            self.mutate_add_connection(&mut child, tracker, rng);
        }
        if rng.chance(self.rates.mutate_toggle_enable_connection) {
            self.mutate_toggle_enable_connection(&mut child, rng);
        }
        if rng.chance(self.rates.mutate_enable_connection) {
            self.mutate_enable_connection(&mut child, rng);
        }
        if rng.chance(self.rates.mutation_add_node) {
            self.mutate_add_node(&mut child, tracker, rng);
        }
        // Re-enabled connections may close cycles
        child.mark_recurrent_cycles();
        child
    }

    /// Uniform additive noise within `±perturbation_power` on every weight,
    /// clipped to ten times the initial weight range.
    pub fn mutate_weights(&self, network: &mut NetworkChromosome, rng: &mut Randomness) {
        let power = self.rates.perturbation_power;
        let limit = self.rates.weight_range * 10.0;
        for connection in network.connections.values_mut() {
            connection.weight += rng.next_double_between(-power, power);
            connection.weight = connection.weight.clamp(-limit, limit);
        }
    }

    /// Try up to `add_connection_tries` random node pairs. Returns whether a
    /// connection was added.
    pub fn mutate_add_connection(
        &self,
        network: &mut NetworkChromosome,
        tracker: &mut InnovationTracker,
        rng: &mut Randomness,
    ) -> bool {
        let sources: Vec<NodeId> = network
            .nodes
            .iter()
            .filter(|(_, n)| !n.node_type.is_output())
            .map(|(id, _)| id)
            .collect();
        let targets: Vec<NodeId> = network
            .nodes
            .iter()
            .filter(|(_, n)| !n.node_type.is_source())
            .map(|(id, _)| id)
            .collect();
        if sources.is_empty() || targets.is_empty() {
            return false;
        }

        let recurrent = rng.chance(self.rates.recurrent_connection);
        let range = self.rates.weight_range;
        for _ in 0..self.rates.add_connection_tries {
            let source = sources[rng.next_index(sources.len())];
            let target = targets[rng.next_index(targets.len())];
            let weight = rng.next_double_between(-range, range);
            if let Some(id) = network.add_connection(source, target, weight, recurrent, tracker) {
                network.connections[id].enabled = rng.chance(NEW_CONNECTION_ENABLED);
                return true;
            }
        }
        false
    }

    /// Flip the enabled state of `toggle_enable_connection_times` random
    /// connections.
    pub fn mutate_toggle_enable_connection(&self, network: &mut NetworkChromosome, rng: &mut Randomness) {
        let ids: Vec<ConnectionId> = network.connections.keys().collect();
        if ids.is_empty() {
            return;
        }
        for _ in 0..self.rates.toggle_enable_connection_times {
            let id = ids[rng.next_index(ids.len())];
            if let Some(connection) = network.connections.get_mut(id) {
                connection.enabled = !connection.enabled;
            }
        }
    }

    /// Re-enable one random disabled connection.
    pub fn mutate_enable_connection(&self, network: &mut NetworkChromosome, rng: &mut Randomness) {
        let disabled: Vec<ConnectionId> = network
            .connections
            .iter()
            .filter(|(_, c)| !c.enabled)
            .map(|(id, _)| id)
            .collect();
        if let Some(&id) = rng.pick(&disabled) {
            network.connections[id].enabled = true;
        }
    }

    /// Split a random enabled feed-forward connection.
    pub fn mutate_add_node(
        &self,
        network: &mut NetworkChromosome,
        tracker: &mut InnovationTracker,
        rng: &mut Randomness,
    ) -> bool {
        let candidates: Vec<ConnectionId> = network
            .connections
            .iter()
            .filter(|(_, c)| c.enabled && !c.recurrent)
            .map(|(id, _)| id)
            .collect();
        match rng.pick(&candidates) {
            Some(&id) => network
                .add_node(id, self.rates.hidden_activation, tracker)
                .is_some(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::NetworkEvaluator;
    use crate::event::Event;

    fn test_rng() -> Randomness {
        Randomness::new(42)
    }

    fn network(tracker: &mut InnovationTracker, rng: &mut Randomness) -> NetworkChromosome {
        let events = [
            Event::wait(),
            Event::KeyPress {
                key: "up arrow".into(),
                steps: 1,
            },
            Event::MouseMove { x: 0.0, y: 0.0 },
        ];
        let mut network = NetworkChromosome::minimal(4, &events);
        network.connect_sources_to_outputs(tracker, 0.6, 1.0, rng);
        network
    }

    fn always() -> NeatMutationRates {
        NeatMutationRates {
            mutate_weights: 1.0,
            mutation_add_connection: 1.0,
            recurrent_connection: 0.5,
            mutate_toggle_enable_connection: 1.0,
            mutate_enable_connection: 1.0,
            mutation_add_node: 1.0,
            ..NeatMutationRates::default()
        }
    }

    #[test]
    fn test_mutation_returns_fresh_copy() {
        let mut rng = test_rng();
        let mut tracker = InnovationTracker::new();
        let parent = network(&mut tracker, &mut rng);
        let mutation = NeatMutation::new(always());
        let child = mutation.apply(&parent, &mut tracker, &mut rng);

        use crate::chromosome::Chromosome;
        assert_ne!(child.id(), parent.id());
        assert!(!child.evaluation().is_evaluated());
        assert!(child.nodes.len() > parent.nodes.len());
    }

    #[test]
    fn test_repeated_mutation_keeps_networks_valid() {
        let mut rng = test_rng();
        let mut tracker = InnovationTracker::new();
        let mutation = NeatMutation::new(always());
        let mut current = network(&mut tracker, &mut rng);

        for generation in 0..60 {
            if generation % 10 == 0 {
                tracker.new_generation();
            }
            current = mutation.apply(&current, &mut tracker, &mut rng);
            assert!(current.is_consistent());
            let mut evaluator = NetworkEvaluator::try_new(&current).unwrap();
            let outputs = evaluator.activate(&[0.1, 0.2, 0.3, 0.4]);
            assert!(outputs.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_default_weight_perturbation_is_within_one() {
        let mut rng = test_rng();
        let mut tracker = InnovationTracker::new();
        let mut network = network(&mut tracker, &mut rng);
        let mutation = NeatMutation::new(NeatMutationRates::default());
        let before: Vec<(ConnectionId, f64)> = network
            .connections
            .iter()
            .map(|(id, c)| (id, c.weight))
            .collect();

        mutation.mutate_weights(&mut network, &mut rng);
        for (id, weight) in before {
            let delta = (network.connections[id].weight - weight).abs();
            assert!(delta <= 1.0, "weight moved by {delta}");
        }
    }

    #[test]
    fn test_weights_are_clipped() {
        let mut rng = test_rng();
        let mut tracker = InnovationTracker::new();
        let mut network = network(&mut tracker, &mut rng);
        let mutation = NeatMutation::new(NeatMutationRates {
            perturbation_power: 100.0,
            ..NeatMutationRates::default()
        });
        for _ in 0..10 {
            mutation.mutate_weights(&mut network, &mut rng);
        }
        assert!(network.connections.values().all(|c| c.weight.abs() <= 10.0));
    }

    #[test]
    fn test_add_node_skips_recurrent_connections() {
        let mut rng = test_rng();
        let mut tracker = InnovationTracker::new();
        let mut network = network(&mut tracker, &mut rng);
        for connection in network.connections.values_mut() {
            connection.recurrent = true;
        }
        let mutation = NeatMutation::new(always());
        assert!(!mutation.mutate_add_node(&mut network, &mut tracker, &mut rng));
    }
}
