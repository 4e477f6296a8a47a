//! Random minimal networks sized for the program-under-test.

use log::warn;

use crate::chromosome::ChromosomeGenerator;
use crate::event::Event;
use crate::extractor::EventExtractor;
use crate::innovation::InnovationTracker;
use crate::neat::properties::NeatProperties;
use crate::network::NetworkChromosome;
use crate::program::ProgramUnderTest;
use crate::randomness::Randomness;

/// Generates minimal networks with the bias and every input connected to
/// every output.
///
/// All networks of one generator share node uids and innovation numbers,
/// so they align gene by gene in crossover.
#[derive(Debug, Clone)]
pub struct NetworkGenerator {
    num_inputs: usize,
    events: Vec<Event>,
    /// Chance that each initial connection starts enabled.
    pub initial_connection_rate: f64,
    pub weight_range: f64,
    tracker: InnovationTracker,
}

impl NetworkGenerator {
    #[must_use]
    pub fn new(num_inputs: usize, events: Vec<Event>, properties: &NeatProperties) -> Self {
        Self {
            num_inputs,
            events,
            initial_connection_rate: properties.initial_connection_rate,
            weight_range: properties.mutation.weight_range,
            tracker: InnovationTracker::new(),
        }
    }

    /// Size inputs by the program's feature vector and outputs by a static
    /// scan of its events. A failed scan leaves a wait-only output layer.
    pub fn from_program<P: ProgramUnderTest + ?Sized>(
        program: &P,
        extractor: &EventExtractor,
        properties: &NeatProperties,
        rng: &mut Randomness,
    ) -> Self {
        let events = extractor
            .extract_static_events(program.state(), rng)
            .unwrap_or_else(|err| {
                warn!("{err}; networks will only be able to wait");
                vec![Event::wait()]
            });
        Self::new(program.input_features().len(), events, properties)
    }

    #[must_use]
    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    /// Events with a classification output, in output order.
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }
}

impl ChromosomeGenerator<NetworkChromosome> for NetworkGenerator {
    fn generate(&mut self, rng: &mut Randomness) -> NetworkChromosome {
        let mut network = NetworkChromosome::minimal(self.num_inputs, &self.events);
        network.connect_sources_to_outputs(
            &mut self.tracker,
            self.initial_connection_rate,
            self.weight_range,
            rng,
        );
        network
    }
}
