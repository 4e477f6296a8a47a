//! Genetic operators for the list-based chromosomes, parent selection and
//! local search.

pub mod crossover;
pub mod local_search;
pub mod mutation;
pub mod selection;
