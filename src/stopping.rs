//! Stopping conditions and the per-run statistics they are evaluated on.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Counters of one search run, updated by the search loop.
#[derive(Debug, Clone, Default)]
pub struct SearchStatistics {
    pub iterations: usize,
    pub evaluations: usize,
    pub executed_events: usize,
    pub covered_objectives: usize,
    pub total_objectives: usize,
    pub best_fitness: Option<f64>,
    started: Option<Instant>,
    /// Wall-clock time from start until every objective was covered.
    pub time_to_full_coverage: Option<Duration>,
    /// Evaluations spent until every objective was covered.
    pub evaluations_to_full_coverage: Option<usize>,
}

impl SearchStatistics {
    /// Reset all counters and start the clock.
    pub fn start(&mut self, total_objectives: usize) {
        *self = Self {
            total_objectives,
            started: Some(Instant::now()),
            ..Self::default()
        };
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.map(|s| s.elapsed()).unwrap_or_default()
    }

    /// Record the current number of covered objectives.
    pub fn set_covered(&mut self, covered: usize) {
        self.covered_objectives = covered;
        if self.is_fully_covered() && self.time_to_full_coverage.is_none() {
            self.time_to_full_coverage = Some(self.elapsed());
            self.evaluations_to_full_coverage = Some(self.evaluations);
        }
    }

    #[must_use]
    pub fn is_fully_covered(&self) -> bool {
        self.total_objectives > 0 && self.covered_objectives >= self.total_objectives
    }

    /// Fraction of covered objectives.
    #[must_use]
    pub fn coverage(&self) -> f64 {
        if self.total_objectives == 0 {
            0.0
        } else {
            self.covered_objectives as f64 / self.total_objectives as f64
        }
    }
}

/// When to end a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", rename_all_fields = "kebab-case", tag = "type")]
pub enum StoppingCondition {
    /// After a number of iterations (generations).
    FixedIteration { iterations: usize },
    /// After a wall-clock budget.
    FixedTime {
        #[serde(with = "millis")]
        duration: Duration,
    },
    /// After a number of fitness evaluations.
    Evaluations { max_evaluations: usize },
    /// After a number of executed events.
    Events { max_events: usize },
    /// Once every objective is covered.
    Optimal,
    /// As soon as any of the nested conditions holds.
    OneOf { conditions: Vec<StoppingCondition> },
}

impl StoppingCondition {
    #[must_use]
    pub fn is_finished(&self, statistics: &SearchStatistics) -> bool {
        match self {
            Self::FixedIteration { iterations } => statistics.iterations >= *iterations,
            Self::FixedTime { duration } => statistics.elapsed() >= *duration,
            Self::Evaluations { max_evaluations } => statistics.evaluations >= *max_evaluations,
            Self::Events { max_events } => statistics.executed_events >= *max_events,
            Self::Optimal => statistics.is_fully_covered(),
            Self::OneOf { conditions } => conditions.iter().any(|c| c.is_finished(statistics)),
        }
    }

    /// Consumed fraction of the budget in `[0, 1]`.
    #[must_use]
    pub fn progress(&self, statistics: &SearchStatistics) -> f64 {
        let ratio = |done: f64, budget: f64| {
            if budget <= 0.0 {
                1.0
            } else {
                (done / budget).min(1.0)
            }
        };
        match self {
            Self::FixedIteration { iterations } => {
                ratio(statistics.iterations as f64, *iterations as f64)
            }
            Self::FixedTime { duration } => ratio(
                statistics.elapsed().as_secs_f64(),
                duration.as_secs_f64(),
            ),
            Self::Evaluations { max_evaluations } => {
                ratio(statistics.evaluations as f64, *max_evaluations as f64)
            }
            Self::Events { max_events } => {
                ratio(statistics.executed_events as f64, *max_events as f64)
            }
            Self::Optimal => statistics.coverage(),
            Self::OneOf { conditions } => conditions
                .iter()
                .map(|c| c.progress(statistics))
                .fold(0.0, f64::max),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_of_fires_on_first_condition() {
        let condition = StoppingCondition::OneOf {
            conditions: vec![
                StoppingCondition::FixedIteration { iterations: 20 },
                StoppingCondition::Optimal,
            ],
        };
        let mut statistics = SearchStatistics::default();
        statistics.start(5);
        statistics.iterations = 19;
        assert!(!condition.is_finished(&statistics));
        statistics.iterations = 20;
        assert!(condition.is_finished(&statistics));
    }

    #[test]
    fn test_optimal_requires_objectives() {
        let mut statistics = SearchStatistics::default();
        statistics.start(0);
        assert!(!StoppingCondition::Optimal.is_finished(&statistics));

        statistics.start(2);
        statistics.evaluations = 7;
        statistics.set_covered(2);
        assert!(StoppingCondition::Optimal.is_finished(&statistics));
        assert_eq!(statistics.evaluations_to_full_coverage, Some(7));
    }

    #[test]
    fn test_progress_is_bounded() {
        let mut statistics = SearchStatistics::default();
        statistics.start(1);
        statistics.executed_events = 500;
        let condition = StoppingCondition::Events { max_events: 100 };
        assert!((condition.progress(&statistics) - 1.0).abs() < f64::EPSILON);
        assert!(condition.is_finished(&statistics));
    }

    #[test]
    fn test_deserialize_tagged_condition() {
        let condition: StoppingCondition =
            serde_json::from_str(r#"{"type":"fixed-time","duration":1500}"#).unwrap();
        assert_eq!(
            condition,
            StoppingCondition::FixedTime {
                duration: Duration::from_millis(1500)
            }
        );
    }
}
