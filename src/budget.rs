use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// How much compute one decision may spend. Checked once per completed iteration.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Budget {
    /// Wall-clock time for the whole search.
    Time { millis: u64 },
    /// Number of select/expand/rollout/backpropagate iterations.
    Iterations { count: u32 },
    /// Number of forward-model calls, charged at the rollout depth per iteration.
    ForwardModelCalls { count: u64 },
}

impl Default for Budget {
    fn default() -> Self {
        Budget::Iterations { count: 200 }
    }
}

impl Budget {
    /// The numeric limit, whatever its unit.
    pub fn limit(&self) -> u64 {
        match *self {
            Budget::Time { millis } => millis,
            Budget::Iterations { count } => count as u64,
            Budget::ForwardModelCalls { count } => count,
        }
    }
}

/// Tracks spending against a [`Budget`] during one search call.
#[derive(Debug, Clone)]
pub struct BudgetTracker {
    budget: Budget,
    rollout_depth: u64,
    margin: Duration,
    started: Instant,
    iterations: u32,
    forward_model_calls: u64,
}

impl BudgetTracker {
    pub fn start(budget: Budget, rollout_depth: usize, margin: Duration) -> Self {
        Self {
            budget,
            rollout_depth: rollout_depth as u64,
            margin,
            started: Instant::now(),
            iterations: 0,
            forward_model_calls: 0,
        }
    }

    /// Records one completed iteration.
    pub fn record_iteration(&mut self) {
        self.iterations += 1;
        self.forward_model_calls += self.rollout_depth;
    }

    /// Whether another iteration would overrun the budget.
    pub fn is_exhausted(&self) -> bool {
        match self.budget {
            Budget::Time { millis } => {
                let remaining = Duration::from_millis(millis).saturating_sub(self.started.elapsed());
                remaining <= self.margin
            }
            Budget::Iterations { count } => self.iterations >= count,
            Budget::ForwardModelCalls { count } => self.forward_model_calls + self.rollout_depth > count,
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn forward_model_calls(&self) -> u64 {
        self.forward_model_calls
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
