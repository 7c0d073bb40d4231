//! Weighted sampling over a fixed key set, with a scheduled anneal toward uniform.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::random::RandomGenerator;

#[derive(Debug, Error, PartialEq)]
pub enum SamplerError {
    #[error("Cannot build a distribution over zero keys")]
    Empty,

    #[error("Anneal horizon must be positive")]
    ZeroHorizon,

    #[error("Weight {0} is not finite")]
    NonFinite(f64),
}

/// A probability distribution over keys, reweighted by softmax and annealed toward uniform.
///
/// Keys are kept in a `BTreeMap`, so sampling walks them in a fixed order and a seeded
/// generator always reproduces the same draws. Weights sum to one after every operation.
#[derive(Debug, Clone)]
pub struct ProbabilitySampler<K: Ord + Clone> {
    weights: BTreeMap<K, f64>,
    /// Per-key multiplier that reaches the uniform distribution in exactly `anneal_horizon` steps.
    decay: BTreeMap<K, f64>,
    anneal_horizon: usize,
    updates_done: usize,
}

impl<K: Ord + Clone> ProbabilitySampler<K> {
    /// Builds a sampler from raw (possibly negative) weights.
    pub fn new(raw_weights: BTreeMap<K, f64>, anneal_horizon: usize) -> Result<Self, SamplerError> {
        if anneal_horizon == 0 {
            return Err(SamplerError::ZeroHorizon);
        }
        let mut sampler = Self {
            weights: BTreeMap::new(),
            decay: BTreeMap::new(),
            anneal_horizon,
            updates_done: 0,
        };
        sampler.update_weights(raw_weights)?;
        Ok(sampler)
    }

    /// Builds a uniform sampler over `keys`.
    pub fn uniform<I: IntoIterator<Item = K>>(keys: I, anneal_horizon: usize) -> Result<Self, SamplerError> {
        Self::new(keys.into_iter().map(|k| (k, 1.0)).collect(), anneal_horizon)
    }

    /// Replaces the distribution with the softmax of `raw_weights` and restarts the anneal
    /// from it.
    pub fn update_weights(&mut self, raw_weights: BTreeMap<K, f64>) -> Result<(), SamplerError> {
        if raw_weights.is_empty() {
            return Err(SamplerError::Empty);
        }
        if let Some(bad) = raw_weights.values().find(|w| !w.is_finite()) {
            return Err(SamplerError::NonFinite(*bad));
        }

        let max = raw_weights.values().copied().fold(f64::NEG_INFINITY, f64::max);
        let exps: BTreeMap<K, f64> = raw_weights
            .into_iter()
            .map(|(k, w)| (k, (w - max).exp()))
            .collect();
        let sum: f64 = exps.values().sum();
        self.weights = exps.into_iter().map(|(k, w)| (k, w / sum)).collect();

        // Geometric interpolation in log space toward 1/n.
        let uniform = 1.0 / self.weights.len() as f64;
        let horizon = self.anneal_horizon as f64;
        self.decay = self
            .weights
            .iter()
            .map(|(k, &w)| (k.clone(), ((uniform.ln() - w.max(f64::MIN_POSITIVE).ln()) / horizon).exp()))
            .collect();
        self.updates_done = 0;
        Ok(())
    }

    /// Moves one step toward the uniform distribution.
    ///
    /// Returns `true` once the distribution is uniform, which happens on the
    /// `anneal_horizon`-th call; further calls change nothing.
    pub fn advance_toward_uniform(&mut self) -> bool {
        if self.updates_done >= self.anneal_horizon {
            return true;
        }
        self.updates_done += 1;

        if self.updates_done == self.anneal_horizon {
            let uniform = 1.0 / self.weights.len() as f64;
            self.weights.values_mut().for_each(|w| *w = uniform);
            return true;
        }

        for (key, weight) in self.weights.iter_mut() {
            *weight *= self.decay.get(key).copied().unwrap_or(1.0);
        }
        let sum: f64 = self.weights.values().sum();
        self.weights.values_mut().for_each(|w| *w /= sum);
        false
    }

    /// Draws a key from the whole distribution.
    pub fn sample<R: RandomGenerator>(&self, random: &mut R) -> Option<K> {
        self.sample_masked(random, |_| true)
    }

    /// Draws a key among those `allowed` accepts, proportionally to their weights.
    ///
    /// Returns `None` when no key is allowed.
    pub fn sample_masked<R, F>(&self, random: &mut R, allowed: F) -> Option<K>
    where
        R: RandomGenerator,
        F: Fn(&K) -> bool,
    {
        let permitted: Vec<(&K, f64)> = self
            .weights
            .iter()
            .filter(|&(k, _)| allowed(k))
            .map(|(k, &w)| (k, w))
            .collect();
        let total: f64 = permitted.iter().map(|(_, w)| w).sum();
        let draw = random.next_f64() * total;

        let mut range_max = 0.0;
        for (key, weight) in &permitted {
            range_max += weight;
            if draw < range_max {
                return Some((*key).clone());
            }
        }
        // Rounding can leave the draw just past the last range.
        permitted.last().map(|(k, _)| (*k).clone())
    }

    pub fn weight(&self, key: &K) -> Option<f64> {
        self.weights.get(key).copied()
    }

    pub fn weights(&self) -> &BTreeMap<K, f64> {
        &self.weights
    }

    pub fn anneal_horizon(&self) -> usize {
        self.anneal_horizon
    }

    pub fn updates_done(&self) -> usize {
        self.updates_done
    }

    pub fn is_uniform(&self) -> bool {
        self.updates_done >= self.anneal_horizon
    }
}
