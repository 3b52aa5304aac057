//! Walker's alias method for O(1) draws from a fixed discrete distribution.
//!
//! Each bucket `i` keeps an acceptance probability `prob[i]` and a fallback
//! `alias[i]`. A draw picks a bucket uniformly, then keeps it with probability
//! `prob[i]` or takes its alias otherwise. Construction is O(n).

use rand::Rng;

use crate::constants::alias::UNDERFULL_EPSILON;
use crate::errors::SamplerError;
use crate::types::ValueId;

#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    prob: f64,
    alias: ValueId,
}

/// Alias table over `0..len()`.
#[derive(Debug, Clone)]
pub struct AliasTable {
    buckets: Vec<Bucket>,
}

impl AliasTable {
    /// Build from non-negative weights (any scale).
    pub fn new(weights: &[f64]) -> Result<Self, SamplerError> {
        let n = weights.len();
        if n == 0 {
            return Err(SamplerError::Configuration(
                "alias table requires at least one weight".to_string(),
            ));
        }
        if n > ValueId::MAX as usize {
            return Err(SamplerError::Configuration(format!(
                "alias table of {n} entries exceeds the index range"
            )));
        }
        let mut sum = 0.0f64;
        for (i, &w) in weights.iter().enumerate() {
            if !w.is_finite() || w.is_sign_negative() {
                return Err(SamplerError::Configuration(format!(
                    "alias weight {i} must be finite and non-negative, got {w}"
                )));
            }
            sum += w;
        }
        if !sum.is_finite() || sum == 0.0 {
            return Err(SamplerError::Configuration(
                "alias weights must have a positive finite sum".to_string(),
            ));
        }

        // Scale so the average bucket holds exactly 1.
        let mut scaled: Vec<f64> = weights.iter().map(|&w| w * n as f64 / sum).collect();
        let mut buckets: Vec<Bucket> = (0..n)
            .map(|i| Bucket {
                prob: 0.0,
                alias: i as ValueId,
            })
            .collect();

        let mut small: Vec<usize> = Vec::with_capacity(n);
        let mut large: Vec<usize> = Vec::with_capacity(n);
        for (i, &p) in scaled.iter().enumerate() {
            if p < 1.0 {
                small.push(i);
            } else {
                large.push(i);
            }
        }

        while let (Some(&s), Some(&l)) = (small.last(), large.last()) {
            small.pop();
            large.pop();
            buckets[s].prob = scaled[s];
            buckets[s].alias = l as ValueId;
            scaled[l] = (scaled[l] + scaled[s]) - 1.0;
            if scaled[l] < 1.0 - UNDERFULL_EPSILON {
                small.push(l);
            } else {
                large.push(l);
            }
        }

        // Leftovers are full up to rounding.
        for i in small.into_iter().chain(large) {
            buckets[i].prob = 1.0;
            buckets[i].alias = i as ValueId;
        }

        Ok(Self { buckets })
    }

    /// Build from integer counts with additive smoothing `alpha`.
    pub fn from_counts(counts: &[u64], alpha: f64) -> Result<Self, SamplerError> {
        let weights: Vec<f64> = counts.iter().map(|&c| c as f64 + alpha).collect();
        Self::new(&weights)
    }

    /// Draw one index.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ValueId {
        let i = rng.random_range(0..self.buckets.len());
        let u: f64 = rng.random();
        let bucket = self.buckets[i];
        if u < bucket.prob {
            i as ValueId
        } else {
            bucket.alias
        }
    }

    /// Draw `n` indices.
    pub fn sample_n<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<ValueId> {
        (0..n).map(|_| self.sample(rng)).collect()
    }

    /// Exact probability of drawing `index`, reconstructed from the buckets.
    pub fn probability(&self, index: ValueId) -> f64 {
        let n = self.buckets.len() as f64;
        let idx = index as usize;
        let mut mass = self.buckets.get(idx).map_or(0.0, |b| b.prob);
        for bucket in &self.buckets {
            if bucket.alias as usize == idx {
                mass += 1.0 - bucket.prob;
            }
        }
        mass / n
    }

    /// Number of values in the distribution.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Whether the table has no values.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
