use crate::error::OreveilError;
use crate::types::Result;
use rand::Rng;

/// Relative weight spread under which alias construction is skipped and the
/// draw becomes uniform. Avoids floating-point instability at equal weights.
const UNIFORM_EPSILON: f64 = 1e-9;

/// O(1) weighted random draw over block-state ids, built with the alias
/// method. Immutable after construction and safe for concurrent sampling.
#[derive(Debug, Clone)]
pub struct WeightedRandom {
    values: Vec<u32>,
    /// `None` when all weights are (near-)equal and sampling is uniform.
    alias: Option<AliasTable>,
}

#[derive(Debug, Clone)]
struct AliasTable {
    probability: Vec<f64>,
    alias: Vec<usize>,
}

impl WeightedRandom {
    pub fn builder() -> WeightedRandomBuilder {
        WeightedRandomBuilder::new()
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> u32 {
        let index = rng.gen_range(0..self.values.len());
        match &self.alias {
            None => self.values[index],
            Some(table) => {
                if rng.gen::<f64>() < table.probability[index] {
                    self.values[index]
                } else {
                    self.values[table.alias[index]]
                }
            }
        }
    }
}

/// Collects `(value, weight)` pairs; duplicate values merge by summing their
/// weights.
#[derive(Debug, Default)]
pub struct WeightedRandomBuilder {
    values: Vec<u32>,
    weights: Vec<f64>,
}

impl WeightedRandomBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: u32, weight: f64) -> Result<&mut Self> {
        if !weight.is_finite() || weight <= 0.0 {
            return Err(OreveilError::ConfigError(format!(
                "Weight for id {} must be a positive finite number, got {}",
                value, weight
            )));
        }
        match self.values.iter().position(|&v| v == value) {
            Some(index) => self.weights[index] += weight,
            None => {
                self.values.push(value);
                self.weights.push(weight);
            }
        }
        Ok(self)
    }

    pub fn build(self) -> Result<WeightedRandom> {
        if self.values.is_empty() {
            return Err(OreveilError::ConfigError(
                "Weighted random requires at least one entry".to_owned(),
            ));
        }

        let max = self.weights.iter().cloned().fold(f64::MIN, f64::max);
        let min = self.weights.iter().cloned().fold(f64::MAX, f64::min);
        if (max - min) / max < UNIFORM_EPSILON {
            return Ok(WeightedRandom {
                values: self.values,
                alias: None,
            });
        }

        // Vose's alias method.
        let n = self.weights.len();
        let total: f64 = self.weights.iter().sum();
        let mut scaled: Vec<f64> = self
            .weights
            .iter()
            .map(|weight| weight * n as f64 / total)
            .collect();

        let mut small: Vec<usize> = (0..n).filter(|&i| scaled[i] < 1.0).collect();
        let mut large: Vec<usize> = (0..n).filter(|&i| scaled[i] >= 1.0).collect();
        let mut probability = vec![1.0f64; n];
        let mut alias: Vec<usize> = (0..n).collect();

        while let (Some(&small_index), Some(&large_index)) = (small.last(), large.last()) {
            small.pop();
            probability[small_index] = scaled[small_index];
            alias[small_index] = large_index;
            scaled[large_index] -= 1.0 - scaled[small_index];
            if scaled[large_index] < 1.0 {
                large.pop();
                small.push(large_index);
            }
        }
        // Whatever remains keeps probability 1 (floating-point leftovers).

        Ok(WeightedRandom {
            values: self.values,
            alias: Some(AliasTable { probability, alias }),
        })
    }
}

/// Per-height substitution: the first layer whose range contains `y` wins.
#[derive(Debug, Clone, Default)]
pub struct LayeredSampler {
    layers: Vec<SamplerLayer>,
}

#[derive(Debug, Clone)]
pub struct SamplerLayer {
    pub min_y: i32,
    pub max_y: i32,
    pub random: WeightedRandom,
}

impl LayeredSampler {
    pub fn new(layers: Vec<SamplerLayer>) -> Self {
        Self { layers }
    }

    pub fn sample_at<R: Rng>(&self, y: i32, rng: &mut R) -> Option<u32> {
        self.layers
            .iter()
            .find(|layer| y >= layer.min_y && y <= layer.max_y)
            .map(|layer| layer.random.sample(rng))
    }
}
