// Temperature sampling over a predicted next-symbol distribution.
//
// The probabilities are reweighted as `exp(ln p / T)` and renormalized, then
// one index is drawn from the result with a single `next_f64` from the
// injected generator. Low temperatures concentrate mass on the mode; high
// temperatures flatten toward uniform over the entries with non-zero
// probability. Entries with probability zero can never be drawn at any
// temperature.
//
// Log-probabilities are taken relative to the largest one before dividing by
// the temperature. The mode then always weighs exactly 1 and every other
// entry weighs at most 1, however small the temperature.

use crate::error::{MelodyError, Result};
use melody_prng::MelodyRng;

/// Stateless sampling strategy; the randomness lives in the caller's rng.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureSampler {
    temperature: f64,
}

impl TemperatureSampler {
    /// Fails unless `temperature` is positive.
    pub fn new(temperature: f64) -> Result<Self> {
        if temperature.is_nan() || temperature <= 0.0 {
            return Err(MelodyError::invalid_parameter(
                "temperature",
                format!("must be positive, got {temperature}"),
            ));
        }
        Ok(Self { temperature })
    }

    /// Reweighted, normalized distribution for `probabilities`.
    pub fn reweight(&self, probabilities: &[f64]) -> Result<Vec<f64>> {
        validate(probabilities)?;
        let ln_max = probabilities
            .iter()
            .filter(|&&p| p > 0.0)
            .map(|p| p.ln())
            .fold(f64::NEG_INFINITY, f64::max);
        let weights: Vec<f64> = probabilities
            .iter()
            .map(|&p| {
                if p > 0.0 {
                    ((p.ln() - ln_max) / self.temperature).exp()
                } else {
                    0.0
                }
            })
            .collect();
        let total: f64 = weights.iter().sum();
        Ok(weights.into_iter().map(|w| w / total).collect())
    }

    /// Draw one index from `probabilities` at this temperature.
    pub fn choose(&self, probabilities: &[f64], rng: &mut MelodyRng) -> Result<usize> {
        let weights = self.reweight(probabilities)?;
        Ok(draw(&weights, rng.next_f64()))
    }
}

/// Free-function form of [`TemperatureSampler::choose`].
pub fn choose(probabilities: &[f64], temperature: f64, rng: &mut MelodyRng) -> Result<usize> {
    TemperatureSampler::new(temperature)?.choose(probabilities, rng)
}

fn validate(probabilities: &[f64]) -> Result<()> {
    if probabilities.is_empty() {
        return Err(MelodyError::InvalidDistribution("empty".into()));
    }
    if let Some((i, p)) = probabilities
        .iter()
        .enumerate()
        .find(|&(_, &p)| !p.is_finite() || p < 0.0)
    {
        return Err(MelodyError::InvalidDistribution(format!(
            "entry {i} is {p}"
        )));
    }
    if probabilities.iter().sum::<f64>() <= 0.0 {
        return Err(MelodyError::InvalidDistribution("sums to zero".into()));
    }
    Ok(())
}

/// Map a uniform draw in [0, 1) to an index by cumulative weight.
fn draw(weights: &[f64], unit: f64) -> usize {
    let mut cumulative = 0.0;
    for (i, &w) in weights.iter().enumerate() {
        cumulative += w;
        if w > 0.0 && unit < cumulative {
            return i;
        }
    }
    // Rounding left the cumulative sum just below `unit`.
    weights.iter().rposition(|&w| w > 0.0).unwrap_or(0)
}
