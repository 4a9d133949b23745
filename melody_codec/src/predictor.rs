// The next-symbol predictor seam.
//
// The generator only needs "context ids in, one probability per vocabulary id
// out". Neural models, the in-tree Markov model (`markov.rs`), and test
// doubles all sit behind this trait. Implementations take `&self` so a
// trained model can serve several generation runs at once.

use crate::error::Result;

/// Next-symbol distribution given the ids generated so far.
pub trait Predictor {
    /// Probability of each vocabulary id following `context`.
    ///
    /// `context` holds at most the generator's `max_sequence_length` ids. The
    /// returned vector should have one entry per vocabulary id and sum to
    /// roughly 1; the sampler rejects anything it cannot draw from.
    fn predict(&self, context: &[usize]) -> Result<Vec<f64>>;
}

impl<F> Predictor for F
where
    F: Fn(&[usize]) -> Result<Vec<f64>>,
{
    fn predict(&self, context: &[usize]) -> Result<Vec<f64>> {
        self(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_predictors() {
        let fixed = |_: &[usize]| -> Result<Vec<f64>> { Ok(vec![0.25, 0.75]) };
        assert_eq!(fixed.predict(&[0, 1]).unwrap(), vec![0.25, 0.75]);

        let erased: &dyn Predictor = &fixed;
        assert_eq!(erased.predict(&[]).unwrap(), vec![0.25, 0.75]);
    }
}
