// Autoregressive melody generation.
//
// A run moves through three states:
//
//   Seeding     context := `sequence_length` boundary ids + the seed's ids
//   Generating  per step: predict on the last `max_sequence_length` ids,
//               sample one id at the configured temperature, append it to
//               the context, decode it. A boundary symbol stops the run;
//               anything else is appended to the melody.
//   Stopped     terminal, either on a boundary or after `num_steps` draws.
//
// The boundary prefix is the same run of markers the corpus places between
// pieces, so the predictor sees the "start of piece" context it was trained
// on. Each step depends on the previous draw, so steps are strictly
// sequential; a run owns its context buffer, and the generator itself only
// holds shared, read-only state (vocabulary and predictor).

use crate::error::{MelodyError, Result};
use crate::predictor::Predictor;
use crate::sampler::TemperatureSampler;
use crate::symbol::{Symbol, parse_symbols};
use crate::vocabulary::Vocabulary;
use melody_prng::MelodyRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Per-run knobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Upper bound on the number of sampled symbols.
    pub num_steps: usize,
    /// How many of the most recent ids the predictor sees.
    pub max_sequence_length: usize,
    /// Sampling temperature, strictly positive.
    pub temperature: f64,
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The predictor produced the boundary marker.
    Boundary,
    /// `num_steps` symbols were drawn without a boundary.
    StepBudget,
}

/// Where a `GenerationRun` is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    Seeding,
    Generating { step: usize },
    Stopped(StopReason),
}

/// Result of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Melody {
    /// Seed symbols followed by every generated non-boundary symbol.
    pub symbols: Vec<Symbol>,
    /// How the run ended.
    pub stop: StopReason,
    /// Number of symbols drawn, including a terminating boundary.
    pub steps: usize,
}

/// Drives a `Predictor` autoregressively over a fixed vocabulary.
pub struct MelodyGenerator<'v, P> {
    predictor: P,
    vocabulary: &'v Vocabulary,
    sequence_length: usize,
    boundary_id: usize,
}

impl<'v, P: Predictor> MelodyGenerator<'v, P> {
    /// `sequence_length` is the context length the predictor was trained on.
    pub fn new(predictor: P, vocabulary: &'v Vocabulary, sequence_length: usize) -> Result<Self> {
        if sequence_length == 0 {
            return Err(MelodyError::invalid_parameter(
                "sequence_length",
                "must be at least 1",
            ));
        }
        let boundary_id = vocabulary.encode(Symbol::Boundary)?;
        Ok(Self {
            predictor,
            vocabulary,
            sequence_length,
            boundary_id,
        })
    }

    /// Generate from a whitespace-separated seed such as `"67 _ _ 65 _"`.
    pub fn generate(
        &self,
        seed: &str,
        params: GenerationParams,
        rng: &mut MelodyRng,
    ) -> Result<Melody> {
        let seed = parse_symbols(seed)?;
        self.generate_from(&seed, params, rng)
    }

    /// Generate from already-parsed seed symbols.
    pub fn generate_from(
        &self,
        seed: &[Symbol],
        params: GenerationParams,
        rng: &mut MelodyRng,
    ) -> Result<Melody> {
        let mut run = self.start(seed, params)?;
        while !run.is_stopped() {
            run.advance(rng)?;
        }
        run.finish()
    }

    /// Begin a run in the `Seeding` state, to be driven with `advance`.
    pub fn start(&self, seed: &[Symbol], params: GenerationParams) -> Result<GenerationRun<'_, 'v, P>> {
        if params.num_steps == 0 {
            return Err(MelodyError::invalid_parameter("num_steps", "must be at least 1"));
        }
        if params.max_sequence_length == 0 || params.max_sequence_length > self.sequence_length {
            return Err(MelodyError::invalid_parameter(
                "max_sequence_length",
                format!(
                    "must be between 1 and the training sequence length {}, got {}",
                    self.sequence_length, params.max_sequence_length
                ),
            ));
        }
        let sampler = TemperatureSampler::new(params.temperature)?;
        Ok(GenerationRun {
            generator: self,
            params,
            sampler,
            state: GeneratorState::Seeding,
            seed: seed.to_vec(),
            context: Vec::new(),
            melody: Vec::new(),
            drawn: 0,
        })
    }
}

/// Mutable state of a single generation call.
pub struct GenerationRun<'g, 'v, P> {
    generator: &'g MelodyGenerator<'v, P>,
    params: GenerationParams,
    sampler: TemperatureSampler,
    state: GeneratorState,
    seed: Vec<Symbol>,
    context: Vec<usize>,
    melody: Vec<Symbol>,
    drawn: usize,
}

impl<P: Predictor> GenerationRun<'_, '_, P> {
    /// Current state.
    pub fn state(&self) -> GeneratorState {
        self.state
    }

    /// True once the run reached `Stopped`.
    pub fn is_stopped(&self) -> bool {
        matches!(self.state, GeneratorState::Stopped(_))
    }

    /// Every id seen so far: boundary prefix, seed, and draws.
    pub fn context(&self) -> &[usize] {
        &self.context
    }

    /// Perform one transition. A no-op once stopped.
    pub fn advance(&mut self, rng: &mut MelodyRng) -> Result<GeneratorState> {
        self.state = match self.state {
            GeneratorState::Seeding => self.seed_context()?,
            GeneratorState::Generating { step } => self.generate_step(step, rng)?,
            stopped @ GeneratorState::Stopped(_) => stopped,
        };
        Ok(self.state)
    }

    fn seed_context(&mut self) -> Result<GeneratorState> {
        let generator = self.generator;
        let seed_ids = generator.vocabulary.encode_all(&self.seed)?;
        self.context = std::iter::repeat_n(generator.boundary_id, generator.sequence_length)
            .chain(seed_ids)
            .collect();
        self.melody = std::mem::take(&mut self.seed);
        debug!(seed_len = self.melody.len(), "seeded generation context");
        Ok(GeneratorState::Generating { step: 0 })
    }

    fn generate_step(&mut self, step: usize, rng: &mut MelodyRng) -> Result<GeneratorState> {
        let generator = self.generator;
        let start = self.context.len().saturating_sub(self.params.max_sequence_length);
        let probabilities = generator.predictor.predict(&self.context[start..])?;
        let id = self.sampler.choose(&probabilities, rng)?;
        self.context.push(id);
        let symbol = generator.vocabulary.decode(id)?;
        let step = step + 1;
        self.drawn = step;
        debug!(step, id, %symbol, "sampled symbol");

        if symbol == Symbol::Boundary {
            info!(steps = step, melody_len = self.melody.len(), "generation hit boundary");
            return Ok(GeneratorState::Stopped(StopReason::Boundary));
        }
        self.melody.push(symbol);
        if step >= self.params.num_steps {
            info!(steps = step, melody_len = self.melody.len(), "generation used its step budget");
            return Ok(GeneratorState::Stopped(StopReason::StepBudget));
        }
        Ok(GeneratorState::Generating { step })
    }

    /// Consume a stopped run and return its melody.
    pub fn finish(self) -> Result<Melody> {
        let GeneratorState::Stopped(stop) = self.state else {
            return Err(MelodyError::invalid_parameter(
                "run",
                "finish called before the run stopped",
            ));
        };
        Ok(Melody {
            symbols: self.melody,
            stop,
            steps: self.drawn,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn vocab() -> Vocabulary {
        // ids: 60 -> 0, 62 -> 1, 64 -> 2, r -> 3, _ -> 4, / -> 5
        Vocabulary::build(&parse_symbols("60 62 64 r _ /").unwrap()).unwrap()
    }

    fn params(num_steps: usize) -> GenerationParams {
        GenerationParams {
            num_steps,
            max_sequence_length: 4,
            temperature: 1.0,
        }
    }

    fn one_hot(id: usize) -> impl Fn(&[usize]) -> Result<Vec<f64>> {
        move |_: &[usize]| {
            let mut p = vec![0.0; 6];
            p[id] = 1.0;
            Ok(p)
        }
    }

    #[test]
    fn boundary_prediction_stops_after_one_draw() {
        let vocab = vocab();
        let generator = MelodyGenerator::new(one_hot(5), &vocab, 4).unwrap();
        let mut rng = MelodyRng::new(0);
        for num_steps in [1, 10, 500] {
            let melody = generator.generate("60 _ 62", params(num_steps), &mut rng).unwrap();
            assert_eq!(melody.stop, StopReason::Boundary);
            assert_eq!(melody.steps, 1);
            assert_eq!(melody.symbols, parse_symbols("60 _ 62").unwrap());
        }
    }

    #[test]
    fn step_budget_bounds_the_melody() {
        let vocab = vocab();
        let generator = MelodyGenerator::new(one_hot(2), &vocab, 4).unwrap();
        let mut rng = MelodyRng::new(0);
        let melody = generator.generate("r", params(3), &mut rng).unwrap();
        assert_eq!(melody.stop, StopReason::StepBudget);
        assert_eq!(melody.steps, 3);
        assert_eq!(melody.symbols, parse_symbols("r 64 64 64").unwrap());
    }

    #[test]
    fn predictor_sees_the_truncated_context() {
        let vocab = vocab();
        let seen = RefCell::new(Vec::new());
        let recorder = |ctx: &[usize]| -> Result<Vec<f64>> {
            seen.borrow_mut().push(ctx.to_vec());
            Ok(vec![0.0, 1.0, 0.0, 0.0, 0.0, 0.0])
        };
        let generator = MelodyGenerator::new(recorder, &vocab, 4).unwrap();
        let p = GenerationParams {
            max_sequence_length: 3,
            ..params(3)
        };
        generator
            .generate("60", p, &mut MelodyRng::new(1))
            .unwrap();
        assert_eq!(*seen.borrow(), vec![vec![5, 5, 0], vec![5, 0, 1], vec![0, 1, 1]]);
    }

    #[test]
    fn states_advance_one_transition_at_a_time() {
        let vocab = vocab();
        let generator = MelodyGenerator::new(one_hot(0), &vocab, 2).unwrap();
        let mut rng = MelodyRng::new(0);
        let p = GenerationParams {
            max_sequence_length: 2,
            ..params(2)
        };
        let mut run = generator.start(&[Symbol::Pitch(62)], p).unwrap();
        assert_eq!(run.state(), GeneratorState::Seeding);
        assert_eq!(
            run.advance(&mut rng).unwrap(),
            GeneratorState::Generating { step: 0 }
        );
        assert_eq!(run.context(), &[5, 5, 1]);
        assert_eq!(
            run.advance(&mut rng).unwrap(),
            GeneratorState::Generating { step: 1 }
        );
        assert_eq!(
            run.advance(&mut rng).unwrap(),
            GeneratorState::Stopped(StopReason::StepBudget)
        );
        // Terminal.
        assert_eq!(
            run.advance(&mut rng).unwrap(),
            GeneratorState::Stopped(StopReason::StepBudget)
        );
        assert_eq!(run.context(), &[5, 5, 1, 0, 0]);
        let melody = run.finish().unwrap();
        assert_eq!(melody.symbols, parse_symbols("62 60 60").unwrap());
    }

    #[test]
    fn finishing_early_is_an_error() {
        let vocab = vocab();
        let generator = MelodyGenerator::new(one_hot(0), &vocab, 4).unwrap();
        let run = generator.start(&[], params(5)).unwrap();
        assert!(run.finish().is_err());
    }

    #[test]
    fn same_seed_same_melody() {
        let vocab = vocab();
        let uniform = |_: &[usize]| -> Result<Vec<f64>> { Ok(vec![0.2, 0.2, 0.2, 0.2, 0.2, 0.0]) };
        let generator = MelodyGenerator::new(uniform, &vocab, 4).unwrap();
        let a = generator.generate("60", params(40), &mut MelodyRng::new(11)).unwrap();
        let b = generator.generate("60", params(40), &mut MelodyRng::new(11)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.symbols.len(), 41);
    }

    #[test]
    fn unknown_seed_symbol_fails() {
        let vocab = vocab();
        let generator = MelodyGenerator::new(one_hot(0), &vocab, 4).unwrap();
        let err = generator
            .generate("60 65", params(5), &mut MelodyRng::new(0))
            .unwrap_err();
        assert!(matches!(err, MelodyError::UnknownSymbol(s) if s == "65"));
        assert!(matches!(
            generator.generate("60 x", params(5), &mut MelodyRng::new(0)),
            Err(MelodyError::MalformedSymbol(_))
        ));
    }

    #[test]
    fn out_of_vocabulary_draw_is_an_invalid_id() {
        let vocab = vocab();
        let too_wide = |_: &[usize]| -> Result<Vec<f64>> {
            let mut p = vec![0.0; 8];
            p[7] = 1.0;
            Ok(p)
        };
        let generator = MelodyGenerator::new(too_wide, &vocab, 4).unwrap();
        assert!(matches!(
            generator.generate("60", params(5), &mut MelodyRng::new(0)),
            Err(MelodyError::InvalidId { id: 7, len: 6 })
        ));
    }

    #[test]
    fn rejects_bad_parameters() {
        let vocab = vocab();
        let generator = MelodyGenerator::new(one_hot(0), &vocab, 4).unwrap();
        let bad = [
            params(0),
            GenerationParams {
                max_sequence_length: 0,
                ..params(1)
            },
            GenerationParams {
                max_sequence_length: 5,
                ..params(1)
            },
            GenerationParams {
                temperature: 0.0,
                ..params(1)
            },
        ];
        for p in bad {
            assert!(matches!(
                generator.start(&[], p),
                Err(MelodyError::InvalidParameter { .. })
            ));
        }
        assert!(MelodyGenerator::new(one_hot(0), &vocab, 0).is_err());
    }

    #[test]
    fn vocabulary_without_boundary_is_rejected() {
        let vocab = Vocabulary::build(&parse_symbols("60 _").unwrap()).unwrap();
        assert!(matches!(
            MelodyGenerator::new(one_hot(0), &vocab, 4),
            Err(MelodyError::UnknownSymbol(s)) if s == "/"
        ));
    }
}
