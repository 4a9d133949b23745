// Pipeline configuration.
//
// All tunable parameters live in `PipelineConfig`, loaded from a JSON file
// (every field optional, missing fields take the defaults below) and then
// overridden by CLI flags. `sequence_length` ties the corpus delimiters, the
// training windows, and the generator's seed prefix together: a model is only
// usable with the value it was trained with.

use crate::codec::DEFAULT_TIMESTEP;
use crate::error::{MelodyError, Result};
use crate::generator::GenerationParams;
use crate::score::ACCEPTABLE_DURATIONS;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Every tunable parameter of the preprocess, train, and generate stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Quantization unit in quarter notes.
    pub timestep: f64,
    /// Boundary markers between pieces, and context length of a training window.
    pub sequence_length: usize,
    /// Scores with any other duration are skipped during preprocessing.
    pub acceptable_durations: Vec<f64>,
    /// Longest context the Markov predictor conditions on.
    pub markov_order: usize,
    /// Settings for the `generate` stage.
    pub generation: GenerationConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            timestep: DEFAULT_TIMESTEP,
            sequence_length: 64,
            acceptable_durations: ACCEPTABLE_DURATIONS.to_vec(),
            markov_order: 3,
            generation: GenerationConfig::default(),
        }
    }
}

/// Generation and rendering settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Upper bound on sampled symbols per run.
    pub num_steps: usize,
    /// Most recent ids passed to the predictor; at most `sequence_length`.
    pub max_sequence_length: usize,
    /// Sampling temperature; lower is more conservative.
    pub temperature: f64,
    /// Quarter notes per symbol when decoding and rendering the melody.
    pub step_duration: f64,
    /// Tempo written to the MIDI file.
    pub tempo_bpm: u16,
    /// Fixed seed for reproducible runs; a clock seed is used when absent.
    pub seed: Option<u64>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            num_steps: 500,
            max_sequence_length: 64,
            temperature: 0.7,
            step_duration: DEFAULT_TIMESTEP,
            tempo_bpm: 120,
            seed: None,
        }
    }
}

impl GenerationConfig {
    /// The per-run knobs the generator takes.
    pub fn params(&self) -> GenerationParams {
        GenerationParams {
            num_steps: self.num_steps,
            max_sequence_length: self.max_sequence_length,
            temperature: self.temperature,
        }
    }
}

impl PipelineConfig {
    /// Read and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| MelodyError::io(path, e))?;
        let config: PipelineConfig =
            serde_json::from_str(&data).map_err(|e| MelodyError::json(path, e))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no stage could run with.
    pub fn validate(&self) -> Result<()> {
        let positive = |name: &'static str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(MelodyError::invalid_parameter(name, format!("must be positive, got {v}")))
            }
        };
        let nonzero = |name: &'static str, v: usize| {
            if v > 0 {
                Ok(())
            } else {
                Err(MelodyError::invalid_parameter(name, "must be at least 1"))
            }
        };
        positive("timestep", self.timestep)?;
        nonzero("sequence_length", self.sequence_length)?;
        nonzero("markov_order", self.markov_order)?;
        if self.acceptable_durations.is_empty() {
            return Err(MelodyError::invalid_parameter(
                "acceptable_durations",
                "must list at least one duration",
            ));
        }
        for &d in &self.acceptable_durations {
            positive("acceptable_durations", d)?;
        }

        let g = &self.generation;
        nonzero("num_steps", g.num_steps)?;
        nonzero("max_sequence_length", g.max_sequence_length)?;
        if g.max_sequence_length > self.sequence_length {
            return Err(MelodyError::invalid_parameter(
                "max_sequence_length",
                format!(
                    "{} exceeds sequence_length {}",
                    g.max_sequence_length, self.sequence_length
                ),
            ));
        }
        positive("temperature", g.temperature)?;
        positive("step_duration", g.step_duration)?;
        if g.tempo_bpm == 0 {
            return Err(MelodyError::invalid_parameter("tempo_bpm", "must be positive"));
        }
        Ok(())
    }
}
