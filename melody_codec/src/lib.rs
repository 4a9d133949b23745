// Melody codec and generator.
//
// Turns monophonic melodies into a fixed-vocabulary, fixed-timestep token
// stream for training a next-symbol predictor, and drives a predictor
// autoregressively to produce new melodies that decode back into notes and
// rests.
//
// Architecture:
// - symbol.rs: Token alphabet (pitch, rest `r`, hold `_`, boundary `/`)
// - vocabulary.rs: Deterministic symbol <-> id table, JSON persistence
// - codec.rs: Event <-> symbol time-series encoding (pending-head decoder)
// - corpus.rs: Piece concatenation with boundary runs, training windows
// - sampler.rs: Temperature-scaled categorical sampling
// - predictor.rs: The `Predictor` seam for external models
// - markov.rs: Count-based backoff predictor used by the CLI
// - generator.rs: Seeding -> Generating -> Stopped generation loop
// - score.rs: JSON score input, acceptable-duration filter
// - dataset.rs: File pipeline (encoded pieces, corpus, mapping)
// - midi.rs: `Renderer` seam and Standard MIDI File output
// - config.rs: JSON pipeline configuration
// - logging.rs: tracing subscriber setup for the binary
// - error.rs: `MelodyError`
//
// Every random decision goes through an injected `MelodyRng`, so a fixed
// seed reproduces a generation run exactly.

pub mod codec;
pub mod config;
pub mod corpus;
pub mod dataset;
pub mod error;
pub mod generator;
pub mod logging;
pub mod markov;
pub mod midi;
pub mod predictor;
pub mod sampler;
pub mod score;
pub mod symbol;
pub mod vocabulary;

pub use codec::{Event, decode, encode};
pub use error::{MelodyError, Result};
pub use generator::{GenerationParams, Melody, MelodyGenerator, StopReason};
pub use predictor::Predictor;
pub use symbol::Symbol;
pub use vocabulary::Vocabulary;
