// Error taxonomy for the codec, vocabulary, sampler, and generation loop.
//
// Every variant is fatal to the call that raised it. Nothing in this crate
// retries: each failure is a data or contract violation (an unknown symbol, a
// duration that does not fit the timestep, a predictor handing back ids the
// vocabulary never issued) rather than a transient condition.

use std::path::PathBuf;

/// Everything that can go wrong in this crate.
#[derive(Debug, thiserror::Error)]
pub enum MelodyError {
    /// `Vocabulary::build` was given a corpus with no symbols.
    #[error("cannot build a vocabulary from an empty corpus")]
    EmptyCorpus,

    /// A symbol has no id in the vocabulary.
    #[error("symbol '{0}' is not in the vocabulary")]
    UnknownSymbol(String),

    /// An id outside `[0, len)`.
    #[error("id {id} is out of range for a vocabulary of {len} symbols")]
    InvalidId { id: usize, len: usize },

    /// An event duration is not a positive whole number of timesteps.
    #[error("duration {duration} is not a positive multiple of timestep {timestep}")]
    UnquantizableDuration { duration: f64, timestep: f64 },

    /// `assemble` was given zero pieces.
    #[error("cannot assemble a corpus from zero pieces")]
    EmptyPieceList,

    /// Probability vector that cannot be sampled from.
    #[error("invalid probability distribution: {0}")]
    InvalidDistribution(String),

    /// Text that is not a pitch 0-127, `r`, `_`, or `/`.
    #[error("malformed symbol '{0}'")]
    MalformedSymbol(String),

    /// A persisted mapping table that is not a bijection onto `[0, len)`.
    #[error("corrupt vocabulary table: {0}")]
    CorruptVocabulary(String),

    /// A numeric parameter outside its allowed range.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// The external predictor failed to produce a distribution.
    #[error("predictor failed: {0}")]
    Predictor(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("MIDI error: {0}")]
    Midi(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, MelodyError>;

impl MelodyError {
    /// Wrap an I/O failure with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a JSON failure with the file it came from.
    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }

    /// Shorthand for `MelodyError::InvalidParameter`.
    pub fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
