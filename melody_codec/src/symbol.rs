// The token alphabet of the time-series encoding.
//
// A melody is written on a fixed grid of timesteps. Each grid cell holds one
// symbol: a MIDI pitch or `r` where a note or rest begins, `_` where the
// previous event is held for one more step, and `/` between pieces (and as
// the generation stop signal). On disk symbols are space-separated text, so
// every symbol has exactly one canonical text form.
//
// The derived ordering (pitches ascending, then rest, hold, boundary) is what
// `Vocabulary::build` uses to assign ids, so it must stay stable.

use crate::error::{MelodyError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Text form of `Symbol::Rest`.
pub const REST_TEXT: &str = "r";
/// Text form of `Symbol::Hold`.
pub const HOLD_TEXT: &str = "_";
/// Text form of `Symbol::Boundary`.
pub const BOUNDARY_TEXT: &str = "/";

/// Highest valid MIDI note number.
pub const MAX_PITCH: u8 = 127;

/// One timestep of an encoded melody.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Symbol {
    /// Onset of a note with this MIDI pitch (0-127).
    Pitch(u8),
    /// Onset of a rest.
    Rest,
    /// Continuation of the current event for one more timestep.
    Hold,
    /// End of a piece.
    Boundary,
}

impl Symbol {
    /// Build a pitch symbol, rejecting values above 127.
    pub fn pitch(midi: u8) -> Result<Self> {
        if midi > MAX_PITCH {
            return Err(MelodyError::MalformedSymbol(midi.to_string()));
        }
        Ok(Symbol::Pitch(midi))
    }

    /// True for symbols that start an event (a pitch or a rest).
    pub fn is_head(self) -> bool {
        matches!(self, Symbol::Pitch(_) | Symbol::Rest)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Pitch(p) => write!(f, "{p}"),
            Symbol::Rest => f.write_str(REST_TEXT),
            Symbol::Hold => f.write_str(HOLD_TEXT),
            Symbol::Boundary => f.write_str(BOUNDARY_TEXT),
        }
    }
}

impl FromStr for Symbol {
    type Err = MelodyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            REST_TEXT => Ok(Symbol::Rest),
            HOLD_TEXT => Ok(Symbol::Hold),
            BOUNDARY_TEXT => Ok(Symbol::Boundary),
            // Only plain decimal digits: "+60" or "060" would alias "60".
            _ if !s.is_empty()
                && s.bytes().all(|b| b.is_ascii_digit())
                && (s == "0" || !s.starts_with('0')) =>
            {
                let midi: u8 = s
                    .parse()
                    .map_err(|_| MelodyError::MalformedSymbol(s.to_string()))?;
                Symbol::pitch(midi).map_err(|_| MelodyError::MalformedSymbol(s.to_string()))
            }
            _ => Err(MelodyError::MalformedSymbol(s.to_string())),
        }
    }
}

// Serialized as the text form so mapping tables read like the corpus files.
impl Serialize for Symbol {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Split whitespace-separated text into symbols.
pub fn parse_symbols(text: &str) -> Result<Vec<Symbol>> {
    text.split_whitespace().map(str::parse).collect()
}

/// Join symbols with single spaces, the on-disk corpus format.
pub fn join_symbols(symbols: &[Symbol]) -> String {
    symbols
        .iter()
        .map(Symbol::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}
