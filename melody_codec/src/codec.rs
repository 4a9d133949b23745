// Time-series encoding of note/rest events and its exact inverse.
//
// Encoding writes each event as its head symbol (pitch or `r`) followed by
// `steps - 1` hold markers, where `steps = duration / timestep`. Durations
// must be a whole, positive number of timesteps: anything else is rejected
// rather than truncated, even if an upstream filter already screened the
// score.
//
// Decoding is a two-field state machine (pending head, step count):
// - a head symbol closes the pending event and becomes the new pending head
//   with a count of 1;
// - a hold marker adds one step to the pending head;
// - a boundary marker closes the pending event and leaves nothing pending,
//   so holds that follow it until the next head have nothing to extend and
//   are dropped;
// - end of input closes whatever is pending.
//
// `decode(encode(events, t), t) == events` for every quantizable sequence.

use crate::error::{MelodyError, Result};
use crate::symbol::Symbol;

/// Default quantization unit, in quarter notes (a sixteenth note).
pub const DEFAULT_TIMESTEP: f64 = 0.25;

/// Absolute tolerance on `duration / timestep` when checking for a whole
/// number of steps. Absorbs float noise from score sources (e.g. 0.1 * 3).
const QUANTIZE_EPSILON: f64 = 1e-9;

/// Longest event, in timesteps, the codec accepts.
pub const MAX_EVENT_STEPS: usize = 1 << 24;

/// One note or rest. Durations are in quarter notes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    Note { pitch: u8, duration: f64 },
    Rest { duration: f64 },
}

impl Event {
    /// A note of `pitch` lasting `duration` quarter notes.
    pub fn note(pitch: u8, duration: f64) -> Self {
        Event::Note { pitch, duration }
    }

    /// A rest lasting `duration` quarter notes.
    pub fn rest(duration: f64) -> Self {
        Event::Rest { duration }
    }

    /// Length in quarter notes.
    pub fn duration(&self) -> f64 {
        match *self {
            Event::Note { duration, .. } | Event::Rest { duration } => duration,
        }
    }

    /// The symbol written at this event's first timestep.
    pub fn head_symbol(&self) -> Result<Symbol> {
        match *self {
            Event::Note { pitch, .. } => Symbol::pitch(pitch),
            Event::Rest { .. } => Ok(Symbol::Rest),
        }
    }
}

pub(crate) fn check_timestep(timestep: f64) -> Result<()> {
    if !timestep.is_finite() || timestep <= 0.0 {
        return Err(MelodyError::invalid_parameter(
            "timestep",
            format!("must be a positive finite number, got {timestep}"),
        ));
    }
    Ok(())
}

/// Number of timesteps `duration` spans. Fails unless it is a whole number
/// in `1..=MAX_EVENT_STEPS`.
pub fn steps_for(duration: f64, timestep: f64) -> Result<usize> {
    check_timestep(timestep)?;
    let unquantizable = || MelodyError::UnquantizableDuration { duration, timestep };
    if !duration.is_finite() || duration <= 0.0 {
        return Err(unquantizable());
    }
    let ratio = duration / timestep;
    let steps = ratio.round();
    if steps < 1.0
        || steps > MAX_EVENT_STEPS as f64
        || (ratio - steps).abs() > QUANTIZE_EPSILON
    {
        return Err(unquantizable());
    }
    Ok(steps as usize)
}

/// Encode events as one symbol per timestep.
pub fn encode(events: &[Event], timestep: f64) -> Result<Vec<Symbol>> {
    check_timestep(timestep)?;
    let mut out = Vec::new();
    for event in events {
        let steps = steps_for(event.duration(), timestep)?;
        out.push(event.head_symbol()?);
        out.extend(std::iter::repeat_n(Symbol::Hold, steps - 1));
    }
    Ok(out)
}

/// Rebuild events from a symbol stream. Boundary markers end the current
/// event and are otherwise dropped.
pub fn decode(symbols: &[Symbol], timestep: f64) -> Result<Vec<Event>> {
    check_timestep(timestep)?;
    let mut decoder = Decoder::new(timestep);
    for &symbol in symbols {
        decoder.push(symbol);
    }
    Ok(decoder.finish())
}

/// Incremental form of [`decode`], for callers that receive symbols one at a
/// time (e.g. while a melody is still being generated).
#[derive(Debug, Clone)]
pub struct Decoder {
    timestep: f64,
    pending: Option<(Symbol, usize)>,
    events: Vec<Event>,
}

impl Decoder {
    fn new(timestep: f64) -> Self {
        Self {
            timestep,
            pending: None,
            events: Vec::new(),
        }
    }

    /// Start an incremental decode; rejects a non-positive timestep.
    pub fn with_timestep(timestep: f64) -> Result<Self> {
        check_timestep(timestep)?;
        Ok(Self::new(timestep))
    }

    /// Feed one symbol. Holds with no pending head are dropped.
    pub fn push(&mut self, symbol: Symbol) {
        match symbol {
            Symbol::Hold => {
                if let Some((_, steps)) = self.pending.as_mut() {
                    *steps += 1;
                }
            }
            Symbol::Boundary => self.close(),
            head => {
                self.close();
                self.pending = Some((head, 1));
            }
        }
    }

    /// Events completed so far (excludes the pending one).
    pub fn completed(&self) -> &[Event] {
        &self.events
    }

    /// Close the pending event and return every decoded event.
    pub fn finish(mut self) -> Vec<Event> {
        self.close();
        self.events
    }

    fn close(&mut self) {
        let Some((head, steps)) = self.pending.take() else {
            return;
        };
        let duration = self.timestep * steps as f64;
        let event = match head {
            Symbol::Pitch(pitch) => Event::note(pitch, duration),
            Symbol::Rest => Event::rest(duration),
            // Only heads are ever stored as pending.
            Symbol::Hold | Symbol::Boundary => return,
        };
        self.events.push(event);
    }
}
