// MIDI output for decoded melodies.
//
// `Renderer` is the seam for anything that turns events into an artifact.
// `MidiRenderer` writes a Standard MIDI File (format 0, one track) with a
// tempo event, a program change, and one NoteOn/NoteOff pair per note. Rests
// only advance time. Event durations are snapped to the `step_duration` grid
// through the same quantization check the encoder uses, so every event lands
// on a whole number of ticks.
//
// Uses the `midly` crate for SMF writing.

use crate::codec::{Event, steps_for};
use crate::error::{MelodyError, Result};
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use std::path::Path;
use tracing::info;

/// Ticks per quarter note in MIDI output.
const TICKS_PER_QUARTER: u16 = 480;

/// Largest delta time a track event can carry (28-bit variable-length field).
const MAX_DELTA_TICKS: u32 = (1 << 28) - 1;

/// Largest tempo value, in microseconds per quarter note (24-bit field).
const MAX_TEMPO_MICROSECONDS: u32 = (1 << 24) - 1;

/// Something that can turn a decoded melody into a file.
pub trait Renderer {
    fn render(&self, events: &[Event], step_duration: f64, path: &Path) -> Result<()>;
}

/// Writes melodies as Standard MIDI Files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiRenderer {
    /// Quarter notes per minute. Below 4 the tempo does not fit a MIDI tempo event.
    pub tempo_bpm: u16,
    /// General MIDI program (0 = acoustic grand piano).
    pub program: u8,
    /// NoteOn velocity for every note, 0-127.
    pub velocity: u8,
    /// MIDI channel, 0-15.
    pub channel: u8,
}

impl Default for MidiRenderer {
    fn default() -> Self {
        Self {
            tempo_bpm: 120,
            program: 0,
            velocity: 80,
            channel: 0,
        }
    }
}

impl MidiRenderer {
    /// Build an in-memory SMF for `events`.
    pub fn to_smf(&self, events: &[Event], step_duration: f64) -> Result<Smf<'static>> {
        if self.tempo_bpm == 0 {
            return Err(MelodyError::invalid_parameter("tempo_bpm", "must be positive"));
        }
        if self.program > 127 || self.velocity > 127 || self.channel > 15 {
            return Err(MelodyError::Midi(format!(
                "program {}, velocity {}, channel {} out of range",
                self.program, self.velocity, self.channel
            )));
        }
        let ticks_per_step = ticks_per_step(step_duration)?;
        let channel = u4::new(self.channel);

        let mut smf = Smf::new(Header::new(
            Format::SingleTrack,
            Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
        ));
        let mut track: Track<'static> = Vec::new();
        let tempo_microseconds = 60_000_000 / u32::from(self.tempo_bpm);
        if tempo_microseconds > MAX_TEMPO_MICROSECONDS {
            return Err(MelodyError::Midi(format!(
                "tempo {} bpm is too slow for a MIDI tempo event",
                self.tempo_bpm
            )));
        }
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(tempo_microseconds))),
        });
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::ProgramChange {
                    program: u7::new(self.program),
                },
            },
        });

        // Ticks of silence (rests) waiting to be attached to the next event.
        let mut pending_delta: u32 = 0;
        for event in events {
            let steps = steps_for(event.duration(), step_duration)?;
            let ticks = u32::try_from(steps)
                .ok()
                .and_then(|steps| steps.checked_mul(ticks_per_step))
                .ok_or_else(|| too_long(event.duration()))?;
            match *event {
                Event::Rest { .. } => {
                    pending_delta = pending_delta
                        .checked_add(ticks)
                        .ok_or_else(|| too_long(event.duration()))?;
                }
                Event::Note { pitch, .. } => {
                    if pitch > 127 {
                        return Err(MelodyError::Midi(format!("pitch {pitch} out of range")));
                    }
                    let key = u7::new(pitch);
                    track.push(TrackEvent {
                        delta: delta(pending_delta)?,
                        kind: TrackEventKind::Midi {
                            channel,
                            message: MidiMessage::NoteOn {
                                key,
                                vel: u7::new(self.velocity),
                            },
                        },
                    });
                    track.push(TrackEvent {
                        delta: delta(ticks)?,
                        kind: TrackEventKind::Midi {
                            channel,
                            message: MidiMessage::NoteOff {
                                key,
                                vel: u7::new(0),
                            },
                        },
                    });
                    pending_delta = 0;
                }
            }
        }

        // Trailing rests still take up time before the end of the track.
        track.push(TrackEvent {
            delta: delta(pending_delta)?,
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });
        smf.tracks.push(track);
        Ok(smf)
    }
}

impl Renderer for MidiRenderer {
    fn render(&self, events: &[Event], step_duration: f64, path: &Path) -> Result<()> {
        let smf = self.to_smf(events, step_duration)?;
        let mut buf = Vec::new();
        smf.write_std(&mut buf).map_err(|e| MelodyError::io(path, e))?;
        std::fs::write(path, &buf).map_err(|e| MelodyError::io(path, e))?;
        info!(path = %path.display(), events = events.len(), "wrote MIDI file");
        Ok(())
    }
}

/// Delta-time field for `ticks`, rejecting gaps a track event cannot encode.
fn delta(ticks: u32) -> Result<u28> {
    if ticks > MAX_DELTA_TICKS {
        return Err(MelodyError::Midi(format!(
            "gap of {ticks} ticks exceeds the MIDI delta-time limit"
        )));
    }
    Ok(u28::new(ticks))
}

fn too_long(duration: f64) -> MelodyError {
    MelodyError::Midi(format!("event of {duration} quarter notes is too long to render"))
}

fn ticks_per_step(step_duration: f64) -> Result<u32> {
    let ticks = f64::from(TICKS_PER_QUARTER) * step_duration;
    let rounded = ticks.round();
    if !ticks.is_finite() || rounded < 1.0 || (ticks - rounded).abs() > 1e-9 {
        return Err(MelodyError::invalid_parameter(
            "step_duration",
            format!("{step_duration} quarter notes is not a whole number of MIDI ticks"),
        ));
    }
    Ok(rounded as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn midi_events(smf: &Smf<'_>) -> Vec<(u32, MidiMessage)> {
        smf.tracks[0]
            .iter()
            .filter_map(|e| match e.kind {
                TrackEventKind::Midi { message, .. } => Some((e.delta.as_int(), message)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn notes_and_rests_become_timed_messages() {
        let events = [Event::note(67, 1.0), Event::rest(0.5), Event::note(65, 0.25)];
        let smf = MidiRenderer::default().to_smf(&events, 0.25).unwrap();
        assert_eq!(smf.tracks.len(), 1);

        let msgs = midi_events(&smf);
        // Program change, then two notes.
        assert_eq!(msgs.len(), 5);
        assert!(matches!(msgs[1], (0, MidiMessage::NoteOn { key, .. }) if key.as_int() == 67));
        assert!(matches!(msgs[2], (480, MidiMessage::NoteOff { .. })));
        // The eighth rest delays the next attack.
        assert!(matches!(msgs[3], (240, MidiMessage::NoteOn { key, .. }) if key.as_int() == 65));
        assert!(matches!(msgs[4], (120, MidiMessage::NoteOff { .. })));
    }

    #[test]
    fn written_file_parses_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mel.mid");
        let events = [Event::note(60, 0.5), Event::rest(0.25)];
        MidiRenderer::default().render(&events, 0.25, &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        assert_eq!(smf.header.format, Format::SingleTrack);
        let last = smf.tracks[0].last().unwrap();
        assert!(matches!(last.kind, TrackEventKind::Meta(MetaMessage::EndOfTrack)));
        assert_eq!(last.delta.as_int(), 120);
    }

    #[test]
    fn rejects_durations_off_the_step_grid() {
        let err = MidiRenderer::default()
            .to_smf(&[Event::note(60, 0.3)], 0.25)
            .unwrap_err();
        assert!(matches!(err, MelodyError::UnquantizableDuration { .. }));
    }

    #[test]
    fn rejects_step_durations_finer_than_a_tick() {
        assert!(ticks_per_step(0.25).is_ok());
        assert!(ticks_per_step(0.001).is_err());
        assert!(ticks_per_step(0.0).is_err());
    }

    #[test]
    fn rejects_bad_renderer_settings() {
        let renderer = MidiRenderer {
            channel: 16,
            ..Default::default()
        };
        assert!(matches!(
            renderer.to_smf(&[], 0.25),
            Err(MelodyError::Midi(_))
        ));
        let renderer = MidiRenderer {
            tempo_bpm: 0,
            ..Default::default()
        };
        assert!(renderer.to_smf(&[], 0.25).is_err());
    }

    #[test]
    fn tempo_below_four_bpm_does_not_fit_a_tempo_event() {
        let slow = |tempo_bpm| MidiRenderer {
            tempo_bpm,
            ..Default::default()
        };
        assert!(matches!(slow(3).to_smf(&[], 0.25), Err(MelodyError::Midi(_))));
        let smf = slow(4).to_smf(&[], 0.25).unwrap();
        assert!(matches!(
            smf.tracks[0][0].kind,
            TrackEventKind::Meta(MetaMessage::Tempo(t)) if t.as_int() == 15_000_000
        ));
    }

    #[test]
    fn gaps_beyond_the_delta_field_are_errors() {
        // 2^24 steps of 120 ticks: fits a u32 but not a 28-bit delta.
        let huge_rest = [Event::rest(4_194_304.0), Event::note(60, 0.25)];
        assert!(matches!(
            MidiRenderer::default().to_smf(&huge_rest, 0.25),
            Err(MelodyError::Midi(_))
        ));

        // Forty such rests overflow the running u32 tick count.
        let mut rests = vec![Event::rest(262_144.0); 40];
        rests.push(Event::note(60, 0.25));
        assert!(matches!(
            MidiRenderer::default().to_smf(&rests, 0.25),
            Err(MelodyError::Midi(_))
        ));
    }

    #[test]
    fn long_held_note_renders_within_limits() {
        let smf = MidiRenderer::default()
            .to_smf(&[Event::note(60, 4096.0)], 0.25)
            .unwrap();
        let msgs = midi_events(&smf);
        assert!(matches!(msgs[2], (1_966_080, MidiMessage::NoteOff { .. })));
    }
}
