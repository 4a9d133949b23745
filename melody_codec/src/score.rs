// Score input: the event lists the encoder consumes.
//
// Native notation formats are parsed elsewhere; this crate reads a small JSON
// form of an already-flattened monophonic line:
//
//   { "title": "Es fiel ein Reif",
//     "events": [ { "note": 67, "duration": 1.0 }, { "rest": 0.5 } ] }
//
// Durations are quarter-note lengths. `ScoreDirectory` loads every `.json`
// file in a directory in sorted file-name order, so a corpus built from the
// same directory is always assembled in the same order.
//
// Scores containing durations outside the allowed set are skipped upstream of
// encoding (see `dataset.rs`); the encoder still checks the timestep grid on
// its own.

use crate::codec::Event;
use crate::error::{MelodyError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Durations (in quarter notes) a folk-song corpus is expected to use,
/// from a sixteenth to a whole note.
pub const ACCEPTABLE_DURATIONS: [f64; 8] = [0.25, 0.5, 0.75, 1.0, 1.5, 2.0, 3.0, 4.0];

/// A monophonic piece as a flat list of events.
#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    /// Display name; the file stem when the JSON has none.
    pub title: String,
    /// Notes and rests in playing order.
    pub events: Vec<Event>,
}

/// Anything that can hand over a list of scores.
pub trait ScoreSource {
    fn load_scores(&self) -> Result<Vec<Score>>;
}

impl ScoreSource for Vec<Score> {
    fn load_scores(&self) -> Result<Vec<Score>> {
        Ok(self.clone())
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum EventRecord {
    Note { note: u8, duration: f64 },
    Rest { rest: f64 },
}

#[derive(Debug, Serialize, Deserialize)]
struct ScoreFile {
    #[serde(default)]
    title: Option<String>,
    events: Vec<EventRecord>,
}

impl Score {
    /// Parse the JSON score format, using `fallback_title` when it has no title.
    pub fn from_json(json: &str, fallback_title: &str) -> serde_json::Result<Self> {
        let file: ScoreFile = serde_json::from_str(json)?;
        Ok(Score {
            title: file.title.unwrap_or_else(|| fallback_title.to_string()),
            events: file
                .events
                .into_iter()
                .map(|record| match record {
                    EventRecord::Note { note, duration } => Event::note(note, duration),
                    EventRecord::Rest { rest } => Event::rest(rest),
                })
                .collect(),
        })
    }

    /// Serialize back to the JSON score format.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let file = ScoreFile {
            title: Some(self.title.clone()),
            events: self
                .events
                .iter()
                .map(|event| match *event {
                    Event::Note { pitch, duration } => EventRecord::Note {
                        note: pitch,
                        duration,
                    },
                    Event::Rest { duration } => EventRecord::Rest { rest: duration },
                })
                .collect(),
        };
        serde_json::to_string_pretty(&file)
    }

    /// Read one score file. The title defaults to the file stem.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| MelodyError::io(path, e))?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Score::from_json(&data, &stem).map_err(|e| MelodyError::json(path, e))
    }
}

/// All `.json` scores in one directory.
#[derive(Debug, Clone)]
pub struct ScoreDirectory {
    /// Directory scanned for `.json` scores.
    pub dir: PathBuf,
}

impl ScoreDirectory {
    /// Scores from every `.json` file in `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ScoreSource for ScoreDirectory {
    fn load_scores(&self) -> Result<Vec<Score>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| MelodyError::io(&self.dir, e))?;
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| MelodyError::io(&self.dir, e))?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();
        paths.iter().map(|p| Score::load(p)).collect()
    }
}

/// True when every event's duration is one of `allowed`.
pub fn has_acceptable_durations(events: &[Event], allowed: &[f64]) -> bool {
    events.iter().all(|event| {
        let d = event.duration();
        allowed.iter().any(|&a| (a - d).abs() < 1e-9)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_notes_and_rests() {
        let json = r#"{ "title": "Test", "events": [
            { "note": 67, "duration": 1.0 }, { "rest": 0.5 } ] }"#;
        let score = Score::from_json(json, "unused").unwrap();
        assert_eq!(score.title, "Test");
        assert_eq!(score.events, vec![Event::note(67, 1.0), Event::rest(0.5)]);
    }

    #[test]
    fn missing_title_falls_back_to_file_stem() {
        let score = Score::from_json(r#"{ "events": [] }"#, "deut0567").unwrap();
        assert_eq!(score.title, "deut0567");
        assert!(score.events.is_empty());
    }

    #[test]
    fn json_form_survives_a_rewrite() {
        let score = Score {
            title: "Kuckuck".into(),
            events: vec![Event::note(72, 0.75), Event::rest(0.25), Event::note(67, 2.0)],
        };
        let json = score.to_json().unwrap();
        assert_eq!(Score::from_json(&json, "").unwrap(), score);
    }

    #[test]
    fn malformed_events_are_rejected() {
        assert!(Score::from_json(r#"{ "events": [ { "pitch": 60 } ] }"#, "").is_err());
        assert!(Score::from_json(r#"{ "events": [ { "note": 300, "duration": 1.0 } ] }"#, "").is_err());
    }

    #[test]
    fn directory_is_read_in_sorted_order_and_ignores_other_files() {
        let dir = tempfile::tempdir().unwrap();
        for (name, pitch) in [("b.json", 62), ("a.json", 60), ("c.json", 64)] {
            let score = Score {
                title: name.into(),
                events: vec![Event::note(pitch, 1.0)],
            };
            std::fs::write(dir.path().join(name), score.to_json().unwrap()).unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "not a score").unwrap();

        let scores = ScoreDirectory::new(dir.path()).load_scores().unwrap();
        let titles: Vec<_> = scores.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["a.json", "b.json", "c.json"]);
    }

    #[test]
    fn bad_file_names_its_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{").unwrap();
        let err = ScoreDirectory::new(dir.path()).load_scores().unwrap_err();
        assert!(matches!(err, MelodyError::Json { ref path, .. } if path.ends_with("broken.json")));
    }

    #[test]
    fn duration_filter() {
        let ok = [Event::note(60, 0.75), Event::rest(4.0)];
        let bad = [Event::note(60, 0.75), Event::note(62, 1.25)];
        assert!(has_acceptable_durations(&ok, &ACCEPTABLE_DURATIONS));
        assert!(!has_acceptable_durations(&bad, &ACCEPTABLE_DURATIONS));
        assert!(has_acceptable_durations(&[], &ACCEPTABLE_DURATIONS));
    }
}
