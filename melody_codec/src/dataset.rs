// Dataset preparation: scores -> encoded pieces -> corpus -> vocabulary.
//
// Each stage leaves a file behind so later stages (and external training
// code) can start from it:
//
//   preprocess                 <save_dir>/<index>.txt, one encoded piece each
//   create_single_file_dataset the corpus: every piece plus boundary runs
//   create_mapping             the symbol -> id table as JSON
//
// Piece files are zero-padded so lexicographic order is index order, and are
// always read back sorted. `preprocess` deletes the piece files a previous run
// left in `save_dir` before writing, so rebuilding from the same scores gives
// the same corpus and, through `Vocabulary::build`, the same ids.

use crate::codec::encode;
use crate::config::PipelineConfig;
use crate::corpus::assemble;
use crate::error::{MelodyError, Result};
use crate::score::{ScoreSource, has_acceptable_durations};
use crate::symbol::{Symbol, join_symbols, parse_symbols};
use crate::vocabulary::Vocabulary;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Counts from one `preprocess` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PreprocessReport {
    /// Scores the source returned.
    pub loaded: usize,
    /// Scores written as piece files.
    pub encoded: usize,
    /// Scores dropped by the duration filter.
    pub skipped: usize,
}

/// Encode every acceptable score from `source` into its own file in `save_dir`.
///
/// Existing `.txt` piece files in `save_dir` are removed first. Scores with a duration outside `config.acceptable_durations` are skipped.
/// A score that passes that filter but still cannot be encoded on the
/// `config.timestep` grid aborts the run.
pub fn preprocess<S: ScoreSource + ?Sized>(
    source: &S,
    save_dir: &Path,
    config: &PipelineConfig,
) -> Result<PreprocessReport> {
    let scores = source.load_scores()?;
    info!(count = scores.len(), "loaded scores");
    std::fs::create_dir_all(save_dir).map_err(|e| MelodyError::io(save_dir, e))?;
    let stale = remove_piece_files(save_dir)?;
    if stale > 0 {
        info!(count = stale, dir = %save_dir.display(), "removed pieces from a previous run");
    }

    let mut report = PreprocessReport {
        loaded: scores.len(),
        ..Default::default()
    };
    for (index, score) in scores.iter().enumerate() {
        if !has_acceptable_durations(&score.events, &config.acceptable_durations) {
            warn!(index, title = %score.title, "skipping score with unacceptable durations");
            report.skipped += 1;
            continue;
        }
        let symbols = encode(&score.events, config.timestep)?;
        let path = piece_path(save_dir, index);
        std::fs::write(&path, join_symbols(&symbols)).map_err(|e| MelodyError::io(&path, e))?;
        report.encoded += 1;
    }
    info!(
        encoded = report.encoded,
        skipped = report.skipped,
        dir = %save_dir.display(),
        "preprocessing finished"
    );
    Ok(report)
}

fn piece_path(save_dir: &Path, index: usize) -> PathBuf {
    save_dir.join(format!("{index:06}.txt"))
}

fn is_piece_file(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|ext| ext == "txt")
}

fn remove_piece_files(dir: &Path) -> Result<usize> {
    let entries = std::fs::read_dir(dir).map_err(|e| MelodyError::io(dir, e))?;
    let mut removed = 0;
    for entry in entries {
        let path = entry.map_err(|e| MelodyError::io(dir, e))?.path();
        if is_piece_file(&path) {
            std::fs::remove_file(&path).map_err(|e| MelodyError::io(&path, e))?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Read every encoded piece in `dir`, in file-name order.
pub fn load_encoded_pieces(dir: &Path) -> Result<Vec<Vec<Symbol>>> {
    let entries = std::fs::read_dir(dir).map_err(|e| MelodyError::io(dir, e))?;
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| MelodyError::io(dir, e))?.path();
        if is_piece_file(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    paths
        .iter()
        .map(|path| {
            let text = std::fs::read_to_string(path).map_err(|e| MelodyError::io(path, e))?;
            parse_symbols(&text)
        })
        .collect()
}

/// Assemble all pieces in `dataset_dir` into one corpus and write it to
/// `corpus_path` as space-separated text.
pub fn create_single_file_dataset(
    dataset_dir: &Path,
    corpus_path: &Path,
    sequence_length: usize,
) -> Result<Vec<Symbol>> {
    let pieces = load_encoded_pieces(dataset_dir)?;
    let corpus = assemble(&pieces, sequence_length)?;
    std::fs::write(corpus_path, join_symbols(&corpus))
        .map_err(|e| MelodyError::io(corpus_path, e))?;
    info!(
        pieces = pieces.len(),
        symbols = corpus.len(),
        path = %corpus_path.display(),
        "wrote corpus"
    );
    Ok(corpus)
}

/// Read a corpus written by `create_single_file_dataset`.
pub fn load_corpus(path: &Path) -> Result<Vec<Symbol>> {
    let text = std::fs::read_to_string(path).map_err(|e| MelodyError::io(path, e))?;
    parse_symbols(&text)
}

/// Build the vocabulary of `corpus` and persist it to `mapping_path`.
pub fn create_mapping(corpus: &[Symbol], mapping_path: &Path) -> Result<Vocabulary> {
    let vocabulary = Vocabulary::build(corpus)?;
    vocabulary.save(mapping_path)?;
    info!(symbols = vocabulary.len(), path = %mapping_path.display(), "wrote mapping");
    Ok(vocabulary)
}

/// Map a corpus to ids. Fails on the first symbol the vocabulary lacks.
pub fn corpus_to_ids(corpus: &[Symbol], vocabulary: &Vocabulary) -> Result<Vec<usize>> {
    vocabulary.encode_all(corpus)
}
