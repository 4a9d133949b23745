// Corpus assembly and training-window extraction.
//
// Every piece is followed by `sequence_length` boundary markers. The run of
// markers separates pieces and doubles as the "start of piece" context the
// generator seeds itself with, so a window that straddles two pieces sees
// exactly the same prefix the generator will later see. The very last marker
// of the whole corpus is dropped.
//
// Training windows slide over the id-mapped corpus one offset at a time:
// offset `i` pairs `ids[i..i + n]` with the target `ids[i + n]`.

use crate::error::{MelodyError, Result};
use crate::symbol::Symbol;

/// Concatenate pieces, each followed by `sequence_length` boundary markers,
/// then drop the final marker.
pub fn assemble(pieces: &[Vec<Symbol>], sequence_length: usize) -> Result<Vec<Symbol>> {
    if pieces.is_empty() {
        return Err(MelodyError::EmptyPieceList);
    }
    check_sequence_length(sequence_length)?;
    let total: usize = pieces.iter().map(|p| p.len() + sequence_length).sum();
    let mut corpus = Vec::with_capacity(total);
    for piece in pieces {
        corpus.extend_from_slice(piece);
        corpus.extend(std::iter::repeat_n(Symbol::Boundary, sequence_length));
    }
    corpus.pop();
    Ok(corpus)
}

/// Split a corpus back into its pieces, dropping the boundary runs.
pub fn split_pieces(corpus: &[Symbol]) -> Vec<&[Symbol]> {
    corpus
        .split(|&s| s == Symbol::Boundary)
        .filter(|piece| !piece.is_empty())
        .collect()
}

fn check_sequence_length(sequence_length: usize) -> Result<()> {
    if sequence_length == 0 {
        return Err(MelodyError::invalid_parameter(
            "sequence_length",
            "must be at least 1",
        ));
    }
    Ok(())
}

/// One training example: a context of ids and the id that follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingWindow<'a> {
    /// `sequence_length` consecutive ids.
    pub context: &'a [usize],
    /// The id that follows `context` in the corpus.
    pub target: usize,
}

/// Iterator over every training window of an id corpus, in offset order.
/// Cloning it restarts from the clone point.
#[derive(Debug, Clone)]
pub struct TrainingWindows<'a> {
    ids: &'a [usize],
    sequence_length: usize,
    offset: usize,
}

impl<'a> Iterator for TrainingWindows<'a> {
    type Item = TrainingWindow<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let end = self.offset + self.sequence_length;
        let &target = self.ids.get(end)?;
        let window = TrainingWindow {
            context: &self.ids[self.offset..end],
            target,
        };
        self.offset += 1;
        Some(window)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .ids
            .len()
            .saturating_sub(self.offset + self.sequence_length);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TrainingWindows<'_> {}

/// Windows over `ids`, one per offset in `0..ids.len() - sequence_length`.
/// Empty when the corpus is not longer than one context.
pub fn windows(ids: &[usize], sequence_length: usize) -> Result<TrainingWindows<'_>> {
    check_sequence_length(sequence_length)?;
    Ok(TrainingWindows {
        ids,
        sequence_length,
        offset: 0,
    })
}

/// One-hot rows for `ids` over a vocabulary of `vocab_len` symbols.
pub fn one_hot(ids: &[usize], vocab_len: usize) -> Result<Vec<Vec<f32>>> {
    ids.iter()
        .map(|&id| {
            if id >= vocab_len {
                return Err(MelodyError::InvalidId { id, len: vocab_len });
            }
            let mut row = vec![0.0; vocab_len];
            row[id] = 1.0;
            Ok(row)
        })
        .collect()
}
