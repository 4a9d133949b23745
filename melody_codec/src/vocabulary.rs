// Bidirectional symbol <-> id table.
//
// Ids are dense in `[0, len)` and are handed out in `Symbol` order (pitches
// ascending, then rest, hold, boundary), so the same corpus always yields the
// same table regardless of process or platform. A model trained against one
// table is only meaningful with that table: load the persisted file rather
// than rebuilding from a different corpus.
//
// The inverse direction is a plain `Vec` indexed by id. The forward direction
// is a `HashMap`. After construction the table is read-only and can be shared
// across concurrent generation runs.
//
// Persisted as a JSON object `{ "<symbol>": <id>, ... }` written in id order.
// Loading goes through a visitor that sees every entry, so duplicate keys are
// caught instead of silently overwritten.

use crate::error::{MelodyError, Result};
use crate::symbol::Symbol;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;

/// Dense, ordered mapping between symbols and ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    symbols: Vec<Symbol>,
    ids: HashMap<Symbol, usize>,
}

impl Vocabulary {
    /// Collect the distinct symbols of `corpus` and number them in sorted order.
    pub fn build(corpus: &[Symbol]) -> Result<Self> {
        if corpus.is_empty() {
            return Err(MelodyError::EmptyCorpus);
        }
        let distinct: BTreeSet<Symbol> = corpus.iter().copied().collect();
        let symbols: Vec<Symbol> = distinct.into_iter().collect();
        let ids = symbols.iter().enumerate().map(|(id, &s)| (s, id)).collect();
        Ok(Self { symbols, ids })
    }

    /// Rebuild from persisted `(symbol, id)` entries, checking that they form
    /// a bijection onto `[0, entries.len())`.
    pub fn from_entries(entries: Vec<(Symbol, usize)>) -> Result<Self> {
        if entries.is_empty() {
            return Err(MelodyError::CorruptVocabulary("table is empty".into()));
        }
        let len = entries.len();
        let mut slots: Vec<Option<Symbol>> = vec![None; len];
        let mut ids = HashMap::with_capacity(len);
        for (symbol, id) in entries {
            if id >= len {
                return Err(MelodyError::CorruptVocabulary(format!(
                    "id {id} for '{symbol}' leaves a gap in a table of {len} entries"
                )));
            }
            if ids.insert(symbol, id).is_some() {
                return Err(MelodyError::CorruptVocabulary(format!(
                    "symbol '{symbol}' appears more than once"
                )));
            }
            if let Some(previous) = slots[id].replace(symbol) {
                return Err(MelodyError::CorruptVocabulary(format!(
                    "id {id} is assigned to both '{previous}' and '{symbol}'"
                )));
            }
        }
        // Every slot is filled: `len` distinct ids all below `len`.
        let symbols = slots.into_iter().flatten().collect();
        Ok(Self { symbols, ids })
    }

    /// Number of distinct symbols.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Always false for a constructed table; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbols in id order.
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// True if `symbol` has an id.
    pub fn contains(&self, symbol: Symbol) -> bool {
        self.ids.contains_key(&symbol)
    }

    /// Id of `symbol`, or `UnknownSymbol`.
    pub fn encode(&self, symbol: Symbol) -> Result<usize> {
        self.ids
            .get(&symbol)
            .copied()
            .ok_or_else(|| MelodyError::UnknownSymbol(symbol.to_string()))
    }

    /// Symbol with id `id`, or `InvalidId` when out of range.
    pub fn decode(&self, id: usize) -> Result<Symbol> {
        self.symbols.get(id).copied().ok_or(MelodyError::InvalidId {
            id,
            len: self.symbols.len(),
        })
    }

    /// Map every symbol to its id, failing on the first unknown one.
    pub fn encode_all(&self, symbols: &[Symbol]) -> Result<Vec<usize>> {
        symbols.iter().map(|&s| self.encode(s)).collect()
    }

    /// The table as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| MelodyError::CorruptVocabulary(e.to_string()))
    }

    /// Write the table as JSON to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| MelodyError::json(path, e))?;
        std::fs::write(path, json).map_err(|e| MelodyError::io(path, e))
    }

    /// Read a table written by `save`, checking it is a bijection.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| MelodyError::io(path, e))?;
        let table: MappingTable =
            serde_json::from_str(&data).map_err(|e| MelodyError::json(path, e))?;
        Self::from_entries(table.0)
    }
}

impl Serialize for Vocabulary {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.symbols.len()))?;
        for (id, symbol) in self.symbols.iter().enumerate() {
            map.serialize_entry(symbol, &id)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Vocabulary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let table = MappingTable::deserialize(deserializer)?;
        Vocabulary::from_entries(table.0).map_err(serde::de::Error::custom)
    }
}

/// Raw entries in file order, duplicates preserved.
struct MappingTable(Vec<(Symbol, usize)>);

impl<'de> Deserialize<'de> for MappingTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = MappingTable;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map from symbol to non-negative integer id")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((symbol, id)) = access.next_entry::<Symbol, usize>()? {
                    entries.push((symbol, id));
                }
                Ok(MappingTable(entries))
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::parse_symbols;
    use proptest::prelude::*;

    fn corpus(text: &str) -> Vec<Symbol> {
        parse_symbols(text).unwrap()
    }

    #[test]
    fn ids_follow_symbol_order() {
        let vocab = Vocabulary::build(&corpus("67 _ r 60 / / 62 _")).unwrap();
        assert_eq!(
            vocab.symbols(),
            &[
                Symbol::Pitch(60),
                Symbol::Pitch(62),
                Symbol::Pitch(67),
                Symbol::Rest,
                Symbol::Hold,
                Symbol::Boundary
            ]
        );
        assert_eq!(vocab.encode(Symbol::Pitch(60)).unwrap(), 0);
        assert_eq!(vocab.encode(Symbol::Boundary).unwrap(), 5);
    }

    #[test]
    fn same_symbols_in_any_order_give_same_table() {
        let a = Vocabulary::build(&corpus("60 62 r _ /")).unwrap();
        let b = Vocabulary::build(&corpus("/ _ r 62 60 60 62")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_corpus_is_rejected() {
        assert!(matches!(
            Vocabulary::build(&[]),
            Err(MelodyError::EmptyCorpus)
        ));
    }

    #[test]
    fn unknown_symbol_and_bad_id_fail_hard() {
        let vocab = Vocabulary::build(&corpus("60 _")).unwrap();
        assert!(matches!(
            vocab.encode(Symbol::Pitch(61)),
            Err(MelodyError::UnknownSymbol(s)) if s == "61"
        ));
        assert!(matches!(
            vocab.decode(2),
            Err(MelodyError::InvalidId { id: 2, len: 2 })
        ));
    }

    #[test]
    fn json_table_is_written_in_id_order_and_reloads() {
        let vocab = Vocabulary::build(&corpus("r 64 _ /")).unwrap();
        let json = vocab.to_json().unwrap();
        let compact: String = json.split_whitespace().collect();
        assert_eq!(compact, r#"{"64":0,"r":1,"_":2,"/":3}"#);
        let back: Vocabulary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vocab);
    }

    #[test]
    fn load_rejects_duplicate_ids() {
        let err = serde_json::from_str::<Vocabulary>(r#"{"60": 0, "62": 0}"#).unwrap_err();
        assert!(err.to_string().contains("assigned to both"), "{err}");
    }

    #[test]
    fn load_rejects_duplicate_symbols() {
        let err = serde_json::from_str::<Vocabulary>(r#"{"60": 0, "60": 1}"#).unwrap_err();
        assert!(err.to_string().contains("more than once"), "{err}");
    }

    #[test]
    fn load_rejects_gaps_and_empty_tables() {
        assert!(serde_json::from_str::<Vocabulary>(r#"{"60": 0, "r": 2}"#).is_err());
        assert!(serde_json::from_str::<Vocabulary>("{}").is_err());
        assert!(serde_json::from_str::<Vocabulary>(r#"{"999": 0}"#).is_err());
    }

    #[test]
    fn save_and_load_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.json");
        let vocab = Vocabulary::build(&corpus("55 _ _ r / 57")).unwrap();
        vocab.save(&path).unwrap();
        assert_eq!(Vocabulary::load(&path).unwrap(), vocab);
    }

    #[test]
    fn loading_a_missing_file_reports_the_path() {
        let err = Vocabulary::load(Path::new("/nonexistent/mapping.json")).unwrap_err();
        assert!(matches!(err, MelodyError::Io { .. }));
    }

    fn arb_symbol() -> impl Strategy<Value = Symbol> {
        prop_oneof![
            (0u8..=127).prop_map(Symbol::Pitch),
            Just(Symbol::Rest),
            Just(Symbol::Hold),
            Just(Symbol::Boundary),
        ]
    }

    proptest! {
        #[test]
        fn built_tables_are_bijections(corpus in prop::collection::vec(arb_symbol(), 1..200)) {
            let vocab = Vocabulary::build(&corpus).unwrap();
            let distinct: BTreeSet<Symbol> = corpus.iter().copied().collect();
            prop_assert_eq!(vocab.len(), distinct.len());
            for &s in &corpus {
                let id = vocab.encode(s).unwrap();
                prop_assert!(id < vocab.len());
                prop_assert_eq!(vocab.decode(id).unwrap(), s);
            }
            for id in 0..vocab.len() {
                prop_assert_eq!(vocab.encode(vocab.decode(id).unwrap()).unwrap(), id);
            }
        }
    }
}
