//! Word interning dictionary mapping [`Word`] values to compact [`Symbol`] ids.
//!
//! The dictionary maintains two parallel structures:
//! - `entries`: words in allocation order (index = symbol id)
//! - `sorted_index`: symbol ids sorted case-insensitively by their word, for O(log n) lookup
//!
//! Symbol ids are never reused or renumbered, so anything that stores a
//! [`Symbol`] (the context trees in particular) stays valid while the
//! dictionary grows. Sentinel entries [`Symbol::ERROR`] (0) and [`Symbol::FIN`]
//! (1) are pre-populated at construction.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use thiserror::Error;

/// Longest word, in bytes, that the dictionary stores.
pub const MAX_WORD_LEN: usize = 255;

/// Number of distinct symbols a dictionary can hold, sentinels included.
pub const MAX_SYMBOLS: usize = u16::MAX as usize + 1;

/// Compact identifier assigned to a word by a [`Dictionary`].
///
/// Ids 0 and 1 are reserved for the [`Symbol::ERROR`] and [`Symbol::FIN`]
/// sentinels and never correspond to user words.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Symbol(pub u16);

impl Symbol {
    /// "Not found" / error state. Always id 0.
    pub const ERROR: Symbol = Symbol(0);

    /// Sentence boundary marker. Always id 1.
    pub const FIN: Symbol = Symbol(1);

    #[inline]
    pub fn as_u16(self) -> u16 {
        self.0
    }

    /// Create a symbol from a usize index. Panics if index > u16::MAX.
    #[inline]
    pub fn from_usize(index: usize) -> Self {
        assert!(index <= u16::MAX as usize, "symbol overflow: {index}");
        Symbol(index as u16)
    }

    #[inline]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Whether this is one of the two reserved sentinels.
    #[inline]
    pub fn is_sentinel(self) -> bool {
        self == Symbol::ERROR || self == Symbol::FIN
    }
}

/// One token as written, case preserved.
///
/// Equality, ordering and hashing ignore ASCII case, so `"Cat"` and `"CAT"`
/// name the same dictionary entry. The stored bytes keep the casing of the
/// first occurrence and are what gets printed.
#[derive(Clone)]
pub struct Word(Vec<u8>);

impl Word {
    /// Create a word from text, truncating to [`MAX_WORD_LEN`] bytes on a
    /// char boundary.
    pub fn new(text: &str) -> Self {
        let mut end = text.len().min(MAX_WORD_LEN);
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        Word(text.as_bytes()[..end].to_vec())
    }

    /// Create a word from raw bytes, truncating to [`MAX_WORD_LEN`] bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let end = bytes.len().min(MAX_WORD_LEN);
        Word(bytes[..end].to_vec())
    }

    /// Placeholder text for [`Symbol::ERROR`].
    pub fn error() -> Self {
        Word(b"<ERROR>".to_vec())
    }

    /// Placeholder text for [`Symbol::FIN`].
    pub fn fin() -> Self {
        Word(b"<FIN>".to_vec())
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the first byte is an ASCII letter or digit.
    pub fn starts_alphanumeric(&self) -> bool {
        self.0.first().is_some_and(|b| b.is_ascii_alphanumeric())
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }

    fn folded(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.iter().map(u8::to_ascii_uppercase)
    }
}

impl From<&str> for Word {
    fn from(text: &str) -> Self {
        Word::new(text)
    }
}

impl AsRef<[u8]> for Word {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl PartialEq for Word {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for Word {}

impl PartialOrd for Word {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Word {
    fn cmp(&self, other: &Self) -> Ordering {
        self.folded().cmp(other.folded())
    }
}

impl Hash for Word {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.0.len());
        for b in self.folded() {
            state.write_u8(b);
        }
    }
}

impl fmt::Debug for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Word({:?})", self.to_string_lossy())
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

/// Returned when interning would need more than [`MAX_SYMBOLS`] ids.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("dictionary full: {needed} new words requested, {available} symbol ids left")]
pub struct DictionaryFull {
    pub needed: usize,
    pub available: usize,
}

/// An interning dictionary that maps words to compact [`Symbol`] values.
///
/// Lookup is O(log n) via binary search over a sorted index.
/// Insertion is O(n) in the worst case (due to index shifting).
#[derive(Debug, Clone)]
pub struct Dictionary {
    /// Words in allocation order. `entries[sym.as_usize()]` is the word for `sym`.
    entries: Vec<Word>,
    /// Indices into `entries`, kept sorted by the word they reference.
    sorted_index: Vec<Symbol>,
}

impl Dictionary {
    /// Create a dictionary holding only the two sentinel entries.
    pub fn new() -> Self {
        let error = Word::error();
        let fin = Word::fin();
        let sorted_index = if error <= fin {
            vec![Symbol::ERROR, Symbol::FIN]
        } else {
            vec![Symbol::FIN, Symbol::ERROR]
        };

        Dictionary {
            entries: vec![error, fin],
            sorted_index,
        }
    }

    fn search(&self, word: &Word) -> Result<usize, usize> {
        self.sorted_index
            .binary_search_by(|&sym| self.entries[sym.as_usize()].cmp(word))
    }

    /// Look up a word without inserting. Returns `None` if absent.
    pub fn find(&self, word: &Word) -> Option<Symbol> {
        self.search(word).ok().map(|idx| self.sorted_index[idx])
    }

    /// Insert a word if not already present, returning its symbol.
    ///
    /// An existing word keeps its symbol and its original casing. New words
    /// get the next sequential id.
    pub fn intern(&mut self, word: Word) -> Result<Symbol, DictionaryFull> {
        match self.search(&word) {
            Ok(idx) => Ok(self.sorted_index[idx]),
            Err(insert_pos) => {
                if self.entries.len() >= MAX_SYMBOLS {
                    return Err(DictionaryFull {
                        needed: 1,
                        available: 0,
                    });
                }
                let sym = Symbol::from_usize(self.entries.len());
                self.entries.push(word);
                self.sorted_index.insert(insert_pos, sym);
                Ok(sym)
            }
        }
    }

    /// Intern a whole sentence, or nothing at all.
    ///
    /// Capacity is checked before the first insertion, so on error the
    /// dictionary is unchanged.
    pub fn intern_all(&mut self, words: &[Word]) -> Result<Vec<Symbol>, DictionaryFull> {
        let unseen: BTreeSet<&Word> = words.iter().filter(|w| self.find(w).is_none()).collect();
        let available = MAX_SYMBOLS - self.entries.len();
        if unseen.len() > available {
            return Err(DictionaryFull {
                needed: unseen.len(),
                available,
            });
        }

        let mut symbols = Vec::with_capacity(words.len());
        for word in words {
            symbols.push(self.intern(word.clone())?);
        }
        Ok(symbols)
    }

    /// Resolve a symbol back to its word.
    ///
    /// # Panics
    /// Panics if `sym` was never allocated by this dictionary.
    #[inline]
    pub fn text_of(&self, sym: Symbol) -> &Word {
        match self.entries.get(sym.as_usize()) {
            Some(word) => word,
            None => panic!(
                "symbol {} out of range (dictionary holds {})",
                sym.0,
                self.entries.len()
            ),
        }
    }

    /// Non-panicking variant of [`text_of`](Self::text_of).
    #[inline]
    pub fn get(&self, sym: Symbol) -> Option<&Word> {
        self.entries.get(sym.as_usize())
    }

    /// Number of entries, sentinels included.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the dictionary contains only sentinel entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 2
    }

    /// Number of user words (sentinels excluded).
    #[inline]
    pub fn word_count(&self) -> usize {
        self.entries.len() - 2
    }

    /// Entries in allocation order, sentinels first.
    pub fn iter(&self) -> impl Iterator<Item = (Symbol, &Word)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, w)| (Symbol::from_usize(i), w))
    }

    /// Symbols in case-insensitive word order.
    pub fn sorted_symbols(&self) -> &[Symbol] {
        &self.sorted_index
    }
}

impl Default for Dictionary {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn w(s: &str) -> Word {
        Word::new(s)
    }

    #[test]
    fn sentinel_ids_are_correct() {
        assert_eq!(Symbol::ERROR, Symbol(0));
        assert_eq!(Symbol::FIN, Symbol(1));
        assert!(Symbol::FIN.is_sentinel());
        assert!(!Symbol(2).is_sentinel());
    }

    #[test]
    #[should_panic(expected = "symbol overflow")]
    fn symbol_from_usize_overflow_panics() {
        Symbol::from_usize(u16::MAX as usize + 1);
    }

    #[test]
    fn word_compares_case_insensitively() {
        assert_eq!(w("Hello"), w("HELLO"));
        assert_eq!(w("hello"), w("HeLLo"));
        assert!(w("apple") < w("BANANA"));
        assert!(w("AB") < w("abc"));
    }

    #[test]
    fn word_hash_matches_eq() {
        let mut set = HashSet::new();
        set.insert(w("Hello"));
        assert!(set.contains(&w("HELLO")));
        assert!(set.contains(&w("hello")));
    }

    #[test]
    fn word_keeps_case_for_display() {
        assert_eq!(w("McCoy").to_string(), "McCoy");
    }

    #[test]
    fn word_truncates_on_char_boundary() {
        let long = "é".repeat(200);
        let word = w(&long);
        assert!(word.len() <= MAX_WORD_LEN);
        assert_eq!(word.len() % 2, 0);
        assert!(std::str::from_utf8(word.as_bytes()).is_ok());
    }

    #[test]
    fn new_dict_has_sentinels() {
        let dict = Dictionary::new();
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.word_count(), 0);
        assert!(dict.is_empty());
        assert_eq!(dict.text_of(Symbol::ERROR), &Word::error());
        assert_eq!(dict.text_of(Symbol::FIN), &Word::fin());
    }

    #[test]
    fn intern_returns_sequential_ids() {
        let mut dict = Dictionary::new();
        let hello = dict.intern(w("hello")).unwrap();
        let world = dict.intern(w("world")).unwrap();

        assert_eq!(hello, Symbol(2));
        assert_eq!(world, Symbol(3));
        assert_eq!(dict.len(), 4);
    }

    #[test]
    fn intern_twice_grows_once() {
        let mut dict = Dictionary::new();
        let first = dict.intern(w("Hello")).unwrap();
        let len_after_first = dict.len();
        let second = dict.intern(w("HELLO")).unwrap();

        assert_eq!(first, second);
        assert_eq!(dict.len(), len_after_first);
        assert_eq!(dict.text_of(first).to_string(), "Hello");
    }

    #[test]
    fn distinct_words_get_distinct_symbols() {
        let mut dict = Dictionary::new();
        let words = ["zebra", "Apple", "mango", "apples", "Zebra", "a"];
        for word in words {
            dict.intern(w(word)).unwrap();
        }
        let found: HashSet<Symbol> = words.iter().map(|s| dict.find(&w(s)).unwrap()).collect();
        // "zebra" and "Zebra" collapse.
        assert_eq!(found.len(), 5);
    }

    #[test]
    fn find_missing() {
        let dict = Dictionary::new();
        assert_eq!(dict.find(&w("nope")), None);
    }

    #[test]
    fn sentinels_are_findable() {
        let dict = Dictionary::new();
        assert_eq!(dict.find(&Word::fin()), Some(Symbol::FIN));
        assert_eq!(dict.find(&Word::error()), Some(Symbol::ERROR));
    }

    #[test]
    fn sorted_index_is_permutation_in_order() {
        let mut dict = Dictionary::new();
        for word in ["zebra", "Apple", "mango", "kiwi", "banana"] {
            dict.intern(w(word)).unwrap();
        }

        let sorted = dict.sorted_symbols();
        assert_eq!(sorted.len(), dict.len());
        let as_set: HashSet<Symbol> = sorted.iter().copied().collect();
        assert_eq!(as_set.len(), dict.len());
        for pair in sorted.windows(2) {
            assert!(dict.text_of(pair[0]) < dict.text_of(pair[1]));
        }
    }

    #[test]
    fn iter_is_allocation_order() {
        let mut dict = Dictionary::new();
        dict.intern(w("zebra")).unwrap();
        dict.intern(w("apple")).unwrap();
        let words: Vec<String> = dict.iter().skip(2).map(|(_, w)| w.to_string()).collect();
        assert_eq!(words, vec!["zebra", "apple"]);
    }

    #[test]
    fn intern_all_maps_every_word() {
        let mut dict = Dictionary::new();
        let syms = dict
            .intern_all(&[w("the"), w(" "), w("cat"), w(" "), w("THE")])
            .unwrap();
        assert_eq!(syms[0], syms[4]);
        assert_eq!(syms[1], syms[3]);
        assert_eq!(dict.word_count(), 3);
    }

    #[test]
    fn intern_all_rejects_overflow_without_mutation() {
        let mut dict = Dictionary::new();
        for i in 0..(MAX_SYMBOLS - 3) {
            dict.intern(w(&format!("w{i}"))).unwrap();
        }
        assert_eq!(dict.len(), MAX_SYMBOLS - 1);

        let err = dict.intern_all(&[w("new1"), w("new2")]).unwrap_err();
        assert_eq!(err.needed, 2);
        assert_eq!(err.available, 1);
        assert_eq!(dict.len(), MAX_SYMBOLS - 1);

        assert!(dict.intern(w("last")).is_ok());
        assert!(dict.intern(w("one-too-many")).is_err());
        // Known words still resolve when full.
        assert!(dict.intern(w("w0")).is_ok());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn text_of_unknown_symbol_panics() {
        let dict = Dictionary::new();
        dict.text_of(Symbol(7));
    }
}
