//! Babbler conversational engine: a bidirectional Markov chain chatbot.
//!
//! This is the facade crate that wires together all the lower-level components:
//! - [`babbler_dict`]: words, symbols and the interning dictionary
//! - [`babbler_trie`]: arena-based context tree
//! - [`babbler_model`]: bidirectional model, training and brain files
//! - [`babbler_text`]: tokenizer and capitalizer
//! - [`babbler_keywords`]: keyword extraction
//! - [`babbler_gen`]: reply generation and evaluation
//!
//! A [`Babbler`] is the session object. It owns the model, the word lists and
//! the random source; every operation runs to completion on `&mut self`.
//!
//! # Quick Start
//!
//! ```
//! use babbler::{Babbler, EngineConfig, GenerationLimit};
//! use rand::SeedableRng;
//! use rand::rngs::SmallRng;
//!
//! let config = EngineConfig {
//!     limit: GenerationLimit::Iterations(20),
//!     ..EngineConfig::default()
//! };
//! let mut bot = Babbler::new(config, SmallRng::seed_from_u64(42));
//! bot.learn("The cat sat on the mat.").unwrap();
//! let reply = bot.reply("Tell me about the cat.");
//! assert!(!reply.is_empty());
//! ```

mod config;
mod error;

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use babbler_dict::Symbol;
use babbler_gen::generate_reply;
use babbler_keywords::{Keywords, extract_keywords};
use babbler_model::Model;
use babbler_text::{capitalize, tokenize};
use log::{debug, info, warn};
use rand::Rng;
use tempfile::NamedTempFile;

pub use babbler_dict::Word;
pub use babbler_gen::GenerationLimit;
pub use babbler_keywords::{KeywordConfig, SwapTable};
pub use config::{CONFIG_FILE, EngineConfig};
pub use error::{Error, Result};

/// Said when no acceptable reply could be generated.
pub const FALLBACK_REPLY: &str = "I don't know enough to answer you yet!";

/// Said by [`Babbler::greet`] when there is nothing better.
pub const DEFAULT_GREETING: &str = "Hello!";

/// Inputs with more tokens than this are answered but not learned.
pub const MAX_INPUT_TOKENS: usize = 4096;

/// Support files looked up in a data directory.
pub mod files {
    pub const BANNED: &str = "megahal.ban";
    pub const AUXILIARY: &str = "megahal.aux";
    pub const SWAP: &str = "megahal.swp";
    pub const GREETINGS: &str = "megahal.grt";
    pub const TRAINING: &str = "megahal.trn";
    pub const BRAIN: &str = "megahal.brn";
}

/// The babbler conversational engine.
///
/// Generic over the PRNG type `R` for testability.
pub struct Babbler<R: Rng> {
    model: Model,
    keyword_config: KeywordConfig,
    greetings: Vec<Word>,
    config: EngineConfig,
    rng: R,
    /// Where [`save`](Self::save) and [`shutdown`](Self::shutdown) write.
    brain_path: Option<PathBuf>,
}

impl<R: Rng> Babbler<R> {
    /// Create an engine with an empty model and no word lists.
    pub fn new(config: EngineConfig, rng: R) -> Self {
        Babbler {
            model: Model::new(config.order),
            keyword_config: KeywordConfig::default(),
            greetings: Vec::new(),
            config,
            rng,
            brain_path: None,
        }
    }

    /// Start a session from a data directory.
    ///
    /// Loads the word lists and greetings that exist in `dir`. If
    /// `megahal.brn` exists it is loaded, and a corrupt brain is an error.
    /// Otherwise the model starts empty and learns `megahal.trn` if present.
    /// The brain path is set to `dir/megahal.brn` either way.
    pub fn initialize(dir: &Path, config: EngineConfig, rng: R) -> Result<Self> {
        let mut bot = Babbler::new(config, rng);

        let banned = optional(&dir.join(files::BANNED), load_word_list)?;
        let auxiliary = optional(&dir.join(files::AUXILIARY), load_word_list)?;
        let swap = optional(&dir.join(files::SWAP), load_swap_file)?;
        bot.set_keyword_config(KeywordConfig {
            banned: banned.into_iter().collect(),
            auxiliary: auxiliary.into_iter().collect(),
            swap: SwapTable::new(swap),
        });
        bot.set_greetings(optional(&dir.join(files::GREETINGS), load_word_list)?);

        let brain = dir.join(files::BRAIN);
        if brain.exists() {
            bot.load_brain(&brain)?;
        } else {
            let corpus = dir.join(files::TRAINING);
            if corpus.exists() {
                let learned = bot.train_from_file(&corpus)?;
                info!("trained {learned} lines from {}", corpus.display());
            }
        }
        bot.brain_path = Some(brain);
        Ok(bot)
    }

    /// Set the generation limit.
    pub fn set_limit(&mut self, limit: GenerationLimit) {
        self.config.limit = limit;
    }

    /// Set keyword configuration (banned words, auxiliary words, swap table).
    pub fn set_keyword_config(&mut self, config: KeywordConfig) {
        debug!(
            "keyword config: {} banned, {} auxiliary, {} swaps",
            config.banned.len(),
            config.auxiliary.len(),
            config.swap.len()
        );
        self.keyword_config = config;
    }

    /// Set greeting keywords.
    pub fn set_greetings(&mut self, greetings: Vec<Word>) {
        self.greetings = greetings;
    }

    pub fn set_brain_path(&mut self, path: Option<PathBuf>) {
        self.brain_path = path;
    }

    pub fn brain_path(&self) -> Option<&Path> {
        self.brain_path.as_deref()
    }

    /// Learn from an input string without generating a reply.
    ///
    /// Blank input and input over [`MAX_INPUT_TOKENS`] tokens are skipped.
    /// A full dictionary is an error and leaves the model unchanged.
    pub fn learn(&mut self, input: &str) -> Result<()> {
        let tokens = tokenize(input);
        self.learn_tokens(&tokens)
    }

    fn learn_tokens(&mut self, tokens: &[Word]) -> Result<()> {
        if tokens.len() > MAX_INPUT_TOKENS {
            warn!(
                "not learning input of {} tokens (limit {MAX_INPUT_TOKENS})",
                tokens.len()
            );
            return Ok(());
        }
        self.model.learn(tokens)?;
        Ok(())
    }

    /// Learn from input and generate a reply.
    ///
    /// The input is learned first, so even a fresh engine can answer with
    /// what it was just told. Falls back to [`FALLBACK_REPLY`] when no
    /// candidate differs from the input.
    pub fn reply(&mut self, input: &str) -> String {
        let tokens = tokenize(input);
        if let Err(e) = self.learn_tokens(&tokens) {
            warn!("reply without learning: {e}");
        }

        let keywords = extract_keywords(&tokens, &self.model.dictionary, &self.keyword_config);
        let input_symbols = self.model.known_symbols(&tokens);
        self.generate(&input_symbols, &keywords)
            .unwrap_or_else(|| FALLBACK_REPLY.to_string())
    }

    /// Generate an opening line seeded by a random greeting keyword.
    pub fn greet(&mut self) -> String {
        if self.greetings.is_empty() {
            return DEFAULT_GREETING.to_string();
        }

        let idx = self.rng.random_range(0..self.greetings.len());
        let mut keywords = Keywords::new();
        if let Some(sym) = self.model.dictionary.find(&self.greetings[idx]) {
            keywords.insert(sym, false);
        }

        self.generate(&[], &keywords)
            .unwrap_or_else(|| DEFAULT_GREETING.to_string())
    }

    fn generate(&mut self, input: &[Symbol], keywords: &Keywords) -> Option<String> {
        let reply = generate_reply(
            &self.model,
            input,
            keywords,
            &self.config.limit,
            self.config.max_reply_len,
            &mut self.rng,
        )?;
        let words: Vec<Word> = reply
            .iter()
            .map(|&s| self.model.dictionary.text_of(s).clone())
            .collect();
        Some(capitalize(&words))
    }

    /// Train from a text file, one sentence per line. Blank lines and lines
    /// starting with `#` are skipped. Returns the number of lines learned.
    pub fn train_from_file(&mut self, path: &Path) -> Result<usize> {
        let content = fs::read_to_string(path)?;
        let mut learned = 0;
        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            self.learn(trimmed)?;
            learned += 1;
        }
        Ok(learned)
    }

    /// Write the model to `path`. In-memory state is untouched on failure,
    /// and so is any brain already at `path`.
    pub fn save_brain(&self, path: &Path) -> Result<()> {
        replace_file(path, |out| Ok(babbler_model::save(&self.model, out)?))?;
        info!(
            "saved brain to {}: {} words",
            path.display(),
            self.model.dictionary.word_count()
        );
        Ok(())
    }

    /// Replace the model with the brain at `path`.
    ///
    /// The brain is parsed into a fresh model first; on any error the current
    /// model stays as it was. The configured order follows the loaded brain.
    pub fn load_brain(&mut self, path: &Path) -> Result<()> {
        let model = babbler_model::load(BufReader::new(File::open(path)?))?;
        if model.order != self.config.order {
            info!(
                "brain order {} overrides configured order {}",
                model.order, self.config.order
            );
            self.config.order = model.order;
        }
        self.model = model;
        Ok(())
    }

    /// Save to the brain path, if one is set.
    pub fn save(&self) -> Result<()> {
        match &self.brain_path {
            Some(path) => self.save_brain(path),
            None => Ok(()),
        }
    }

    /// End the session, saving to the brain path if one is set.
    pub fn shutdown(self) -> Result<()> {
        self.save()
    }

    /// Get a reference to the underlying model (for inspection/testing).
    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// Load a keyword list file (one word per line, comments with #).
pub fn load_word_list(path: &Path) -> io::Result<Vec<Word>> {
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(Word::new)
        .collect())
}

/// Load a swap file (whitespace-separated pairs, one per line).
pub fn load_swap_file(path: &Path) -> io::Result<Vec<(Word, Word)>> {
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let from = parts.next()?;
            let to = parts.next()?;
            Some((Word::new(from), Word::new(to)))
        })
        .collect())
}

/// Write `path` through a temporary file in the same directory, renamed
/// into place only once `write` has succeeded.
fn replace_file(path: &Path, write: impl FnOnce(&mut dyn Write) -> Result<()>) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut out = BufWriter::new(tmp.as_file_mut());
        write(&mut out)?;
        out.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Run a loader, treating a missing file as empty.
fn optional<T>(path: &Path, load: impl Fn(&Path) -> io::Result<Vec<T>>) -> Result<Vec<T>> {
    match load(path) {
        Ok(items) => {
            debug!("loaded {} entries from {}", items.len(), path.display());
            Ok(items)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("{} not found, skipping", path.display());
            Ok(Vec::new())
        }
        Err(e) => Err(e.into()),
    }
}
