//! Integration tests: full conversation flow with the bundled data files.
//!
//! Each test copies `data/` into a scratch directory so that brains written
//! by `shutdown` never land in the repository.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use babbler::{
    Babbler, CONFIG_FILE, DEFAULT_GREETING, EngineConfig, Error, FALLBACK_REPLY,
    GenerationLimit, Word, files, load_swap_file, load_word_list,
};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tempfile::TempDir;

/// Path to the bundled data directory.
fn data_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../data")
}

/// Copy the support files into a fresh temporary directory.
fn scratch_data() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for name in [
        files::BANNED,
        files::AUXILIARY,
        files::SWAP,
        files::GREETINGS,
        files::TRAINING,
    ] {
        fs::copy(data_dir().join(name), dir.path().join(name)).unwrap();
    }
    dir
}

fn config() -> EngineConfig {
    EngineConfig {
        limit: GenerationLimit::Iterations(100),
        ..EngineConfig::default()
    }
}

fn start(dir: &Path, seed: u64) -> Babbler<SmallRng> {
    Babbler::initialize(dir, config(), SmallRng::seed_from_u64(seed)).unwrap()
}

fn alpha_words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_ascii_alphabetic() && c != '\'')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

// ---------------------------------------------------------------------------
// Initialization
// ---------------------------------------------------------------------------

#[test]
fn initialize_trains_from_corpus() {
    let dir = scratch_data();
    let bot = start(dir.path(), 42);
    let model = bot.model();

    assert!(
        model.dictionary.word_count() > 100,
        "expected > 100 words after training, got {}",
        model.dictionary.word_count()
    );
    assert!(model.forward.len() > 1);
    assert!(model.backward.len() > 1);
    assert_eq!(bot.brain_path(), Some(dir.path().join(files::BRAIN).as_path()));
}

#[test]
fn initialize_without_support_files_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let mut bot = start(dir.path(), 1);
    assert!(bot.model().dictionary.is_empty());
    assert_eq!(bot.greet(), DEFAULT_GREETING);
    assert_eq!(bot.reply(""), FALLBACK_REPLY);
}

#[test]
fn initialize_honours_config_file() {
    let dir = scratch_data();
    fs::write(
        dir.path().join(CONFIG_FILE),
        r#"{"order": 3, "limit": {"iterations": 5}}"#,
    )
    .unwrap();

    let config = EngineConfig::from_dir(dir.path()).unwrap();
    let bot = Babbler::initialize(dir.path(), config, SmallRng::seed_from_u64(7)).unwrap();
    assert_eq!(bot.model().order, 3);
    assert!(bot.model().forward.depth() <= 4);
    assert_eq!(bot.config().limit, GenerationLimit::Iterations(5));
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

#[test]
fn reply_is_not_fallback() {
    let dir = scratch_data();
    let mut bot = start(dir.path(), 42);
    let reply = bot.reply("What do you think about music?");
    assert!(!reply.is_empty());
    assert_ne!(reply, FALLBACK_REPLY);
}

#[test]
fn reply_differs_from_input() {
    let dir = scratch_data();
    let mut bot = start(dir.path(), 42);
    let input = "Tell me something about the ocean.";
    let reply = bot.reply(input);
    assert_ne!(reply.to_lowercase(), input.to_lowercase());
}

#[test]
fn reply_ends_with_terminal_punctuation() {
    let dir = scratch_data();
    let mut bot = start(dir.path(), 42);
    let reply = bot.reply("Tell me something.");
    let last = reply.chars().last().unwrap();
    assert!(matches!(last, '.' | '!' | '?'), "{reply:?}");
}

#[test]
fn reply_starts_with_uppercase() {
    let dir = scratch_data();
    let mut bot = start(dir.path(), 42);
    let reply = bot.reply("Hello there.");
    let first = reply.chars().find(|c| c.is_ascii_alphabetic()).unwrap();
    assert!(first.is_uppercase(), "{reply:?}");
}

#[test]
fn reply_uses_only_known_words() {
    let dir = scratch_data();
    let mut bot = start(dir.path(), 5);
    let reply = bot.reply("Do cats like the snow?");
    for word in alpha_words(&reply) {
        assert!(
            bot.model().dictionary.find(&Word::new(&word)).is_some(),
            "{word} is not in the dictionary"
        );
    }
}

#[test]
fn replies_vary_across_topics() {
    let dir = scratch_data();
    let mut bot = start(dir.path(), 42);

    let replies: HashSet<String> = [
        "Tell me about dogs.",
        "What do you think about music?",
        "How is the weather in winter?",
    ]
    .iter()
    .map(|input| bot.reply(input))
    .collect();
    assert!(replies.len() >= 2, "{replies:?}");
}

#[test]
fn multi_turn_conversation() {
    let dir = scratch_data();
    let mut bot = start(dir.path(), 42);

    for input in [
        "Hello, how are you today?",
        "I like programming in Rust.",
        "What is your favourite book?",
        "Tell me about the moon.",
        "Goodbye, it was nice chatting.",
    ] {
        let reply = bot.reply(input);
        assert_ne!(reply, FALLBACK_REPLY, "no reply to {input:?}");
    }
}

#[test]
fn tiny_model_terminates() {
    let mut bot = Babbler::new(config(), SmallRng::seed_from_u64(42));
    bot.learn("hello there friend").unwrap();

    let reply = bot.reply("hello");
    if reply != FALLBACK_REPLY {
        for word in alpha_words(&reply) {
            assert!(
                ["hello", "there", "friend"].contains(&word.as_str()),
                "unexpected {word} in {reply:?}"
            );
        }
    }
}

#[test]
fn same_seed_same_reply() {
    let dir = scratch_data();
    let a = start(dir.path(), 11).reply("Tell me about animals.");
    let b = start(dir.path(), 11).reply("Tell me about animals.");
    assert_eq!(a, b);
}

#[test]
fn greeting_uses_greeting_words() {
    let dir = scratch_data();
    let mut bot = start(dir.path(), 42);
    let greeting = bot.greet();

    let greetings: Vec<String> = load_word_list(&dir.path().join(files::GREETINGS))
        .unwrap()
        .iter()
        .map(|w| w.to_string().to_lowercase())
        .collect();
    assert!(
        alpha_words(&greeting).iter().any(|w| greetings.contains(w)),
        "{greeting:?}"
    );
}

// ---------------------------------------------------------------------------
// Brain persistence
// ---------------------------------------------------------------------------

#[test]
fn empty_model_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.brn");

    let bot = Babbler::new(config(), SmallRng::seed_from_u64(1));
    bot.save_brain(&path).unwrap();

    let mut loaded = Babbler::new(config(), SmallRng::seed_from_u64(2));
    loaded.learn("something to throw away").unwrap();
    loaded.load_brain(&path).unwrap();

    let model = loaded.model();
    assert_eq!(model.dictionary.len(), 2);
    assert!(model.forward.is_empty());
    assert!(model.backward.is_empty());
}

#[test]
fn shutdown_then_initialize_restores_model() {
    let dir = scratch_data();
    let mut bot = start(dir.path(), 42);
    bot.reply("I enjoy programming computers.");
    let snapshot = bot.model().clone();
    bot.shutdown().unwrap();

    assert!(dir.path().join(files::BRAIN).exists());

    // The corpus is not trained again once a brain exists.
    let reloaded = start(dir.path(), 42);
    assert!(reloaded.model().same_as(&snapshot));
}

#[test]
fn identical_sessions_write_identical_brains() {
    let build = || {
        let dir = scratch_data();
        let mut bot = start(dir.path(), 3);
        bot.reply("I like dogs and cats.");
        let path = dir.path().join("out.brn");
        bot.save_brain(&path).unwrap();
        fs::read(&path).unwrap()
    };
    assert_eq!(build(), build());
}

#[test]
fn loaded_brain_replies_like_trained() {
    let saved = scratch_data();
    start(saved.path(), 8).shutdown().unwrap();
    let mut loaded = start(saved.path(), 99);

    let fresh = scratch_data();
    let mut trained = start(fresh.path(), 99);

    assert!(loaded.model().same_as(trained.model()));
    assert_eq!(
        loaded.reply("Tell me about trees."),
        trained.reply("Tell me about trees.")
    );
}

#[test]
fn corrupt_brain_fails_initialize() {
    let dir = scratch_data();
    fs::write(dir.path().join(files::BRAIN), b"BABLBRN\x01").unwrap();
    let result = Babbler::initialize(dir.path(), config(), SmallRng::seed_from_u64(1));
    assert!(matches!(result, Err(Error::Brain(_))));
}

#[test]
fn failed_load_leaves_model_intact() {
    let dir = scratch_data();
    let mut bot = start(dir.path(), 42);
    let before = bot.model().clone();

    let good = dir.path().join("good.brn");
    bot.save_brain(&good).unwrap();
    let mut bytes = fs::read(&good).unwrap();
    bytes.truncate(bytes.len() / 2);
    let bad = dir.path().join("bad.brn");
    fs::write(&bad, bytes).unwrap();

    assert!(bot.load_brain(&bad).is_err());
    assert!(bot.model().same_as(&before));
    assert!(matches!(
        bot.load_brain(&dir.path().join("missing.brn")),
        Err(Error::Io(_))
    ));
    assert!(bot.model().same_as(&before));
}

// ---------------------------------------------------------------------------
// Support file loading
// ---------------------------------------------------------------------------

#[test]
fn ban_list_loads() {
    let words = load_word_list(&data_dir().join(files::BANNED)).unwrap();
    assert!(words.len() > 50);
    assert!(words.contains(&Word::new("THE")));
}

#[test]
fn aux_list_loads() {
    let words = load_word_list(&data_dir().join(files::AUXILIARY)).unwrap();
    assert!(words.contains(&Word::new("I")));
    assert!(words.contains(&Word::new("you")));
}

#[test]
fn swap_table_loads() {
    let pairs = load_swap_file(&data_dir().join(files::SWAP)).unwrap();
    assert!(
        pairs
            .iter()
            .any(|(from, to)| *from == Word::new("I") && *to == Word::new("YOU"))
    );
    assert!(pairs.iter().filter(|(from, _)| *from == Word::new("you")).count() >= 2);
}
