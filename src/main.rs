//! Babbler CLI: interactive conversational chatbot.
//!
//! Thin wrapper over the `babbler` library crate.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use babbler::{Babbler, EngineConfig, GenerationLimit};
use clap::Parser;
use log::debug;
use rand::SeedableRng;
use rand::rngs::SmallRng;

const HELP: &str = "\
Commands:
  #QUIT   save the brain (if --brain was given) and exit
  #EXIT   same as #QUIT
  #SAVE   save the brain now
  #HELP   show this message
Typing quit or exit on its own also ends the session.";

/// Babbler: a conversational chatbot using bidirectional Markov chains.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Model order (context length) for a new brain. Default: 5.
    #[arg(long)]
    order: Option<u8>,

    /// PRNG seed for reproducible output.
    #[arg(long)]
    seed: Option<u64>,

    /// Training file path (one sentence per line).
    #[arg(long)]
    train: Option<PathBuf>,

    /// Directory containing support files (megahal.ban, .aux, .grt, .swp,
    /// .trn, .brn) and an optional babbler.json.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Brain file to load at startup (if present) and save on exit.
    #[arg(long)]
    brain: Option<PathBuf>,

    /// Generation timeout in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Maximum generation iterations (0 = no limit).
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Maximum reply length in symbols.
    #[arg(long)]
    max_reply_len: Option<usize>,
}

/// A line starting with `#`, or a bare quit/exit.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Quit,
    Save,
    Help,
    Unknown(String),
}

impl Command {
    fn parse(line: &str) -> Option<Command> {
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            return Some(Command::Quit);
        }
        let name = line.strip_prefix('#')?.trim().to_ascii_uppercase();
        Some(match name.as_str() {
            "QUIT" | "EXIT" => Command::Quit,
            "SAVE" => Command::Save,
            "HELP" => Command::Help,
            _ => Command::Unknown(name),
        })
    }
}

/// Layer command-line flags over a config read from file or defaults.
fn apply_args(mut config: EngineConfig, args: &Args) -> EngineConfig {
    if let Some(order) = args.order {
        config.order = order;
    }
    if let Some(len) = args.max_reply_len {
        config.max_reply_len = len;
    }

    let current_timeout = match config.limit {
        GenerationLimit::Timeout(d) | GenerationLimit::Both { timeout: d, .. } => d,
        GenerationLimit::Iterations(_) => Duration::ZERO,
    };
    let current_iterations = match config.limit {
        GenerationLimit::Iterations(n) | GenerationLimit::Both { max_iterations: n, .. } => n,
        GenerationLimit::Timeout(_) => 0,
    };
    if args.timeout_ms.is_some() || args.max_iterations.is_some() {
        let timeout = args
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(current_timeout);
        let iterations = args.max_iterations.unwrap_or(current_iterations);
        config.limit = match (timeout.is_zero(), iterations) {
            (_, 0) => GenerationLimit::Timeout(timeout),
            (true, n) => GenerationLimit::Iterations(n),
            (false, n) => GenerationLimit::Both {
                timeout,
                max_iterations: n,
            },
        };
    }
    config
}

fn save(bot: &Babbler<SmallRng>) -> babbler::Result<()> {
    match bot.brain_path() {
        Some(path) => {
            bot.save()?;
            eprintln!("Brain saved to {}.", path.display());
        }
        None => eprintln!("No brain file set (use --brain)."),
    }
    Ok(())
}

fn main() -> babbler::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let seed = args.seed.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    });
    debug!("seed {seed}");
    let rng = SmallRng::seed_from_u64(seed);

    let base = match &args.data_dir {
        Some(dir) => EngineConfig::from_dir(dir)?,
        None => EngineConfig::default(),
    };
    let config = apply_args(base, &args);

    let mut bot = match &args.data_dir {
        Some(dir) => Babbler::initialize(dir, config, rng)?,
        None => Babbler::new(config, rng),
    };

    if let Some(path) = &args.brain
        && path.exists()
    {
        eprintln!("Loading brain from {}...", path.display());
        bot.load_brain(path)?;
        eprintln!("Brain loaded.");
    }
    bot.set_brain_path(args.brain.clone());

    if let Some(path) = &args.train {
        eprintln!("Training from {}...", path.display());
        let learned = bot.train_from_file(path)?;
        eprintln!("Training complete ({learned} lines).");
    }

    println!("Babbler: {}", bot.greet());

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut stdout = stdout.lock();

    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }
        match Command::parse(trimmed) {
            Some(Command::Quit) => break,
            Some(Command::Save) => save(&bot)?,
            Some(Command::Help) => eprintln!("{HELP}"),
            Some(Command::Unknown(name)) => eprintln!("Unknown command #{name}. Try #HELP."),
            None => {
                let reply = bot.reply(trimmed);
                writeln!(stdout, "Babbler: {reply}")?;
                stdout.flush()?;
            }
        }
    }

    let brain = bot.brain_path().map(Path::to_path_buf);
    bot.shutdown()?;
    if let Some(path) = brain {
        eprintln!("Brain saved to {}.", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        Args::parse_from(std::iter::once("babbler").chain(extra.iter().copied()))
    }

    #[test]
    fn parse_commands() {
        assert_eq!(Command::parse("quit"), Some(Command::Quit));
        assert_eq!(Command::parse("EXIT"), Some(Command::Quit));
        assert_eq!(Command::parse("#quit"), Some(Command::Quit));
        assert_eq!(Command::parse("# save"), Some(Command::Save));
        assert_eq!(Command::parse("#HELP"), Some(Command::Help));
        assert_eq!(
            Command::parse("#voice"),
            Some(Command::Unknown("VOICE".into()))
        );
        assert_eq!(Command::parse("quit now"), None);
        assert_eq!(Command::parse("hello"), None);
    }

    #[test]
    fn no_flags_keep_config() {
        let config = apply_args(EngineConfig::default(), &args(&[]));
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn flags_override_config() {
        let config = apply_args(
            EngineConfig::default(),
            &args(&["--order", "3", "--max-reply-len", "40", "--max-iterations", "10"]),
        );
        assert_eq!(config.order, 3);
        assert_eq!(config.max_reply_len, 40);
        assert_eq!(
            config.limit,
            GenerationLimit::Both {
                timeout: Duration::from_secs(1),
                max_iterations: 10
            }
        );
    }

    #[test]
    fn zero_timeout_means_iterations_only() {
        let config = apply_args(
            EngineConfig::default(),
            &args(&["--timeout-ms", "0", "--max-iterations", "7"]),
        );
        assert_eq!(config.limit, GenerationLimit::Iterations(7));
    }

    #[test]
    fn timeout_flag_replaces_file_limit() {
        let file = EngineConfig {
            limit: GenerationLimit::Iterations(50),
            ..EngineConfig::default()
        };
        let config = apply_args(file, &args(&["--timeout-ms", "200"]));
        assert_eq!(
            config.limit,
            GenerationLimit::Both {
                timeout: Duration::from_millis(200),
                max_iterations: 50
            }
        );
    }
}
