// File: src/bin/main.rs
use clap::{Parser, Subcommand};
use crossterm::cursor::MoveToColumn;
use crossterm::execute;
use crossterm::style::{Print, Stylize};
use crossterm::terminal::{Clear, ClearType};
use sniff_core::config::{SniffleConfig, ENV_CONCURRENCY, ENV_DICTIONARY_PATH, ENV_STORE_PATH};
use sniff_core::core::trie::PhraseTrie;
use sniff_core::dataset::{load_labeled_set, to_json};
use sniff_core::learning::LearningEngine;
use sniff_core::logging::{init_logging, ENV_LOG};
use sniff_core::persistence::FileStore;
use sniff_core::{Attribute, CategorySelector, Sniffer, Tokenizer};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// Classify user agent strings by name, engine, OS, type and device.
#[derive(Parser, Debug)]
#[command(name = "sniffle", version, about)]
struct Cli {
    /// Count store snapshot file
    #[arg(long, global = true, env = ENV_STORE_PATH)]
    store: Option<PathBuf>,

    /// Compiled phrase dictionary (JSON)
    #[arg(long, global = true, env = ENV_DICTIONARY_PATH)]
    dictionary: Option<PathBuf>,

    /// Examples processed concurrently by import and test
    #[arg(long, global = true, env = ENV_CONCURRENCY)]
    concurrency: Option<usize>,

    /// Minimum score for a confident answer
    #[arg(long, global = true, allow_negative_numbers = true)]
    threshold: Option<f64>,

    /// Log filter, e.g. "debug"
    #[arg(long, global = true, env = ENV_LOG)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify a user agent string
    Classify { user_agent: String },
    /// Show every category score of one attribute
    Scores { user_agent: String, attribute: String },
    /// Show the tokens extracted from a user agent string
    Tokenize { user_agent: String },
    /// Learn that a user agent belongs to a category
    Train {
        user_agent: String,
        attribute: String,
        category: String,
    },
    /// Unlearn a user agent; "*" removes whatever category it has
    Untrain {
        user_agent: String,
        attribute: String,
        category: String,
    },
    /// Train from a labeled JSON data file
    Import {
        file: PathBuf,
        /// Import a random sample of this size instead of all user agents
        #[arg(short, long)]
        sample: Option<usize>,
    },
    /// Measure accuracy against a labeled JSON data file
    Test {
        file: PathBuf,
        /// Test a random sample of this size instead of all user agents
        #[arg(short, long)]
        sample: Option<usize>,
    },
    /// Print every learned user agent as labeled JSON
    Export,
    /// List the attribute ids
    Attributes,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "ERROR:".red(), e);
            ExitCode::FAILURE
        }
    }
}

/// clap has already folded the environment into the flags.
fn resolve_config(cli: &Cli) -> SniffleConfig {
    let mut config = SniffleConfig::default();
    if let Some(path) = &cli.store {
        config = config.with_store_path(path);
    }
    if let Some(path) = &cli.dictionary {
        config = config.with_dictionary_path(path);
    }
    if let Some(concurrency) = cli.concurrency {
        config = config.with_concurrency(concurrency);
    }
    if let Some(threshold) = cli.threshold {
        config = config.with_threshold(threshold);
    }
    config
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolve_config(&cli);

    match cli.command {
        Command::Attributes => {
            for attr in Attribute::ALL {
                println!("{:<8} {}", attr.id(), attr.description());
            }
            Ok(())
        }
        Command::Tokenize { user_agent } => {
            let phrases = match &config.dictionary_path {
                Some(path) => PhraseTrie::load(path)?,
                None => PhraseTrie::builtin()?,
            };
            let tokens = Tokenizer::new(phrases).tokenize(&user_agent);
            println!("{}", serde_json::to_string_pretty(&tokens)?);
            Ok(())
        }
        command => run_with_store(&config, command),
    }
}

fn run_with_store(config: &SniffleConfig, command: Command) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(FileStore::open(&config.store_path)?);
    let sniffer = Sniffer::from_config(config, store.clone())?;

    match command {
        Command::Classify { user_agent } => {
            let results = sniffer.classify(&user_agent)?;
            if results.is_empty() {
                println!("Unknown!");
            }
            for (attr, result) in results {
                println!("{}: {} [{}]", attr.label(), result.category, result.score);
            }
        }
        Command::Scores { user_agent, attribute } => {
            let attribute: Attribute = attribute.parse()?;
            for (category, score) in sniffer.scores(&user_agent, attribute)? {
                println!("{category}: {score}");
            }
        }
        Command::Train { user_agent, attribute, category } => {
            let attribute: Attribute = attribute.parse()?;
            sniffer.train(&user_agent, attribute, &category)?;
            store.save()?;
            ok(&format!("Learned 1 user agent: {} -> {}", attribute.label(), category.trim()));
        }
        Command::Untrain { user_agent, attribute, category } => {
            let attribute: Attribute = attribute.parse()?;
            let selector = CategorySelector::parse(&category);
            if sniffer.untrain(&user_agent, attribute, &selector)? {
                store.save()?;
                ok(&format!("Unlearned 1 user agent: {} -> {}", attribute.label(), selector));
            } else {
                println!("Nothing to unlearn for {}.", attribute.label());
            }
        }
        Command::Import { file, sample } => {
            let examples = load_labeled_set(&file)?;
            let engine = LearningEngine::new(config.concurrency).with_sample(sample);
            let report = engine.import(&sniffer, examples, Some(&render_progress));
            finish_progress();
            // Whatever was trained before a failure is kept.
            store.save()?;
            let report = report?;
            ok(&format!("Imported {} user agents.", report.examples));
            if report.skipped > 0 {
                println!("Skipped {} invalid labels.", report.skipped);
            }
        }
        Command::Test { file, sample } => {
            let examples = load_labeled_set(&file)?;
            let engine = LearningEngine::new(config.concurrency).with_sample(sample);
            let report = engine.evaluate(&sniffer, examples, Some(&render_progress));
            finish_progress();
            let report = report?;
            ok(&format!("Success rate: {:.0}%", report.success_rate() * 100.0));
        }
        Command::Export => {
            println!("{}", to_json(&sniffer.export()?)?);
        }
        Command::Attributes | Command::Tokenize { .. } => {}
    }

    Ok(())
}

fn ok(message: &str) {
    println!("{} {}", "OK:".green(), message);
}

fn render_progress(done: usize, total: usize) {
    const WIDTH: usize = 30;
    let filled = WIDTH * done / total.max(1);
    let line = format!(
        "[{}{}] {:>3}% ({}/{})",
        "#".repeat(filled),
        "-".repeat(WIDTH - filled),
        100 * done / total.max(1),
        done,
        total
    );
    let mut stderr = io::stderr().lock();
    let _ = execute!(stderr, MoveToColumn(0), Clear(ClearType::CurrentLine), Print(line));
}

fn finish_progress() {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr);
}
