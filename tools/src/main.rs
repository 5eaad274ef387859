//! Command line tools around the netspeak engine: build an index from raw
//! n-gram counts, run searches against it, probe the regex vocabulary.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use netspeak::{Config, Netspeak, PhraseConstraints, SearchRequest};
use netspeak_core::{parse_regex_query, DefaultRegexIndex};

#[derive(Parser)]
#[command(name = "netspeak", about = "n-gram phrase search tools")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a full index directory from n-gram count files
    /// (`word word ...<TAB>frequency` per line).
    Build {
        /// input text files
        #[arg(long, num_args = 1..)]
        inputs: Vec<PathBuf>,
        /// output index root; must be empty
        #[arg(long)]
        out: PathBuf,
    },
    /// Run one query (or a prompt loop) against an index.
    Search {
        /// index root as produced by `build`
        #[arg(long)]
        index: PathBuf,
        /// optional TOML config; paths are overridden by --index
        #[arg(long)]
        config: Option<PathBuf>,
        /// maximum phrases per response
        #[arg(long, default_value_t = 100)]
        max_phrases: u32,
        /// the query; reads queries from stdin when omitted
        query: Option<String>,
    },
    /// Match a regex query against a vocabulary file, most frequent first.
    Regex {
        /// newline-separated vocabulary, sorted by descending frequency
        #[arg(long)]
        vocabulary: PathBuf,
        /// maximum number of matches
        #[arg(long, default_value_t = 20)]
        max_matches: u32,
        /// timeout per query in milliseconds
        #[arg(long, default_value_t = 1000)]
        max_time: u64,
        /// the pattern; reads patterns from stdin when omitted
        pattern: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match Args::parse().command {
        Command::Build { inputs, out } => {
            anyhow::ensure!(!inputs.is_empty(), "at least one --inputs file is required");
            netspeak::indexing::build_index_from_files(&inputs, &out)
                .with_context(|| format!("building index in {}", out.display()))?;
            println!("index written to {}", out.display());
        }
        Command::Search {
            index,
            config,
            max_phrases,
            query,
        } => {
            let mut cfg = match config {
                Some(path) => Config::load_toml(&path)
                    .map_err(|e| anyhow::anyhow!("loading {}: {}", path.display(), e))?,
                None => Config::default(),
            };
            cfg.paths = Config::for_index_root(&index).paths;
            let engine = Netspeak::open(&cfg)
                .with_context(|| format!("opening index {}", index.display()))?;

            let run = |engine: &Netspeak, query: &str| -> Result<()> {
                let request = SearchRequest {
                    query: query.to_string(),
                    max_phrases,
                    phrase_constraints: PhraseConstraints::default(),
                };
                let response = engine.search(&request);
                println!("{}", serde_json::to_string_pretty(&response)?);
                Ok(())
            };

            match query {
                Some(query) => run(&engine, &query)?,
                None => prompt_loop(|line| run(&engine, line))?,
            }
        }
        Command::Regex {
            vocabulary,
            max_matches,
            max_time,
            pattern,
        } => {
            let words = std::fs::read_to_string(&vocabulary)
                .with_context(|| format!("reading {}", vocabulary.display()))?;
            let index = DefaultRegexIndex::new(words);
            let timeout = Duration::from_millis(max_time);

            let run = |index: &DefaultRegexIndex, pattern: &str| -> Result<()> {
                let query = parse_regex_query(pattern);
                let matches = index.match_query(&query, max_matches, timeout)?;
                for word in matches {
                    println!("{}", word);
                }
                Ok(())
            };

            match pattern {
                Some(pattern) => run(&index, &pattern)?,
                None => prompt_loop(|line| run(&index, line))?,
            }
        }
    }
    Ok(())
}

fn prompt_loop(mut handle: impl FnMut(&str) -> Result<()>) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }
        let line = line.trim();
        if line.is_empty() || line == "exit" || line == "quit" {
            if line.is_empty() {
                continue;
            }
            return Ok(());
        }
        handle(line)?;
    }
}
