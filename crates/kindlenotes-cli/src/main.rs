//! kindlenotes CLI
//!
//! Command-line interface for exporting Kindle highlights as JSON.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing::info;
use tracing_subscriber::EnvFilter;

use kindlenotes_core::output::{self, validate_output_path, DEFAULT_INDENT};
use kindlenotes_core::{
    scrape, Config, Credentials, Destination, FormatOptions, NoteSort, ScrapeError, TextEncoding,
};

mod prompt;

#[derive(Parser, Debug)]
#[command(name = "kindlenotes")]
#[command(about = "Export your Kindle highlights and notes as JSON")]
#[command(version)]
struct Cli {
    /// Write the JSON to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Highlight ordering within a book (recency or location)
    #[arg(short = 's', long, value_name = "TYPE", default_value = "recency")]
    note_sort: NoteSort,

    /// JSON file with "email" and "password" keys
    #[arg(short, long, value_name = "FILE")]
    cred_file: Option<PathBuf>,

    /// Output text encoding (any codec label, or unicode-escape)
    #[arg(short, long, default_value = "utf-8")]
    encoding: String,

    /// Spaces per indentation level
    #[arg(short, long, default_value_t = DEFAULT_INDENT)]
    indent_level: usize,

    /// Keep keys in record order instead of sorting them
    #[arg(short, long)]
    disable_key_sorting: bool,

    /// Maximum number of pagination requests
    #[arg(long, value_name = "N")]
    max_pages: Option<usize>,

    /// More logging on stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn format_options(&self) -> Result<FormatOptions> {
        Ok(FormatOptions {
            encoding: TextEncoding::parse(&self.encoding)?,
            indent: self.indent_level,
            sort_keys: !self.disable_key_sorting,
            note_sort: self.note_sort,
        })
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        if let Some(hint) = e
            .downcast_ref::<ScrapeError>()
            .and_then(ScrapeError::recovery_suggestion)
        {
            eprintln!("{}", hint);
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    // Bad options fail before any network traffic
    let options = cli.format_options()?;

    let destination = Destination::from_path(cli.output.clone());
    if let Destination::File(path) = &destination {
        validate_output_path(path)?;
    }

    let credentials = match &cli.cred_file {
        Some(path) => Credentials::from_file(path)?,
        None => prompt::credentials()?,
    };

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(max_pages) = cli.max_pages {
        config.max_pages = max_pages;
    }

    let books = scrape(&config, &credentials)?;
    let bytes = output::format(&books, &options)?;
    destination.write(&bytes)?;

    if let Destination::File(path) = &destination {
        info!(path = %path.display(), books = books.len(), "Wrote highlights");
    }

    Ok(())
}

fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

/// Log to stderr; RUST_LOG takes precedence over -v
fn init_logging(verbose: u8) {
    let level = log_level(verbose);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("kindlenotes_core={},kindlenotes_cli={}", level, level))
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
