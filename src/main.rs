use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use refindex::logging::{init_logging, LoggingConfig};
use refindex::refindex::RefIndex;
use refindex::types::*;

/// Foreign-reference checks over a record reference index.
#[derive(Parser)]
#[command(name = "refindex", about = "Foreign-reference checks over a record reference index")]
struct Cli {
    /// Log each traversal step
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a reference index project
    Init {
        /// Project path (default: current directory)
        path: Option<String>,
    },
    /// Import index rows from a JSON file
    Import {
        /// JSON array of rows
        file: PathBuf,
        /// Project path
        #[arg(short, long)]
        path: Option<String>,
    },
    /// Mark every reference held by a record as deleted
    Remove {
        /// Source record as <table>:<id>
        source: String,
        /// Project path
        #[arg(short, long)]
        path: Option<String>,
    },
    /// List the records referencing an element
    Refs {
        /// Element as <table>:<id>
        element: String,
        /// Origin page id of the element
        #[arg(long)]
        pid: i64,
        /// Recursion budget (default: from config)
        #[arg(short = 'd', long)]
        max_depth: Option<u32>,
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
        /// Project path
        #[arg(short, long)]
        path: Option<String>,
    },
    /// Exit with status 0 if the element is referenced from other pages, 1 if not
    Check {
        /// Element as <table>:<id>
        element: String,
        /// Origin page id of the element
        #[arg(long)]
        pid: i64,
        /// Recursion budget (default: from config)
        #[arg(short = 'd', long)]
        max_depth: Option<u32>,
        /// Project path
        #[arg(short, long)]
        path: Option<String>,
    },
    /// Show index statistics
    Status {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
        /// Project path
        #[arg(short, long)]
        path: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    let logging = if cli.verbose {
        LoggingConfig::verbose()
    } else {
        LoggingConfig::default()
    };
    init_logging(&logging);

    match run(cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    }
}

fn run(cli: Cli) -> refindex::errors::Result<i32> {
    match cli.command {
        Commands::Init { path } => {
            let project_path = resolve_path(path);
            RefIndex::init(&project_path)?;
            println!("Initialized reference index at {}", project_path.display());
        }
        Commands::Import { file, path } => {
            let index = RefIndex::open(&resolve_path(path))?;
            let result = index.import_file(&file)?;
            println!(
                "Imported {} rows ({} malformed) from {}",
                result.row_count,
                result.malformed_count,
                file.display()
            );
        }
        Commands::Remove { source, path } => {
            let source = ElementRef::parse(&source)?;
            let index = RefIndex::open(&resolve_path(path))?;
            let changed = index.remove_source(&source)?;
            println!("Marked {} rows from {} as deleted", changed, source);
        }
        Commands::Refs {
            element,
            pid,
            max_depth,
            json,
            path,
        } => {
            let element = ElementRef::parse(&element)?;
            let index = RefIndex::open(&resolve_path(path))?;
            let refs = index.find_foreign_references(&element, pid, max_depth)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&refs)?);
            } else if refs.is_empty() {
                println!("No references to {} outside page {}", element, pid);
            } else {
                println!("References to {} outside page {}:", element, pid);
                for (table, id, confirmed) in refs.iter() {
                    let marker = if confirmed { "" } else { " (no page reached)" };
                    println!("  {}:{}{}", table, id, marker);
                }
            }
            if refs.depth_exhausted() {
                eprintln!("warning: depth budget exhausted; the list may be incomplete");
            }
        }
        Commands::Check {
            element,
            pid,
            max_depth,
            path,
        } => {
            let element = ElementRef::parse(&element)?;
            let index = RefIndex::open(&resolve_path(path))?;
            let foreign = index.has_foreign_references(&element, pid, max_depth)?;
            println!(
                "{} {} referenced from pages other than {}",
                element,
                if foreign { "is" } else { "is not" },
                pid
            );
            return Ok(if foreign { 0 } else { 1 });
        }
        Commands::Status { json, path } => {
            let index = RefIndex::open(&resolve_path(path))?;
            let stats = index.get_stats()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Reference Index Status");
                println!("  Rows:    {}", stats.row_count);
                println!("  Live:    {}", stats.live_row_count);
                println!("  Deleted: {}", stats.deleted_row_count);
                println!("  DB Size: {} bytes", stats.db_size_bytes);
                if !stats.rows_by_source_table.is_empty() {
                    println!("\n  Live rows by source table:");
                    for (table, count) in &stats.rows_by_source_table {
                        println!("    {}: {}", table, count);
                    }
                }
                if !stats.rows_by_target_table.is_empty() {
                    println!("\n  Live rows by target table:");
                    for (table, count) in &stats.rows_by_target_table {
                        println!("    {}: {}", table, count);
                    }
                }
            }
        }
    }
    Ok(0)
}

/// Resolves an optional path argument to a `PathBuf`.
///
/// Defaults to the current working directory if no path is provided.
fn resolve_path(path: Option<String>) -> PathBuf {
    match path {
        Some(p) => PathBuf::from(p),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
