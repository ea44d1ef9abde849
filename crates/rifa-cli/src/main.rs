//! Raffle sales manager CLI
//!
//! Command-line tool for registering, searching, exporting, and merging
//! charity raffle ticket sales kept in a CSV file.

use clap::{Parser, Subcommand};
use rifa_core::{discover_sources, merge_files, MergeReport, RaffleStore, Record, STORE_HEADER};
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rifa-cli")]
#[command(about = "Charity raffle ticket sales manager", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register one raffle number for a buyer
    Register {
        /// Store file to operate on
        #[arg(short, long, default_value = "rifas.csv")]
        file: PathBuf,

        /// Raffle number to register
        #[arg(short, long)]
        number: String,

        /// Buyer name
        #[arg(long)]
        name: String,

        /// Buyer phone
        #[arg(short, long, default_value = "")]
        phone: String,
    },

    /// Register several numbers for the same buyer
    RegisterMany {
        /// Store file to operate on
        #[arg(short, long, default_value = "rifas.csv")]
        file: PathBuf,

        /// Comma-separated raffle numbers (e.g. "1, 2, 3")
        #[arg(short, long)]
        numbers: String,

        /// Buyer name
        #[arg(long)]
        name: String,

        /// Buyer phone
        #[arg(short, long, default_value = "")]
        phone: String,
    },

    /// List all records sorted by number
    List {
        /// Store file to operate on
        #[arg(short, long, default_value = "rifas.csv")]
        file: PathBuf,

        /// Maximum number of rows to display
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (table or json)
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Look up a record by its raffle number
    Find {
        /// Store file to operate on
        #[arg(short, long, default_value = "rifas.csv")]
        file: PathBuf,

        /// Raffle number to look up
        #[arg(short, long)]
        number: String,
    },

    /// Search records by buyer name
    Search {
        /// Store file to operate on
        #[arg(short, long, default_value = "rifas.csv")]
        file: PathBuf,

        /// Name fragment to search for (case-insensitive)
        #[arg(long)]
        name: String,
    },

    /// Export the store file to another path
    Export {
        /// Store file to operate on
        #[arg(short, long, default_value = "rifas.csv")]
        file: PathBuf,

        /// Destination file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Merge external CSV files into the store
    Merge {
        /// Store file to merge into
        #[arg(short, long, default_value = "rifas.csv")]
        file: PathBuf,

        /// Source CSV file to merge
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Directory to scan for source CSV files
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Output format (table or json)
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Check the store file for duplicate or non-numeric numbers
    Check {
        /// Store file to operate on
        #[arg(short, long, default_value = "rifas.csv")]
        file: PathBuf,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> rifa_core::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Register {
            file,
            number,
            name,
            phone,
        } => cmd_register(&file, &number, &name, &phone),
        Commands::RegisterMany {
            file,
            numbers,
            name,
            phone,
        } => cmd_register_many(&file, &numbers, &name, &phone),
        Commands::List { file, limit, format } => cmd_list(&file, limit, &format),
        Commands::Find { file, number } => cmd_find(&file, &number),
        Commands::Search { file, name } => cmd_search(&file, &name),
        Commands::Export { file, output } => cmd_export(&file, &output),
        Commands::Merge {
            file,
            source,
            dir,
            format,
        } => cmd_merge(&file, source, dir, &format),
        Commands::Check { file } => cmd_check(&file),
    }
}

fn cmd_register(file: &PathBuf, number: &str, name: &str, phone: &str) -> rifa_core::Result<()> {
    let store = RaffleStore::open(file)?;
    let record = store.register(number, name, phone)?;

    println!("Number {} registered to {}.", record.number, record.name);

    Ok(())
}

fn cmd_register_many(
    file: &PathBuf,
    numbers: &str,
    name: &str,
    phone: &str,
) -> rifa_core::Result<()> {
    let numbers: Vec<String> = numbers
        .split(',')
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .map(|n| n.to_string())
        .collect();
    if numbers.is_empty() {
        eprintln!("No numbers given.");
        std::process::exit(1);
    }

    let store = RaffleStore::open(file)?;
    let outcome = store.register_many(&numbers, name, phone)?;
    println!("{}", outcome);

    // A batch that registered nothing counts as a failed operation.
    if !outcome.any_registered() {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_list(file: &PathBuf, limit: Option<usize>, format: &str) -> rifa_core::Result<()> {
    let store = RaffleStore::open(file)?;
    let records = store.list_all()?;

    let shown = match limit {
        Some(limit) => &records[..limit.min(records.len())],
        None => &records[..],
    };

    match format.to_lowercase().as_str() {
        "table" => {
            if records.is_empty() {
                println!("No records registered.");
                return Ok(());
            }
            print_records(shown);
            if records.len() > shown.len() {
                println!("... ({} more rows)", records.len() - shown.len());
            }
        }
        "json" => {
            println!("{}", serde_json::to_string_pretty(shown)?);
        }
        _ => {
            eprintln!("Unknown format: {}. Supported formats: table, json", format);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn cmd_find(file: &PathBuf, number: &str) -> rifa_core::Result<()> {
    let store = RaffleStore::open(file)?;

    match store.find_by_number(number)? {
        Some(record) => {
            println!("Number: {}", record.number);
            println!("Buyer: {}", record.name);
            println!("Phone: {}", record.phone);
            println!("Purchased: {}", record.purchased_at);
        }
        None => {
            println!("Number {} is not registered.", number);
        }
    }

    Ok(())
}

fn cmd_search(file: &PathBuf, name: &str) -> rifa_core::Result<()> {
    let store = RaffleStore::open(file)?;
    let matches = store.find_by_name(name)?;

    if matches.is_empty() {
        println!("No buyers matching '{}'.", name);
        return Ok(());
    }

    println!("Matches ({}):", matches.len());
    print_records(&matches);

    Ok(())
}

fn cmd_export(file: &PathBuf, output: &PathBuf) -> rifa_core::Result<()> {
    let store = RaffleStore::open(file)?;
    let rows = store.read_records()?.len();
    store.export(output)?;

    println!("Exported {} rows to {}", rows, output.display());

    Ok(())
}

fn cmd_merge(
    file: &PathBuf,
    source: Option<PathBuf>,
    dir: Option<PathBuf>,
    format: &str,
) -> rifa_core::Result<()> {
    let sources: Vec<PathBuf> = match (source, dir) {
        (Some(source), None) => vec![source],
        (None, Some(dir)) => {
            let mut sources = discover_sources(&dir)?;
            // The store file itself may live inside the scanned directory;
            // merging it into itself would only report every row as ignored.
            let dest_real = fs::canonicalize(file).ok();
            sources.retain(|s| dest_real.is_none() || fs::canonicalize(s).ok() != dest_real);
            sources
        }
        _ => {
            eprintln!("Specify exactly one of --source or --dir");
            std::process::exit(1);
        }
    };

    if sources.is_empty() {
        println!("No source files found.");
        return Ok(());
    }

    let mut reports: Vec<(PathBuf, MergeReport)> = Vec::new();
    for source in sources {
        let report = merge_files(file, &source)?;
        reports.push((source, report));
    }

    match format.to_lowercase().as_str() {
        "table" => {
            for (source, report) in &reports {
                println!("Merging {}", source.display());
                println!("{}", report);
                if report.total_added() > 0 {
                    println!();
                    println!("Numbers added:");
                    for number in &report.added {
                        println!(" - {}", number);
                    }
                }
                if report.total_ignored() > 0 {
                    println!();
                    println!("Numbers ignored (already registered):");
                    for number in &report.ignored {
                        println!(" - {}", number);
                    }
                }
                println!();
            }
        }
        "json" => {
            let entries: Vec<serde_json::Value> = reports
                .iter()
                .map(|(source, report)| {
                    serde_json::json!({
                        "source": source.display().to_string(),
                        "total_added": report.total_added(),
                        "total_ignored": report.total_ignored(),
                        "added": report.added,
                        "ignored": report.ignored,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        _ => {
            eprintln!("Unknown format: {}. Supported formats: table, json", format);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn cmd_check(file: &PathBuf) -> rifa_core::Result<()> {
    let store = RaffleStore::open(file)?;
    let report = store.verify()?;

    println!("Checked {} rows.", report.rows);
    if report.is_clean() {
        println!("No problems found.");
        return Ok(());
    }

    if !report.duplicates.is_empty() {
        println!("Duplicate numbers: {}", report.duplicates.join(", "));
    }
    if !report.invalid.is_empty() {
        println!("Non-numeric numbers: {}", report.invalid.join(", "));
    }
    std::process::exit(1)
}

/// Print records as a tab-separated table with the store's column names
fn print_records(records: &[Record]) {
    println!("{}", STORE_HEADER.join("\t"));
    println!("{}", "-".repeat(STORE_HEADER.len() * 12));
    for record in records {
        println!(
            "{}\t{}\t{}\t{}",
            record.number, record.name, record.phone, record.purchased_at
        );
    }
}
