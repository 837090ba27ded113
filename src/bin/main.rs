//! Tablestream CLI - Stream a file into the worker and page through it
//!
//! Usage:
//!   tablestream view <file.csv> [--page-len <n>] [--no-header]
//!   tablestream view <file.csv> --filter city=London
//!   tablestream distinct <file.csv> --column city
//!
//! Examples:
//!   tablestream view data/cities.csv
//!   tablestream view data/cities.csv --filter country=FR --page-len 50

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use tablestream::config::Settings;
use tablestream::engine::MemoryEngine;
use tablestream::{IngestSession, WorkerClient};

#[derive(Parser)]
#[command(name = "tablestream")]
#[command(about = "Tablestream - stream files into a columnar worker and query them")]
#[command(version)]
struct Cli {
    /// Path to a tablestream.toml config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a file and print its header and first page
    View {
        /// Path to the input file
        file: PathBuf,

        /// Rows per page
        #[arg(short, long)]
        page_len: Option<usize>,

        /// Treat the file as headerless
        #[arg(long)]
        no_header: bool,

        /// Derive and page a filtered source, e.g. --filter city=London
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Ingest a file and print the distinct values of one column
    Distinct {
        /// Path to the input file
        file: PathBuf,

        /// Column to enumerate
        #[arg(short, long)]
        column: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::load_or_default(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::View {
            file,
            page_len,
            no_header,
            filter,
        } => view(&settings, file, page_len, no_header, filter).await,
        Commands::Distinct { file, column } => distinct(&settings, file, &column).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn ingest(
    client: &WorkerClient,
    settings: &Settings,
    file: &PathBuf,
    header_row: bool,
) -> Result<tablestream::IngestOutcome, Box<dyn std::error::Error>> {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    let reader = tokio::fs::File::open(file).await?;

    let mut session = IngestSession::new(client, 0, name, settings);
    if !header_row {
        session = session.without_header_row();
    }
    Ok(session.run(reader).await?)
}

async fn view(
    settings: &Settings,
    file: PathBuf,
    page_len: Option<usize>,
    no_header: bool,
    filter: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = WorkerClient::spawn(MemoryEngine::new(), settings);
    let page_len = page_len.unwrap_or(settings.protocol.page_len);

    let outcome = ingest(&client, settings, &file, !no_header).await?;
    println!("header: {}", outcome.header.join(", "));

    let (target, label) = match filter {
        Some(expr) => {
            let (column, value) = expr
                .split_once('=')
                .ok_or("filter must look like column=value")?;
            let (id, names) = client
                .apply_filter(outcome.table_id, column.trim(), value.trim().as_bytes())
                .await?;
            let label = names.get(id as usize).cloned().unwrap_or_default();
            (id, label)
        }
        None => {
            let names = client.list_names().await?;
            let label = names
                .get(outcome.table_id as usize)
                .cloned()
                .unwrap_or_default();
            (outcome.table_id, label)
        }
    };

    println!("source: {label}");
    for row in client.fetch_chunk(target, 0, page_len).await? {
        println!("{}", row.join(" | "));
    }
    Ok(())
}

async fn distinct(
    settings: &Settings,
    file: PathBuf,
    column: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = WorkerClient::spawn(MemoryEngine::new(), settings);
    let outcome = ingest(&client, settings, &file, true).await?;

    for value in client.distinct(outcome.table_id, column).await? {
        println!("{value}");
    }
    Ok(())
}
