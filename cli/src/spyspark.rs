//! # `spyspark`: Interactive Axon Console
//!
//! Reads Axon queries from stdin, sends them to the SkySpark host named in
//! `spyspark.cfg` and prints the result.
//!
//! ## Usage
//!
//! ```bash
//! spyspark [--config ./spyspark.cfg] [--format json|csv|zinc]
//!
//! Enter Axon query:
//! >readAll(point and his and siteRef->dis=="Building 77")
//! ```
//!
//! `help` prints the Axon reference and an example, `q` or `quit` exits.
//! A query that matches nothing is reported and the console keeps going.

#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use lib_common::configs::config_sys::{default_config_path, load_sys_config};
use lib_common::loggers::loggerlocal::{LoggerLocal, LoggerLocalOptions};
use lib_common::skyspark::{
    AxonError, AxonQuery, AxonResult, Credential, FileTokenStore, ResultFormat, SkysparkClient,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

const REFERENCE: &str = "https://skyfoundry.com/doc/docSkySpark/Axon";
const SAMPLE: &str = "read(point and siteRef->dis==\"Building 77\" and equipRef->dis==\"AHU-33\" \
and discharge and air and temp and sensor).hisRead(yesterday)";

/// Output representation requested from SkySpark.
#[derive(ValueEnum, Clone, Copy, Debug)]
enum Format {
    /// Parsed into tables (`.hisRead` queries become time series).
    Json,
    /// Raw CSV with glyph fix-ups.
    Csv,
    /// Raw Zinc grid.
    Zinc,
}

/// # Command Line Arguments
#[derive(Parser, Debug)]
#[command(name = "spyspark", about = "Simple console to send Axon queries to SkySpark", version)]
struct Cli {
    /// Path to `spyspark.cfg` (defaults to `$CONFIGS_LOCATION/spyspark.cfg` or `./spyspark.cfg`).
    #[arg(short, long, env = "SPYSPARK_CONFIG")]
    config: Option<PathBuf>,

    /// Result format.
    #[arg(short, long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Lowest log level echoed to the console (0 silly .. 6 fatal).
    #[arg(long, default_value_t = 4)]
    log_level: i64,
}

/// What one line of input asks for.
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Quit,
    Help,
    Skip,
    Query(&'a str),
}

fn parse_command(line: &str) -> Command<'_> {
    let line = line.trim();
    match line.to_lowercase().as_str() {
        "q" | "quit" => Command::Quit,
        "help" => Command::Help,
        "" => Command::Skip,
        _ => Command::Query(line),
    }
}

fn render(result: &AxonResult) -> String {
    match result {
        AxonResult::Csv(text) | AxonResult::Zinc(text) => text.clone(),
        AxonResult::Metadata(meta) => meta.to_string(),
        AxonResult::TimeSeries(ts) => ts.to_string(),
        AxonResult::Both(meta, ts) => format!("{}\n{}", meta, ts),
    }
}

async fn run_query(
    client: &SkysparkClient,
    credential: &mut Credential,
    format: Format,
    text: &str,
) -> lib_common::skyspark::error::Result<AxonResult> {
    match format {
        Format::Json => client.query(credential, text).await,
        Format::Csv | Format::Zinc => {
            let query = AxonQuery::new(text)?;
            let format = match format {
                Format::Csv => ResultFormat::Csv,
                _ => ResultFormat::Zinc,
            };
            client
                .request(credential, &query, format, lib_common::skyspark::ResultKind::Metadata)
                .await
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = cli.config.clone().unwrap_or_else(default_config_path);
    let sys = load_sys_config(&path).with_context(|| format!("Missing or invalid config file {}", path.display()))?;

    let logger = Arc::new(LoggerLocal::new(
        "spyspark".to_string(),
        Some(LoggerLocalOptions::tty_from(cli.log_level)),
    ));
    let store = FileTokenStore::new(&sys.token_file, sys.refresh_command.clone());
    let mut credential = Credential::from_store(Arc::new(store)).context("Cannot obtain a SkySpark token")?;
    let client = SkysparkClient::from_config(&sys, logger);

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        stdout.write_all(b"Enter Axon query:\n>").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_command(&line) {
            Command::Quit => break,
            Command::Skip => continue,
            Command::Help => {
                println!("\nReference: {}\nExample: {}\nEnter 'q' or 'quit' to exit\n", REFERENCE, SAMPLE);
            }
            Command::Query(text) => match run_query(&client, &mut credential, cli.format, text).await {
                Ok(result) => println!("{}", render(&result)),
                Err(AxonError::EmptyResult) => println!("{}\n", AxonError::EmptyResult),
                Err(e) => eprintln!("{}: {}\n", e.label(), e),
            },
        }
    }

    Ok(())
}
