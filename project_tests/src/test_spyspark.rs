//! # SkySpark Live Smoke Test
//!
//! Runs against the host configured in `spyspark.cfg`: reads point metadata,
//! pulls yesterday's history of the first point and runs the raw interval
//! analysis on it.

use clap::Parser;
use lib_common::configs::config_sys::{default_config_path, load_sys_config};
use lib_common::loggers::loggerlocal::LoggerLocal;
use lib_common::skyspark::analysis::raw_analysis;
use lib_common::skyspark::query::point_ref;
use lib_common::skyspark::{AxonQuery, Credential, FileTokenStore, HisRange, SkysparkClient};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(about = "Live smoke test of the SkySpark client")]
struct Args {
    /// Path to `spyspark.cfg`.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Filter used to select points.
    #[arg(long, default_value = "point and his")]
    filter: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();
    let logger = Arc::new(LoggerLocal::new("spyspark_test".to_string(), None));

    let path = args.config.unwrap_or_else(default_config_path);
    let sys = load_sys_config(&path)?;
    println!("{}", sys);

    let store = FileTokenStore::new(&sys.token_file, sys.refresh_command.clone());
    let mut credential = Credential::from_store(Arc::new(store))?;
    let client = SkysparkClient::from_config(&sys, Arc::clone(&logger));

    println!("[*] Reading points matching `{}`...", args.filter);
    let meta = client
        .read_all(&mut credential, &AxonQuery::read_all_expr(&args.filter)?)
        .await?;
    println!("[SUCCESS] {} points, {} tag columns", meta.len(), meta.columns().len());

    let Some(first_id) = meta.ids().into_iter().next() else {
        eprintln!("[ERROR] No point ids returned");
        std::process::exit(1);
    };

    let query = AxonQuery::read_all_expr(&format!("id==@{}", point_ref(&first_id)))?.his_read(&HisRange::Yesterday);
    println!("[*] {}", query);
    match client.his_read(&mut credential, &query).await {
        Ok(table) => {
            println!("-----------------------------------------------");
            println!("{}", table);
            println!("-----------------------------------------------");
            if let Some(column) = table.columns().first() {
                if let Some(analysis) = raw_analysis(&table, column) {
                    println!(
                        "[INFO] timestamps consistent: {}, pulses consistent: {}, reindexed: {}",
                        analysis.timestamps_consistent,
                        analysis.pulses_consistent,
                        analysis.reindexed()
                    );
                }
            }
        }
        Err(e) => {
            eprintln!("\n[ERROR] History read failed:");
            eprintln!(">>> {}: {}", e.label(), e);
            std::process::exit(1);
        }
    }

    println!("[INFO] Token refreshes during run: {}", credential.refresh_count());
    Ok(())
}
