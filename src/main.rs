use std::path::PathBuf;
use std::process;

use clap::Parser;

use billing_analysis::config::Config;
use billing_analysis::{AppResult, RunOptions, RunSummary};

#[derive(Debug, Parser)]
#[command(
    name = "billing-analysis",
    about = "Restore the latest clinic backup and build the billing report",
    version
)]
struct Cli {
    /// Directory scanned for compressed dump files
    #[arg(long, value_name = "PATH")]
    backup_dir: Option<PathBuf>,

    /// Database server host
    #[arg(long)]
    db_host: Option<String>,

    /// Database server port
    #[arg(long)]
    db_port: Option<u16>,

    /// Administrative database user
    #[arg(long)]
    db_user: Option<String>,

    /// Name of the scratch database to drop and recreate
    #[arg(long)]
    scratch_db: Option<String>,

    /// Workbook output path
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Delete the decompressed SQL file after a successful load
    #[arg(long)]
    remove_sql: bool,

    /// Build the workbook but do not upload it
    #[arg(long)]
    skip_upload: bool,

    /// Emit a machine-readable JSON run summary
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    billing_analysis::init_logging();

    let cli = Cli::parse();
    match execute(cli).await {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("Error: {err}");
            process::exit(1);
        }
    }
}

async fn execute(cli: Cli) -> AppResult<i32> {
    let mut config = Config::from_env()?;
    if let Some(dir) = cli.backup_dir {
        config.backup_dir = dir;
    }
    if let Some(host) = cli.db_host {
        config.db_host = host;
    }
    if let Some(port) = cli.db_port {
        config.db_port = port;
    }
    if let Some(user) = cli.db_user {
        config.db_user = user;
    }
    if let Some(name) = cli.scratch_db {
        config.scratch_db = name;
    }
    if cli.output.is_some() {
        config.output_path = cli.output;
    }

    let options = RunOptions {
        skip_upload: cli.skip_upload,
        remove_sql: cli.remove_sql,
    };

    let summary = billing_analysis::run(&config, &options).await?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(0)
}

fn print_summary(summary: &RunSummary) {
    println!("Using backup file: {}", summary.backup_file);
    println!("Reporting window: {}", summary.window);
    println!(
        "Consolidated report saved: {} ({} sheets)",
        summary.workbook_path, summary.sheets
    );
    if summary.transferred {
        println!("Report sent to remote server");
    } else if let Some(err) = &summary.transfer_error {
        println!("Failed to send the report: {}", err.message());
    } else {
        println!("Upload skipped.");
    }
}
