//! Clinic billing backup analysis pipeline.
//!
//! One linear run: locate the newest compressed dump, restore it into a
//! scratch database, run the analytical query battery, format the results,
//! write the protected workbook, and ship it to the remote host.

use serde::Serialize;

pub mod config;
pub mod error;
pub mod format;
pub mod locator;
pub mod report;
pub mod restore;
pub mod table;
pub mod transfer;
pub mod window;
pub mod workbook;

pub use error::{AppError, AppResult};

use config::Config;
use window::ReportingWindow;
use workbook::{SheetSpec, SummaryAppendix};

/// Install the tracing subscriber for the CLI. Idempotent; later calls are
/// no-ops.
pub fn init_logging() {
    let _ = tracing_log::LogTracer::init();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("BILLING_ANALYSIS_LOG")
                .unwrap_or_else(|_| "billing_analysis=info,sqlx=warn".into()),
        )
        .with_target(true)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .try_init();
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Build the workbook but skip the scp stage.
    pub skip_upload: bool,
    /// Delete the decompressed SQL file after a successful load.
    pub remove_sql: bool,
}

/// What one pipeline run produced.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub backup_file: String,
    pub sql_file: String,
    pub workbook_path: String,
    pub window: String,
    pub sheets: usize,
    pub returning_patients: i64,
    pub transferred: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_error: Option<AppError>,
}

/// Execute the whole pipeline once.
pub async fn run(config: &Config, options: &RunOptions) -> AppResult<RunSummary> {
    let window = ReportingWindow::current();
    tracing::info!(window = %window.window_label(), "run_started");

    let backup = locator::latest_backup(&config.backup_dir)?;
    tracing::info!(backup = %backup.display(), "backup_selected");

    let sql_path = restore::decompress_dump(&backup)?;
    restore::recreate_scratch_db(config).await?;
    restore::load_dump(config, &sql_path)?;
    if options.remove_sql {
        if let Err(err) = std::fs::remove_file(&sql_path) {
            tracing::warn!(error = %err, path = %sql_path.display(), "failed_to_remove_sql_file");
        }
    }

    let pool = restore::connect_scratch(config).await?;
    let battery = report::run_battery(&pool, &window).await;
    pool.close().await;
    let mut bundle = battery?;

    format::format_bundle(&mut bundle);

    let output = config.effective_output();
    let label = window.window_label();
    let sheets = vec![
        SheetSpec {
            name: "Registered Patients",
            table: &bundle.registered_patients,
            appendix: None,
        },
        SheetSpec {
            name: "Order Entries",
            table: &bundle.order_entries,
            appendix: Some(SummaryAppendix {
                distribution: &bundle.returning_distribution,
                frequency: &bundle.returning_frequency,
                window_label: &label,
            }),
        },
        SheetSpec {
            name: "Registered Patient Age Groups",
            table: &bundle.age_groups,
            appendix: None,
        },
        SheetSpec {
            name: "Service Profits By Age Group",
            table: &bundle.service_profits,
            appendix: None,
        },
        SheetSpec {
            name: "Popular Services",
            table: &bundle.popular_services,
            appendix: None,
        },
        SheetSpec {
            name: "Services Used Per Month",
            table: &bundle.services_per_month,
            appendix: None,
        },
        SheetSpec {
            name: "Drugs Overview",
            table: &bundle.drugs_overview,
            appendix: None,
        },
        SheetSpec {
            name: "Patient Payment Mix",
            table: &bundle.payment_mix,
            appendix: None,
        },
        SheetSpec {
            name: "Daily Collections",
            table: &bundle.daily_collections,
            appendix: None,
        },
        SheetSpec {
            name: "Daily Visits",
            table: &bundle.daily_visits,
            appendix: None,
        },
    ];
    let sheet_count = sheets.len();
    workbook::write_workbook(&output, &sheets, &config.sheet_password)?;

    let mut transferred = false;
    let mut transfer_error = None;
    if options.skip_upload {
        tracing::info!("upload_skipped");
    } else if let Some(target) = &config.remote {
        match transfer::send_report(&output, target) {
            Ok(()) => transferred = true,
            Err(err) => {
                tracing::error!(error = %err, "transfer_failed");
                transfer_error = Some(err);
            }
        }
    } else {
        tracing::warn!("no_remote_target_configured");
    }

    Ok(RunSummary {
        backup_file: backup.display().to_string(),
        sql_file: sql_path.display().to_string(),
        workbook_path: output.display().to_string(),
        window: label,
        sheets: sheet_count,
        returning_patients: bundle.returning_total,
        transferred,
        transfer_error,
    })
}
