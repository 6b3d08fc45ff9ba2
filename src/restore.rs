//! Restore stage: decompress the chosen dump, recreate the scratch
//! database, and feed the SQL file to the external `mysql` client.
//!
//! The scratch database is dropped and recreated unconditionally every run;
//! it exists only to host one run's restored dump. The external load's exit
//! status is checked and a failure aborts the run — continuing against a
//! half-loaded database would silently produce empty reports.

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use flate2::read::GzDecoder;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::{ConnectOptions, Connection};

use crate::config::Config;
use crate::{AppError, AppResult};

/// Decompress `gz_path` to a sibling path with the `.gz` suffix stripped.
/// The decompressed file is left on disk after the run unless the operator
/// opts into cleanup.
pub fn decompress_dump(gz_path: &Path) -> AppResult<PathBuf> {
    let file_name = gz_path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            AppError::new("RESTORE/DECOMPRESS", "Backup path has no usable file name")
                .with_context("path", gz_path.display().to_string())
        })?;
    let sql_name = file_name.strip_suffix(".gz").unwrap_or(file_name);
    let sql_path = gz_path.with_file_name(sql_name);

    let input = File::open(gz_path).map_err(|err| {
        AppError::from(err)
            .with_context("operation", "open_backup")
            .with_context("path", gz_path.display().to_string())
    })?;
    let output = File::create(&sql_path).map_err(|err| {
        AppError::from(err)
            .with_context("operation", "create_sql_file")
            .with_context("path", sql_path.display().to_string())
    })?;

    let mut decoder = GzDecoder::new(BufReader::new(input));
    let mut writer = BufWriter::new(output);
    io::copy(&mut decoder, &mut writer).map_err(|err| {
        AppError::new("RESTORE/DECOMPRESS", "Failed to decompress backup")
            .with_context("path", gz_path.display().to_string())
            .with_cause(AppError::from(err))
    })?;

    tracing::info!(sql_file = %sql_path.display(), "dump_decompressed");
    Ok(sql_path)
}

/// Drop and recreate the scratch database over an administrative
/// connection. Destructive: any existing database of that name is gone.
pub async fn recreate_scratch_db(config: &Config) -> AppResult<()> {
    crate::config::validate_db_name(&config.scratch_db)?;

    let mut conn = admin_options(config)
        .connect()
        .await
        .map_err(|err| AppError::from(err).with_context("operation", "admin_connect"))?;

    // Identifiers cannot be bound; the name is validated above.
    for stmt in [
        format!("DROP DATABASE IF EXISTS `{}`", config.scratch_db),
        format!("CREATE DATABASE `{}`", config.scratch_db),
    ] {
        sqlx::query(&stmt).execute(&mut conn).await.map_err(|err| {
            AppError::from(err)
                .with_context("operation", "recreate_scratch_db")
                .with_context("database", config.scratch_db.clone())
        })?;
    }

    conn.close()
        .await
        .map_err(|err| AppError::from(err).with_context("operation", "admin_close"))?;

    tracing::info!(database = %config.scratch_db, "scratch_database_recreated");
    Ok(())
}

/// Feed the decompressed dump to the external `mysql` client. The child's
/// exit status decides success; a non-zero status aborts the run.
pub fn load_dump(config: &Config, sql_path: &Path) -> AppResult<()> {
    let input = File::open(sql_path).map_err(|err| {
        AppError::from(err)
            .with_context("operation", "open_sql_file")
            .with_context("path", sql_path.display().to_string())
    })?;

    let status = Command::new("mysql")
        .arg("--host")
        .arg(&config.db_host)
        .arg("--port")
        .arg(config.db_port.to_string())
        .arg("--user")
        .arg(&config.db_user)
        .arg(&config.scratch_db)
        // The password travels via the environment, not argv.
        .env("MYSQL_PWD", &config.db_password)
        .stdin(Stdio::from(input))
        .stdout(Stdio::null())
        .status()
        .map_err(|err| {
            AppError::new("RESTORE/LOAD_FAILED", "Failed to spawn mysql client")
                .with_cause(AppError::from(err))
        })?;

    if !status.success() {
        return Err(
            AppError::new("RESTORE/LOAD_FAILED", "mysql client exited with failure")
                .with_context("status", status.to_string())
                .with_context("path", sql_path.display().to_string()),
        );
    }

    tracing::info!(database = %config.scratch_db, "database_restored");
    Ok(())
}

/// Open the read-only pool scoped to the freshly restored scratch database.
pub async fn connect_scratch(config: &Config) -> AppResult<MySqlPool> {
    let options = admin_options(config).database(&config.scratch_db);
    MySqlPoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .map_err(|err| {
            AppError::from(err)
                .with_context("operation", "connect_scratch")
                .with_context("database", config.scratch_db.clone())
        })
}

fn admin_options(config: &Config) -> MySqlConnectOptions {
    MySqlConnectOptions::new()
        .host(&config.db_host)
        .port(config.db_port)
        .username(&config.db_user)
        .password(&config.db_password)
        .log_statements(log::LevelFilter::Off)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_gz(path: &Path, contents: &[u8]) {
        let file = File::create(path).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(contents).unwrap();
        encoder.finish().unwrap();
    }

    #[test]
    fn decompresses_to_sibling_with_suffix_stripped() {
        let tmp = tempdir().unwrap();
        let gz_path = tmp.path().join("clinic-2024-02-01.sql.gz");
        write_gz(&gz_path, b"CREATE TABLE patient (patient_id INT);\n");

        let sql_path = decompress_dump(&gz_path).unwrap();
        assert_eq!(sql_path, tmp.path().join("clinic-2024-02-01.sql"));
        let contents = std::fs::read_to_string(&sql_path).unwrap();
        assert!(contents.contains("CREATE TABLE patient"));
        // The compressed original stays in place.
        assert!(gz_path.exists());
    }

    #[test]
    fn corrupt_archive_reports_decompress_error() {
        let tmp = tempdir().unwrap();
        let gz_path = tmp.path().join("broken.sql.gz");
        std::fs::write(&gz_path, b"this is not gzip data").unwrap();

        let err = decompress_dump(&gz_path).unwrap_err();
        assert_eq!(err.code(), "RESTORE/DECOMPRESS");
    }

    #[test]
    fn missing_archive_propagates_io_error() {
        let tmp = tempdir().unwrap();
        let err = decompress_dump(&tmp.path().join("absent.sql.gz")).unwrap_err();
        assert!(err.code().starts_with("IO/"));
    }
}
