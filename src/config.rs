use std::env;
use std::path::PathBuf;

use crate::{AppError, AppResult};

const DEFAULT_DB_HOST: &str = "localhost";
const DEFAULT_DB_PORT: u16 = 3306;
const DEFAULT_DB_USER: &str = "root";
const DEFAULT_SCRATCH_DB: &str = "billing_analysis";
pub const REPORT_FILE_NAME: &str = "Consolidated_Report.xlsx";

/// Remote destination for the finished workbook (`user@host:dir`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub user: String,
    pub host: String,
    pub dir: String,
}

impl RemoteTarget {
    pub fn destination(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.dir)
    }
}

/// Runtime configuration. Credentials and endpoints are supplied via the
/// environment; nothing secret lives in the source.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_host: String,
    pub db_port: u16,
    pub db_user: String,
    pub db_password: String,
    pub scratch_db: String,
    pub backup_dir: PathBuf,
    /// Explicit workbook path; defaults next to the backups when unset.
    pub output_path: Option<PathBuf>,
    pub sheet_password: String,
    pub remote: Option<RemoteTarget>,
}

impl Config {
    /// Read configuration from `BILLING_*` environment variables.
    ///
    /// `BILLING_DB_PASSWORD` and `BILLING_SHEET_PASSWORD` are required; the
    /// remote target is optional and validated at upload time.
    pub fn from_env() -> AppResult<Self> {
        let db_host = env_or("BILLING_DB_HOST", DEFAULT_DB_HOST);
        let db_port = match env::var("BILLING_DB_PORT") {
            Ok(raw) => raw.parse::<u16>().map_err(|_| {
                AppError::new("CONFIG/INVALID", "BILLING_DB_PORT is not a valid port")
                    .with_context("value", raw.clone())
            })?,
            Err(_) => DEFAULT_DB_PORT,
        };
        let db_user = env_or("BILLING_DB_USER", DEFAULT_DB_USER);
        let db_password = require_env("BILLING_DB_PASSWORD")?;
        let scratch_db = env_or("BILLING_SCRATCH_DB", DEFAULT_SCRATCH_DB);
        validate_db_name(&scratch_db)?;

        let backup_dir = env::var("BILLING_BACKUP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_backup_dir());
        let output_path = env::var("BILLING_OUTPUT").ok().map(PathBuf::from);
        let sheet_password = require_env("BILLING_SHEET_PASSWORD")?;

        let remote = remote_from_env();

        Ok(Config {
            db_host,
            db_port,
            db_user,
            db_password,
            scratch_db,
            backup_dir,
            output_path,
            sheet_password,
            remote,
        })
    }

    /// Where the workbook lands: the explicit output path when one was
    /// given, otherwise `<backup_dir>/Consolidated_Report.xlsx`.
    pub fn effective_output(&self) -> PathBuf {
        self.output_path
            .clone()
            .unwrap_or_else(|| self.backup_dir.join(REPORT_FILE_NAME))
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn require_env(key: &str) -> AppResult<String> {
    env::var(key)
        .ok()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            AppError::new("CONFIG/MISSING", format!("{key} must be set"))
                .with_context("variable", key.to_string())
        })
}

fn remote_from_env() -> Option<RemoteTarget> {
    let user = env::var("BILLING_REMOTE_USER").ok().filter(|v| !v.is_empty())?;
    let host = env::var("BILLING_REMOTE_HOST").ok().filter(|v| !v.is_empty())?;
    let dir = env::var("BILLING_REMOTE_DIR").ok().filter(|v| !v.is_empty())?;
    Some(RemoteTarget { user, host, dir })
}

fn default_backup_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("backup")
}

/// The scratch database name is interpolated into DROP/CREATE statements, so
/// it is restricted to identifier characters.
pub fn validate_db_name(name: &str) -> AppResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(
            AppError::new("CONFIG/INVALID", "Scratch database name is not a valid identifier")
                .with_context("name", name.to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_name_accepts_identifier_characters() {
        assert!(validate_db_name("billing_analysis").is_ok());
        assert!(validate_db_name("scratch2").is_ok());
    }

    #[test]
    fn db_name_rejects_injection_shapes() {
        assert!(validate_db_name("").is_err());
        assert!(validate_db_name("bad-name").is_err());
        assert!(validate_db_name("x; DROP DATABASE y").is_err());
        assert!(validate_db_name("back`tick").is_err());
    }

    #[test]
    fn remote_target_formats_scp_destination() {
        let target = RemoteTarget {
            user: "ops".into(),
            host: "reports.clinic.local".into(),
            dir: "/srv/reports".into(),
        };
        assert_eq!(target.destination(), "ops@reports.clinic.local:/srv/reports");
    }
}
