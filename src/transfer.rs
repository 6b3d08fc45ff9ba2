use std::path::Path;
use std::process::Command;

use crate::config::RemoteTarget;
use crate::{AppError, AppResult};

/// Copy the finished workbook to the remote host with `scp`. Success is
/// decided solely by the child's exit status; there is no retry and no
/// partial-transfer cleanup.
pub fn send_report(path: &Path, target: &RemoteTarget) -> AppResult<()> {
    let destination = target.destination();
    let status = Command::new("scp")
        .arg(path)
        .arg(&destination)
        .status()
        .map_err(|err| {
            AppError::new("TRANSFER/FAILED", "Failed to spawn scp")
                .with_context("destination", destination.clone())
                .with_cause(AppError::from(err))
        })?;

    if status.success() {
        tracing::info!(destination = %destination, "report_transferred");
        Ok(())
    } else {
        Err(
            AppError::new("TRANSFER/FAILED", "scp exited with failure")
                .with_context("destination", destination)
                .with_context("status", status.to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_failure_surfaces_transfer_error() {
        // Point the transfer at a workbook path that scp cannot read; with
        // scp missing from PATH this is a spawn error, with scp present it
        // is a non-zero exit. Either way the code is TRANSFER/FAILED.
        let target = RemoteTarget {
            user: "nobody".into(),
            host: "invalid.host.invalid".into(),
            dir: "/nonexistent".into(),
        };
        let err = send_report(Path::new("/definitely/missing/report.xlsx"), &target);
        match err {
            Err(e) => assert_eq!(e.code(), "TRANSFER/FAILED"),
            Ok(_) => panic!("transfer of a missing file cannot succeed"),
        }
    }
}
