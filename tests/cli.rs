use assert_cmd::Command;
use tempfile::tempdir;

fn base_command() -> Command {
    let mut cmd = Command::cargo_bin("billing-analysis").expect("binary builds");
    for key in [
        "BILLING_DB_HOST",
        "BILLING_DB_PORT",
        "BILLING_DB_USER",
        "BILLING_DB_PASSWORD",
        "BILLING_SCRATCH_DB",
        "BILLING_BACKUP_DIR",
        "BILLING_OUTPUT",
        "BILLING_SHEET_PASSWORD",
        "BILLING_REMOTE_USER",
        "BILLING_REMOTE_HOST",
        "BILLING_REMOTE_DIR",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

#[test]
fn help_lists_pipeline_flags() {
    let output = base_command().arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--backup-dir"), "unexpected help: {stdout}");
    assert!(stdout.contains("--skip-upload"), "unexpected help: {stdout}");
}

#[test]
fn missing_secrets_fail_before_any_side_effect() {
    let output = base_command().output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("CONFIG/MISSING"), "unexpected stderr: {stderr}");
}

#[test]
fn empty_backup_dir_exits_with_not_found() {
    let tmp = tempdir().unwrap();
    let output = base_command()
        .env("BILLING_DB_PASSWORD", "test-password")
        .env("BILLING_SHEET_PASSWORD", "test-sheet")
        .arg("--backup-dir")
        .arg(tmp.path())
        .arg("--skip-upload")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("BACKUP/NOT_FOUND"),
        "unexpected stderr: {stderr}"
    );
}
