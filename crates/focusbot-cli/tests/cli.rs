use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A `focusbot` command isolated from the caller's config files and secrets.
fn focusbot(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("focusbot").unwrap();
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env_remove("XDG_CONFIG_HOME")
        .env_remove("TELEGRAM_BOT_TOKEN")
        .env_remove("OPENAI_API_KEY")
        .env_remove("GOOGLE_ACCESS_TOKEN")
        .env_remove("FOCUSBOT_UTC_OFFSET")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    let home = TempDir::new().unwrap();
    focusbot(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check-config"))
        .stdout(predicate::str::contains("run"));
}

#[test]
fn test_check_config_fails_without_token() {
    let home = TempDir::new().unwrap();
    focusbot(&home)
        .arg("check-config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("TELEGRAM_BOT_TOKEN not set"));
}

#[test]
fn test_check_config_redacts_secrets() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("focusbot.yaml");
    fs::write(
        &path,
        "telegram:\n  bot_token: 987654:VERY-SECRET-TOKEN\nretention:\n  max_keep: 50\n",
    )
    .unwrap();

    focusbot(&home)
        .args(["check-config", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("9876****"))
        .stdout(predicate::str::contains("50"))
        .stdout(predicate::str::contains("VERY-SECRET-TOKEN").not());
}

#[test]
fn test_check_config_reads_token_from_environment() {
    let home = TempDir::new().unwrap();
    focusbot(&home)
        .arg("check-config")
        .env("TELEGRAM_BOT_TOKEN", "111222:FROM-ENVIRONMENT")
        .assert()
        .success()
        .stdout(predicate::str::contains("defaults + environment"))
        .stdout(predicate::str::contains("1112****"));
}

#[test]
fn test_check_config_rejects_bad_offset() {
    let home = TempDir::new().unwrap();
    focusbot(&home)
        .arg("check-config")
        .env("TELEGRAM_BOT_TOKEN", "111222:FROM-ENVIRONMENT")
        .env("FOCUSBOT_UTC_OFFSET", "Asia/Kolkata")
        .assert()
        .failure()
        .stderr(predicate::str::contains("UTC offset"));
}
