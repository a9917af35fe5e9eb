//! Basic CLI E2E tests.
//!
//! Tests invoke CLI commands via cargo run and verify outputs. Each test uses
//! its own data directory through RAMADAN_ALARM_HOME.

use std::path::Path;
use std::process::Command;

/// Run a CLI command against `home` and return (stdout, stderr, exit code).
fn run_cli(home: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new("cargo")
        .args(["run", "-q", "-p", "ramadan-alarm-cli", "--"])
        .args(args)
        .env("RAMADAN_ALARM_HOME", home)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_ok(home: &Path, args: &[&str]) -> String {
    let (stdout, stderr, code) = run_cli(home, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    stdout
}

fn alarms(home: &Path) -> Vec<serde_json::Value> {
    let stdout = run_ok(home, &["alarm", "list"]);
    serde_json::from_str(&stdout).expect("alarm list prints JSON")
}

#[test]
fn test_fresh_install_lists_default_alarms() {
    let home = tempfile::tempdir().unwrap();
    let list = alarms(home.path());
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["type"], "sehri");
    assert_eq!(list[1]["type"], "iftar");
}

#[test]
fn test_alarm_add_and_remove() {
    let home = tempfile::tempdir().unwrap();
    let stdout = run_ok(
        home.path(),
        &[
            "alarm", "add", "custom", "--time", "07:30", "--label", "Wake", "--days", "Mon,Fri",
            "--id", "wake",
        ],
    );
    assert!(stdout.contains("Alarm saved: wake"));

    let list = alarms(home.path());
    let wake = list.iter().find(|a| a["id"] == "wake").unwrap();
    assert_eq!(wake["time"], "07:30");
    assert_eq!(wake["days"], serde_json::json!(["Mon", "Fri"]));
    assert_eq!(wake["ringtone"], "default");

    run_ok(home.path(), &["alarm", "remove", "wake"]);
    assert!(alarms(home.path()).iter().all(|a| a["id"] != "wake"));
}

#[test]
fn test_custom_alarm_requires_time() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["alarm", "add", "custom"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("--time"));
}

#[test]
fn test_invalid_time_is_rejected() {
    let home = tempfile::tempdir().unwrap();
    let (_, _, code) = run_cli(home.path(), &["alarm", "add", "custom", "--time", "7:30"]);
    assert_ne!(code, 0);
}

#[test]
fn test_remove_unknown_alarm_fails() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["alarm", "remove", "missing"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("not found"));
}

#[test]
fn test_disable_and_enable() {
    let home = tempfile::tempdir().unwrap();
    let stdout = run_ok(home.path(), &["alarm", "disable", "1"]);
    assert!(stdout.contains("inactive"));
    assert_eq!(alarms(home.path())[0]["active"], false);

    let stdout = run_ok(home.path(), &["alarm", "enable", "1"]);
    assert!(stdout.contains(r#""status": "armed""#));
    assert_eq!(alarms(home.path())[0]["active"], true);
}

#[test]
fn test_alarm_without_days_reports_no_eligible_day() {
    let home = tempfile::tempdir().unwrap();
    let stdout = run_ok(home.path(), &["alarm", "edit", "2", "--days", ""]);
    assert!(stdout.contains("no_eligible_day"));
}

#[test]
fn test_alarm_next() {
    let home = tempfile::tempdir().unwrap();
    let stdout = run_ok(home.path(), &["alarm", "next"]);
    let rows: Vec<serde_json::Value> = serde_json::from_str(&stdout).unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r["status"] == "armed"));
}

#[test]
fn test_times_json() {
    let home = tempfile::tempdir().unwrap();
    let stdout = run_ok(
        home.path(),
        &["times", "--days", "3", "--from", "2025-03-01", "--json"],
    );
    let rows: Vec<serde_json::Value> = serde_json::from_str(&stdout).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["date"], "2025-03-01");
    assert_eq!(rows[0]["sehri"], "05:05");
    assert_eq!(rows[0]["iftar"], "18:10");
}

#[test]
fn test_times_from_timetable_file() {
    let home = tempfile::tempdir().unwrap();
    let file = home.path().join("ramadan.json");
    std::fs::write(
        &file,
        r#"{ "2025-03-01": { "Fajr": "05:02", "Maghrib": "18:21" } }"#,
    )
    .unwrap();
    let stdout = run_ok(
        home.path(),
        &[
            "times", "--days", "2", "--from", "2025-03-01", "--json", "--timetable",
            file.to_str().unwrap(),
        ],
    );
    let rows: Vec<serde_json::Value> = serde_json::from_str(&stdout).unwrap();
    assert_eq!(rows[0]["sehri"], "04:52");
    assert_eq!(rows[0]["iftar"], "18:21");
    // Not covered by the file: built-in times.
    assert_eq!(rows[1]["iftar"], "18:10");
}

#[test]
fn test_times_all_lists_every_prayer() {
    let home = tempfile::tempdir().unwrap();
    let stdout = run_ok(
        home.path(),
        &["times", "--all", "--days", "2", "--from", "2025-03-01", "--json"],
    );
    let rows: Vec<serde_json::Value> = serde_json::from_str(&stdout).unwrap();
    assert_eq!(rows.len(), 2);
    let prayers = rows[0]["prayers"].as_array().unwrap();
    let names: Vec<&str> = prayers.iter().map(|p| p["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["Fajr", "Sunrise", "Dhuhr", "Asr", "Maghrib", "Isha"]);
    assert_eq!(prayers[4]["time"], "18:10");
}

#[test]
fn test_times_next_prayer() {
    let home = tempfile::tempdir().unwrap();
    let stdout = run_ok(home.path(), &["times", "--next", "--json"]);
    let next: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let name = next["name"].as_str().unwrap();
    assert!(["Fajr", "Sunrise", "Dhuhr", "Asr", "Maghrib", "Isha"].contains(&name));

    let (_, _, code) = run_cli(home.path(), &["times", "--next", "--all"]);
    assert_ne!(code, 0);
}

#[test]
fn test_config_rejects_huge_grace_window() {
    let home = tempfile::tempdir().unwrap();
    let (_, _, code) = run_cli(
        home.path(),
        &["config", "set", "schedule.grace_window_secs", "18446744073709551615"],
    );
    assert_eq!(code, 1);
    run_ok(home.path(), &["alarm", "list"]);
}

#[test]
fn test_ringtone_list_and_default() {
    let home = tempfile::tempdir().unwrap();
    let stdout = run_ok(home.path(), &["ringtone", "list"]);
    assert!(stdout.contains("adhan1"));

    let (_, _, code) = run_cli(home.path(), &["ringtone", "set-default", "nope"]);
    assert_eq!(code, 1);

    run_ok(home.path(), &["ringtone", "set-default", "adhan2"]);
    let stdout = run_ok(home.path(), &["config", "get", "notifications.default_ringtone"]);
    assert_eq!(stdout.trim(), "adhan2");

    run_ok(home.path(), &["alarm", "add", "iftar", "--id", "i2"]);
    let list = alarms(home.path());
    let i2 = list.iter().find(|a| a["id"] == "i2").unwrap();
    assert_eq!(i2["ringtone"], "adhan2");
}

#[test]
fn test_config_get_set() {
    let home = tempfile::tempdir().unwrap();
    let stdout = run_ok(home.path(), &["config", "get", "schedule.grace_window_secs"]);
    assert_eq!(stdout.trim(), "300");

    run_ok(home.path(), &["config", "set", "schedule.sehri_offset_min", "20"]);
    let stdout = run_ok(home.path(), &["config", "list"]);
    assert!(stdout.contains("schedule.sehri_offset_min = 20"));

    let (_, _, code) = run_cli(home.path(), &["config", "set", "schedule.nope", "1"]);
    assert_eq!(code, 1);

    run_ok(home.path(), &["config", "reset"]);
    let stdout = run_ok(home.path(), &["config", "get", "schedule.sehri_offset_min"]);
    assert_eq!(stdout.trim(), "10");
}

#[test]
fn test_completions() {
    let home = tempfile::tempdir().unwrap();
    let stdout = run_ok(home.path(), &["completions", "bash"]);
    assert!(stdout.contains("ramadan-alarm"));
}
