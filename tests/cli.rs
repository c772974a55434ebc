use std::fs;

use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};
use tempfile::tempdir;

fn write_roster(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("students.csv");
    fs::write(&path, "NOMBRE,PARALELO,AUTOESTIMA\nAna Ruiz,A,80\nBeto Paz,B,30\n")
        .expect("write roster");
    path
}

#[test]
fn probe_reports_inferred_types() {
    let dir = tempdir().unwrap();
    let input = write_roster(dir.path());
    Command::cargo_bin("csv-inquire")
        .unwrap()
        .args(["probe", "-i"])
        .arg(&input)
        .assert()
        .success()
        .stdout(contains("AUTOESTIMA").and(contains("numeric")));
}

#[test]
fn ask_renders_grouped_average_table() {
    let dir = tempdir().unwrap();
    let input = write_roster(dir.path());
    Command::cargo_bin("csv-inquire")
        .unwrap()
        .args(["ask", "average of AUTOESTIMA by PARALELO", "-i"])
        .arg(&input)
        .assert()
        .success()
        .stdout(contains("PARALELO").and(contains("80")));
}

#[test]
fn ask_json_emits_a_well_formed_envelope() {
    let dir = tempdir().unwrap();
    let input = write_roster(dir.path());
    let output = Command::cargo_bin("csv-inquire")
        .unwrap()
        .args(["ask", "top 1 highest AUTOESTIMA", "--json", "-i"])
        .arg(&input)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let envelope: serde_json::Value = serde_json::from_slice(&output).expect("valid JSON");
    assert_eq!(envelope["ok"], true);
    assert_eq!(envelope["tables"][0]["rows"][0][0], "Ana Ruiz");
}

#[test]
fn ask_with_missing_file_still_answers() {
    Command::cargo_bin("csv-inquire")
        .unwrap()
        .args(["ask", "show 3 rows", "-i", "no-such-file.csv"])
        .assert()
        .success()
        .stdout(contains("No data is available"));
}
