use std::fs;
use std::path::PathBuf;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;

/// Write a program to a unique temp file and return its path.
fn fixture(name: &str, src: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("okto-{name}-{}.okto", std::process::id()));
    fs::write(&path, src).unwrap();
    path
}

#[test]
fn runs_without_arguments() {
    let mut cmd = Command::cargo_bin("okto").unwrap();
    cmd.assert().success();
}

#[test]
fn run_reports_machine_state() {
    let path = fixture("add", "mov A, 05H\nmov B, 03H\nadd A, B\n");
    Command::cargo_bin("okto")
        .unwrap()
        .args(["run"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("REGS:  A=08H B=03H I=00H PC=05H"))
        .stdout(predicate::str::contains(
            "FLAGS: OF=0 CF=0 ZF=0 PF=0 SF=0",
        ));
    fs::remove_file(path).unwrap();
}

#[test]
fn bare_path_runs_the_file() {
    let path = fixture("bare", "mov A, 2AH\n");
    Command::cargo_bin("okto")
        .unwrap()
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("A=2AH"));
    fs::remove_file(path).unwrap();
}

#[test]
fn dump_shows_memory_and_ascii() {
    let path = fixture("dump", "mov I, 10H\nmov A, 48H\nmov [I], A\n");
    Command::cargo_bin("okto")
        .unwrap()
        .args(["run", "--dump", "10H-10H"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("DUMP: 10H:48H"))
        .stdout(predicate::str::contains("ASCII: H"));
    fs::remove_file(path).unwrap();
}

#[test]
fn invalid_dump_range_fails() {
    let path = fixture("badrange", "nop\n");
    Command::cargo_bin("okto")
        .unwrap()
        .args(["run", "--dump", "nonsense"])
        .arg(&path)
        .assert()
        .failure();
    fs::remove_file(path).unwrap();
}

#[test]
fn listing_is_written_to_file() {
    let path = fixture("listing", "START: mov A, 05H\nnop\n");
    let out = std::env::temp_dir().join(format!("okto-listing-{}.lst", std::process::id()));
    Command::cargo_bin("okto")
        .unwrap()
        .args(["run", "--listing"])
        .arg(&out)
        .arg(&path)
        .assert()
        .success();
    let listing = fs::read_to_string(&out).unwrap();
    assert!(listing.contains("00H B6H 05H       START: mov A, 05H"));
    assert!(listing.contains("02H FFH           nop"));
    fs::remove_file(path).unwrap();
    fs::remove_file(out).unwrap();
}

#[test]
fn check_accepts_valid_program() {
    let path = fixture("valid", "LOOP: dec A\njz END\njmp LOOP\nEND: nop\n");
    Command::cargo_bin("okto")
        .unwrap()
        .args(["check"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("no errors found!"));
    fs::remove_file(path).unwrap();
}

#[test]
fn check_rejects_undefined_label() {
    let path = fixture("undef", "jmp NOWHERE\n");
    Command::cargo_bin("okto")
        .unwrap()
        .args(["check"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("NOWHERE"));
    fs::remove_file(path).unwrap();
}

#[test]
fn check_rejects_unknown_mnemonic() {
    let path = fixture("mnem", "frobnicate A, B\n");
    Command::cargo_bin("okto")
        .unwrap()
        .args(["check"])
        .arg(&path)
        .assert()
        .failure();
    fs::remove_file(path).unwrap();
}

#[test]
fn missing_file_fails() {
    Command::cargo_bin("okto")
        .unwrap()
        .args(["run", "/nonexistent/file.okto"])
        .assert()
        .failure();
}
