//! Binary-level tests for the non-interactive surfaces.

#![allow(clippy::panic)]

use assert_cmd::Command;
use predicates::prelude::*;

fn sift() -> Command {
    Command::cargo_bin("sift").unwrap_or_else(|e| panic!("binary missing: {e}"))
}

#[test]
fn test_version_flag() {
    sift()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sift"));
}

#[test]
fn test_filter_prints_ranked_matches() {
    sift()
        .args(["--filter", "abc"])
        .write_stdin("abc\nxaybzc\nnothing\n")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("abc\n"))
        .stdout(predicate::str::contains("xaybzc"))
        .stdout(predicate::str::contains("nothing").not());
}

#[test]
fn test_filter_no_match_exits_one() {
    sift()
        .args(["--filter", "zzz"])
        .write_stdin("aaa\nbbb\n")
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_filter_print0() {
    sift()
        .args(["--filter", "a", "--print0"])
        .write_stdin("alpha\nbeta\n")
        .assert()
        .success()
        .stdout(predicate::eq("alpha\0beta\0"));
}

#[test]
fn test_filter_exact_mode() {
    sift()
        .args(["--filter", "ab", "--exact"])
        .write_stdin("ab\na-b\n")
        .assert()
        .success()
        .stdout(predicate::eq("ab\n"));
}

#[test]
fn test_filter_extended_inversion() {
    sift()
        .args(["--filter", "apple !tart"])
        .write_stdin("apple pie\napple tart\nbanana pie\n")
        .assert()
        .success()
        .stdout(predicate::eq("apple pie\n"));
}

#[test]
fn test_invalid_tiebreak_exits_two() {
    sift()
        .args(["--filter", "a", "--tiebreak", "speed"])
        .write_stdin("a\n")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("tiebreak"));
}

#[test]
fn test_invalid_delimiter_exits_two() {
    sift()
        .args(["--filter", "a", "--delimiter", "["])
        .write_stdin("a\n")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("delimiter"));
}

#[test]
fn test_filter_nth_restricts_match_scope() {
    sift()
        .args(["--filter", "beta", "--nth", "2"])
        .write_stdin("alpha beta\nbeta alpha\n")
        .assert()
        .success()
        .stdout(predicate::eq("alpha beta\n"));
}
