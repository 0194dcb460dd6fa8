use pretty_assertions::assert_eq;
use std::{
    env,
    process::{Command, Output, Stdio},
};

fn bin_path() -> &'static str {
    env!("CARGO_BIN_EXE_sauros")
}

fn root() -> String {
    env::var("CARGO_MANIFEST_DIR").expect("manifest dir not set by cargo")
}

fn run_script(name: &str) -> Output {
    Command::new(bin_path())
        .current_dir(root())
        .arg(format!("tests/scripts/{name}"))
        .env_remove("SAUROS_LOG")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("failed to run sauros")
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn basics_script_prints_expected_values() {
    let output = run_script("basics.saur");
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    assert_eq!(stdout_of(&output), "total 10\n[1 4 9]\nbig small\n3.5\n");
}

#[test]
fn boxes_script_mutates_members_through_methods() {
    let output = run_script("boxes.saur");
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    assert_eq!(stdout_of(&output), "balance 22\ninsufficient funds\n");
}

#[test]
fn concurrency_script_moves_values_between_threads() {
    let output = run_script("concurrency.saur");
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    assert_eq!(stdout_of(&output), "[0 10 20]\nasync 42\nstored\n");
}

#[test]
fn failed_assertion_stops_the_script() {
    let output = run_script("failing_assert.saur");
    assert_eq!(output.status.code(), Some(1));
    assert!(!stdout_of(&output).contains("unreachable"));
    assert!(
        stderr_of(&output).contains("assertion failure: x must be two"),
        "stderr: {}",
        stderr_of(&output)
    );
}

#[test]
fn unbalanced_script_runs_until_end_of_input() {
    let output = run_script("unbalanced.saur");
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stdout_of(&output), "first line runs\n");
    assert!(stderr_of(&output).contains("Unmatched opening bracket"));
}

#[test]
fn missing_script_is_reported() {
    let output = run_script("does_not_exist.saur");
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr_of(&output).contains("Failed to access"));
}
