use assert_cmd::Command;
use predicates::prelude::*;

fn cli() -> Command {
    Command::cargo_bin("gix-protocol-v2").unwrap()
}

#[test]
fn ls_refs_request_is_written_to_stdout() {
    cli()
        .args(["ls-refs-request", "--symrefs", "--ref-prefix", "refs/heads/"])
        .args(["--capability", "agent=git/2.45.0"])
        .assert()
        .success()
        .stdout(&b"0014command=ls-refs\n0015agent=git/2.45.0\n0001000bsymrefs001aref-prefix refs/heads/0000"[..]);
}

#[test]
fn fetch_request_ends_with_done() {
    cli()
        .args(["fetch-request", "--want", "1234", "--ofs-delta"])
        .assert()
        .success()
        .stdout(&b"0012command=fetch\n0001000dofs-delta000dwant 12340008done0000"[..]);
}

#[test]
fn fetch_request_with_wait_for_done() {
    cli()
        .args(["fetch-request", "--want", "1234", "--wait-for-done"])
        .assert()
        .success()
        .stdout(&b"0012command=fetch\n00010011wait-for-done000dwant 12340008done0000"[..]);
}

#[test]
fn fetch_request_needs_a_want() {
    cli().arg("fetch-request").assert().failure();
}

#[test]
fn invalid_capability_is_rejected() {
    cli()
        .args(["ls-refs-request", "--capability", "=value"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid capability"));
}

#[test]
fn capabilities_are_listed() {
    cli()
        .arg("capabilities")
        .write_stdin(&b"000eversion 2\n0013ls-refs=unborn\n0012server-option\n0000"[..])
        .assert()
        .success()
        .stdout("ls-refs=unborn\nserver-option\n");
}

#[test]
fn references_are_listed() {
    cli()
        .arg("ls-refs")
        .write_stdin(&b"002eunborn HEAD symref-target:refs/heads/main\n0000"[..])
        .assert()
        .success()
        .stdout("unborn HEAD symref-target:refs/heads/main\n");
}

#[test]
fn fetch_writes_pack_to_stdout_and_progress_to_stderr() {
    cli()
        .arg("fetch")
        .write_stdin(&b"000dpackfile\n0011\x02Counting: 1\n0009\x01PACK0000"[..])
        .assert()
        .success()
        .stdout("PACK")
        .stderr(predicate::str::contains("Counting: 1"));
}

#[test]
fn fetch_reports_remote_errors() {
    cli()
        .arg("fetch")
        .write_stdin(&b"000dpackfile\n000f\x03fatal: xyz"[..])
        .assert()
        .failure()
        .stderr(predicate::str::contains("fatal: xyz"));
}

#[test]
fn fetch_summarizes_negotiation() {
    cli()
        .arg("fetch")
        .write_stdin(&b"0014acknowledgments\n0008NAK\n0000"[..])
        .assert()
        .success()
        .stdout("")
        .stderr(predicate::str::contains("NAK").and(predicate::str::contains("negotiation continues")));
}
