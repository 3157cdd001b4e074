//! End-to-end engine scenarios: documents loaded through the public API and
//! provisioned against an in-memory channel.

mod common;

use std::fs;
use std::path::Path;

use common::ScriptedConnection;
use purser::error::PurserResult;
use purser::{read_file, read_str, LoadOptions, Logger, Resource};
use sha2::{Digest, Sha256};

fn digest(prev: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev.as_bytes());
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn shell_hash(prev: &str, script: &str) -> String {
    digest(prev, &format!("set -e\n{script}\n"))
}

const THREE_STEP_DOC: &str = "# Resource: Web [web]\n\n\
## Package: Main [main]\n\n    echo foo\n\n    echo bar\n\n    echo baz\n";

fn three_hashes() -> (String, String, String) {
    let a = shell_hash("", "echo foo");
    let b = shell_hash(&a, "echo bar");
    let c = shell_hash(&b, "echo baz");
    (a, b, c)
}

fn load(doc: &str) -> Resource {
    read_str("test.prd", doc, Path::new("."), &LoadOptions::default()).unwrap()
}

/// Load `doc`, prepare against the scripted channel and provision.
fn provision(
    doc: &str,
    state: &str,
    failures: &[bool],
) -> (Resource, ScriptedConnection, PurserResult<()>) {
    let mut res = load(doc);
    let conn = ScriptedConnection::with_failures(state, failures);
    res.with_connection(Box::new(conn.clone()));

    let logger = Logger::discard();
    res.prepare(&logger).unwrap();
    let outcome = res.provision(&logger);
    (res, conn, outcome)
}

#[test]
fn fresh_target_executes_every_step() {
    let (a, b, c) = three_hashes();
    let (_res, conn, outcome) = provision(THREE_STEP_DOC, "", &[]);

    assert!(outcome.is_ok());
    assert_eq!(conn.exec_cmds().len(), 3);
    assert_eq!(conn.written_states(), vec![format!("+{a}\n+{b}\n+{c}\n")]);
}

#[test]
fn partially_applied_target_resumes_after_cached_prefix() {
    let (a, b, c) = three_hashes();
    let (_res, conn, outcome) = provision(THREE_STEP_DOC, &format!("+{a}\n"), &[]);

    assert!(outcome.is_ok());
    assert_eq!(conn.exec_cmds().len(), 2);
    assert_eq!(conn.exec_bodies()[0], "set -e\necho bar\n");
    assert_eq!(conn.written_states(), vec![format!(".{a}\n+{b}\n+{c}\n")]);
}

#[test]
fn fully_applied_target_executes_nothing_and_writes_no_state() {
    let (a, b, c) = three_hashes();
    let (res, conn, outcome) = provision(THREE_STEP_DOC, &format!(".{a}\n.{b}\n.{c}\n"), &[]);

    assert!(outcome.is_ok());
    assert!(conn.exec_cmds().is_empty());
    assert!(conn.written_states().is_empty());
    assert_eq!(res.packages[0].state().len(), 3);
}

#[test]
fn persisted_markers_are_ignored_when_comparing_hashes() {
    let (a, b, c) = three_hashes();
    let (_res, conn, outcome) = provision(THREE_STEP_DOC, &format!("+{a}\n.{b}\n+{c}\n"), &[]);

    assert!(outcome.is_ok());
    assert!(conn.exec_cmds().is_empty());
}

#[test]
fn appended_steps_execute_from_the_first_missing_index() {
    let (a, b, c) = three_hashes();
    let (_res, conn, outcome) = provision(THREE_STEP_DOC, &format!("+{a}\n+{b}\n"), &[]);

    assert!(outcome.is_ok());
    assert_eq!(conn.exec_cmds().len(), 1);
    assert_eq!(conn.written_states(), vec![format!(".{a}\n.{b}\n+{c}\n")]);
}

#[test]
fn persisted_failure_tokens_are_not_cache_entries() {
    let (a, _b, _c) = three_hashes();
    let (_res, conn, outcome) = provision(THREE_STEP_DOC, &format!("-{a}\n"), &[]);

    assert!(outcome.is_ok());
    assert_eq!(conn.exec_cmds().len(), 3);
}

#[test]
fn corrupt_state_lines_fail_the_prepare_phase() {
    let mut res = load(THREE_STEP_DOC);
    let conn = ScriptedConnection::new("~bogus\n");
    res.with_connection(Box::new(conn));

    let err = res.prepare(&Logger::discard()).unwrap_err();
    assert!(err.to_string().contains("invalid status token"));
}

const TWO_PACKAGE_DOC: &str = "# Resource: Web [web]\n\n\
## Package: Main [main]\n\n    echo foo\n\n    echo bar\n\n    echo baz\n\n\
## Package: Second [second]\n\n    echo second\n";

#[test]
fn step_failure_truncates_state_and_aborts_remaining_packages() {
    let (a, b, _c) = three_hashes();
    // step 0 is cached; the first executed command (step 1) fails
    let (res, conn, outcome) = provision(TWO_PACKAGE_DOC, &format!("+{a}\n"), &[true]);

    assert!(outcome.is_err());
    assert_eq!(conn.exec_cmds().len(), 1);
    assert_eq!(conn.written_states(), vec![format!(".{a}\n-{b}\n")]);
    assert_eq!(res.packages[0].state().len(), 2);
}

#[test]
fn rerun_after_failure_resumes_at_the_failed_step() {
    let (a, b, c) = three_hashes();
    let (_res, first_conn, outcome) = provision(THREE_STEP_DOC, &format!("+{a}\n"), &[true]);
    assert!(outcome.is_err());

    // second invocation reads the truncated state the failed run persisted
    let persisted = first_conn.written_states()[0].clone();
    let (_res, conn, outcome) = provision(THREE_STEP_DOC, &persisted, &[]);

    assert!(outcome.is_ok());
    assert_eq!(conn.exec_cmds().len(), 2);
    assert_eq!(conn.written_states(), vec![format!(".{a}\n+{b}\n+{c}\n")]);
}

#[test]
fn state_is_persisted_through_a_timestamped_file_and_symlink_flip() {
    let (_res, conn, outcome) = provision(THREE_STEP_DOC, "", &[]);

    assert!(outcome.is_ok());
    let cmd = &conn.write_cmds()[0];
    assert!(cmd.contains("ln -sf /var/lib/purser/main."), "got: {cmd}");
    assert!(cmd.contains(" /var/lib/purser/main.log"), "got: {cmd}");
    assert!(cmd.contains("cat - > /var/lib/purser/main."), "got: {cmd}");
}

#[test]
fn prepare_yields_identical_hash_chains_for_identical_documents() {
    let (res1, _c1, _o1) = provision(THREE_STEP_DOC, "", &[]);
    let (res2, _c2, _o2) = provision(THREE_STEP_DOC, "", &[]);
    assert_eq!(res1.packages[0].step_hashes(), res2.packages[0].step_hashes());
}

#[test]
fn changing_an_upstream_step_invalidates_everything_downstream() {
    let changed_first = THREE_STEP_DOC.replace("echo foo", "echo changed");
    let (base, _c1, _o1) = provision(THREE_STEP_DOC, "", &[]);
    let (head, _c2, _o2) = provision(&changed_first, "", &[]);

    let base_hashes = base.packages[0].step_hashes();
    let head_hashes = head.packages[0].step_hashes();
    assert_ne!(base_hashes[0], head_hashes[0]);
    assert_ne!(base_hashes[1], head_hashes[1]);
    assert_ne!(base_hashes[2], head_hashes[2]);

    let changed_last = THREE_STEP_DOC.replace("echo baz", "echo changed");
    let (tail, _c3, _o3) = provision(&changed_last, "", &[]);
    let tail_hashes = tail.packages[0].step_hashes();
    assert_eq!(base_hashes[0], tail_hashes[0]);
    assert_eq!(base_hashes[1], tail_hashes[1]);
    assert_ne!(base_hashes[2], tail_hashes[2]);
}

#[test]
fn resource_attributes_win_over_package_attributes_at_prepare() {
    let doc = "# Resource: Web [web]\n\n> Greeting: from_resource\n\n\
## Package: Main [main]\n\n> Greeting: from_package\n> Extra: x\n\n    echo {{ Greeting }} {{ Extra }}\n";
    let (_res, conn, outcome) = provision(doc, "", &[]);

    assert!(outcome.is_ok());
    assert_eq!(conn.exec_bodies()[0], "set -e\necho from_resource x\n");
}

#[test]
fn hostname_attribute_is_available_to_scripts() {
    let doc = "# Resource: Web [web]\n\n\
## Package: Main [main]\n\n    echo {{ Hostname }}\n";
    let (_res, conn, _outcome) = provision(doc, "", &[]);
    assert_eq!(conn.exec_bodies()[0], "set -e\necho web\n");
}

#[test]
fn injected_secrets_always_reexecute_and_stay_out_of_rendered_scripts() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(".passwords"), "db_root: hunter2\n").unwrap();
    fs::write(
        dir.path().join("host.prd"),
        "# Resource: Db [db]\n\n\
         ## Package: Main [main]\n\n    :inject_passwords db_root\n\n    echo {{ PASSWORD_db_root }}\n",
    )
    .unwrap();

    let opts = LoadOptions {
        credentials_file: dir.path().join(".passwords"),
        default_username: None,
    };
    let mut res = read_file(&dir.path().join("host.prd"), &opts).unwrap();

    let inject_hash = digest("", "hunter2");
    let shell_hash = digest(
        &inject_hash,
        "set -e\necho $(grep db_root /tmp/purser/passwords | cut -f2)\n",
    );

    // fully cached state: the injector still re-executes, and forces the
    // following step with it
    let state = format!(".{inject_hash}\n.{shell_hash}\n");
    let conn = ScriptedConnection::new(&state);
    res.with_connection(Box::new(conn.clone()));

    let logger = Logger::discard();
    res.prepare(&logger).unwrap();
    res.provision(&logger).unwrap();

    assert_eq!(conn.exec_cmds().len(), 2);
    assert_eq!(conn.exec_bodies()[0], "db_root\thunter2\n");
    // the rendered script holds the lookup expression, not the raw secret
    assert!(conn.exec_bodies()[1].contains("$(grep db_root"));
    assert!(!conn.exec_bodies()[1].contains("hunter2"));
    assert_eq!(
        conn.written_states(),
        vec![format!("+{inject_hash}\n+{shell_hash}\n")]
    );
}

#[test]
fn write_file_streams_content_and_applies_ownership() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("motd"), "welcome\n").unwrap();
    fs::write(
        dir.path().join("host.prd"),
        "# Resource: Web [web]\n\n\
         ## Package: Main [main]\n\n    :write_file motd /etc/motd root 0644\n",
    )
    .unwrap();

    let mut res = read_file(&dir.path().join("host.prd"), &LoadOptions::default()).unwrap();
    let conn = ScriptedConnection::new("");
    res.with_connection(Box::new(conn.clone()));

    let logger = Logger::discard();
    res.prepare(&logger).unwrap();
    res.provision(&logger).unwrap();

    let cmd = &conn.exec_cmds()[0];
    assert!(cmd.contains("cat - > /etc/motd"), "got: {cmd}");
    assert!(cmd.contains("chown root /etc/motd"), "got: {cmd}");
    assert!(cmd.contains("chmod 0644 /etc/motd"), "got: {cmd}");
    assert_eq!(conn.exec_bodies()[0], "welcome\n");
}

#[test]
fn included_packages_use_dot_joined_ids_in_remote_paths() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("base.prt"),
        "# Template: Base [base]\n\n## Package: One [one]\n\n    echo one\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("host.prd"),
        "# Resource: Host [host]\n\n## Include: base.prt [inc]\n",
    )
    .unwrap();

    let mut res = read_file(&dir.path().join("host.prd"), &LoadOptions::default()).unwrap();
    assert_eq!(res.packages[0].id, "inc.one");

    let conn = ScriptedConnection::new("");
    res.with_connection(Box::new(conn.clone()));
    let logger = Logger::discard();
    res.prepare(&logger).unwrap();
    res.provision(&logger).unwrap();

    assert!(conn.write_cmds()[0].contains("/var/lib/purser/inc.one."));
}

#[test]
fn undefined_template_reference_fails_before_any_execution() {
    let doc = "# Resource: Web [web]\n\n\
## Package: Main [main]\n\n    echo {{ Missing }}\n";
    let mut res = load(doc);
    let conn = ScriptedConnection::new("");
    res.with_connection(Box::new(conn.clone()));

    let err = res.prepare(&Logger::discard()).unwrap_err();
    assert!(
        err.to_string().contains("failed to render main_0"),
        "got: {err}"
    );
    assert!(conn.exec_cmds().is_empty());
}
