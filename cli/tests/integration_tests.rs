use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

const BIN: &str = env!("CARGO_BIN_EXE_lexpm");

fn lexpm(dir: &Path, args: &[&str]) -> Output {
    Command::new(BIN)
        .env_remove("RUST_LOG")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .expect("failed to run lexpm")
}

fn lexpm_with_input(dir: &Path, args: &[&str], input: &str) -> Output {
    let mut child = Command::new(BIN)
        .env_remove("RUST_LOG")
        .arg("-C")
        .arg(dir)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to run lexpm");
    child
        .stdin
        .take()
        .expect("stdin is piped")
        .write_all(input.as_bytes())
        .expect("failed to write stdin");
    child.wait_with_output().expect("failed to wait for lexpm")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Project with an initialized manifest, two local schemas and network-free
/// resolver configuration.
fn local_project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let out = lexpm(dir.path(), &["init", "--client"]);
    assert!(out.status.success(), "init failed: {}", stderr(&out));

    fs::write(dir.path().join(".lexpm.yml"), "fallback_registries: [local]\n").unwrap();
    let schemas = dir.path().join("lexicons/com/example");
    fs::create_dir_all(&schemas).unwrap();
    fs::write(
        schemas.join("foo.json"),
        r#"{
  "lexicon": 1,
  "id": "com.example.foo",
  "defs": {
    "main": {
      "type": "record",
      "key": "tid",
      "record": {
        "type": "object",
        "properties": { "bar": { "type": "ref", "ref": "com.example.bar" } }
      }
    }
  }
}
"#,
    )
    .unwrap();
    fs::write(
        schemas.join("bar.json"),
        r#"{
  "lexicon": 1,
  "id": "com.example.bar",
  "defs": {
    "main": { "type": "object", "properties": { "text": { "type": "string" } } }
  }
}
"#,
    )
    .unwrap();
    dir
}

fn manifest(dir: &Path) -> serde_json::Value {
    let text = fs::read_to_string(dir.join("lexpm.json")).expect("manifest should exist");
    serde_json::from_str(&text).unwrap()
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

#[test]
fn init_writes_manifest_once() {
    let dir = tempfile::tempdir().unwrap();

    let out = lexpm(dir.path(), &["init", "--client", "--server"]);
    assert!(out.status.success());
    assert!(stdout(&out).contains("Wrote to"));
    let written = manifest(dir.path());
    assert_eq!(written["apiTypes"]["TSClient"], "./src/lexicon/client");
    assert_eq!(written["apiTypes"]["TSServer"], "./src/lexicon/server");
    assert_eq!(written["schemaDir"], "./lexicons");

    let again = lexpm(dir.path(), &["init"]);
    assert!(!again.status.success());
    assert!(stderr(&again).contains("already exists"));
}

#[test]
fn init_single_target_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let out = lexpm(dir.path(), &["init", "--server"]);
    assert!(out.status.success());
    assert_eq!(manifest(dir.path())["apiTypes"]["TSServer"], "./src/lexicon");
}

#[test]
fn commands_require_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let out = lexpm(dir.path(), &["install", "-y"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("lexpm init"));
}

// ---------------------------------------------------------------------------
// add / install / remove
// ---------------------------------------------------------------------------

#[test]
fn add_local_installs_schema_and_client() {
    let dir = local_project();

    let out = lexpm(dir.path(), &["add", "-y", "local:com.example.foo"]);
    assert!(out.status.success(), "add failed: {}", stderr(&out));
    let text = stdout(&out);
    assert!(text.contains(" + com.example.foo: local"), "stdout: {text}");
    assert!(text.contains("Done!"), "stdout: {text}");
    assert_eq!(manifest(dir.path())["lexicons"]["com.example.foo"], "local");

    let module = fs::read_to_string(dir.path().join("src/client/lexicons.ts")).unwrap();
    assert!(module.contains("ComExampleFoo: 'com.example.foo'"));
    assert!(module.contains("ComExampleBar: 'com.example.bar'"));
    assert!(dir.path().join("src/client/index.ts").exists());

    let second = lexpm(dir.path(), &["install", "-y"]);
    assert!(second.status.success());
    let text = stdout(&second);
    assert!(!text.contains("Changes to"), "second install should change nothing: {text}");
    assert!(text.contains("Done!"));
}

#[test]
fn declining_confirmation_aborts_cleanly() {
    let dir = local_project();
    let out = lexpm(dir.path(), &["add", "-y", "local:com.example.bar"]);
    assert!(out.status.success());
    fs::remove_dir_all(dir.path().join("src")).unwrap();

    let out = lexpm_with_input(dir.path(), &["install"], "n\n");
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.contains("[+ add] lexicons.ts"), "stdout: {text}");
    assert!(text.contains("Aborted."), "stdout: {text}");
    assert!(!dir.path().join("src").exists());
}

#[test]
fn unknown_registry_is_a_diagnostic() {
    let dir = local_project();
    let out = lexpm(dir.path(), &["add", "-y", "gitlab:com.example.foo"]);
    assert!(out.status.success());
    assert!(stderr(&out).contains("unknown registry type: gitlab"));
    assert_eq!(manifest(dir.path())["lexicons"], serde_json::json!({}));
}

#[test]
fn remove_prunes_manifest_and_schema_tree() {
    let dir = local_project();
    assert!(lexpm(dir.path(), &["add", "-y", "local:com.example.foo"]).status.success());

    let out = lexpm(dir.path(), &["remove", "-y", "com.example.foo", "com.example.none"]);
    assert!(out.status.success());
    assert!(stdout(&out).contains(" - com.example.foo: local"));
    assert!(stderr(&out).contains("com.example.none is not in lexicons"));
    assert_eq!(manifest(dir.path())["lexicons"], serde_json::json!({}));
    assert!(!dir.path().join("lexicons/com/example/foo.json").exists());
}

#[test]
fn unresolvable_dependency_does_not_fail_install() {
    let dir = local_project();
    fs::remove_file(dir.path().join("lexicons/com/example/bar.json")).unwrap();

    let out = lexpm(dir.path(), &["add", "-y", "local:com.example.foo"]);
    assert!(out.status.success());
    let err = stderr(&out);
    assert!(err.contains("com.example.bar could not be loaded in any registry:"), "stderr: {err}");
    assert!(err.contains("  local: failed to read"), "stderr: {err}");
    assert_eq!(err.matches("com.example.bar").count(), 1, "diagnostic printed more than once: {err}");
    assert!(dir.path().join("src/client/lexicons.ts").exists());
}

#[test]
fn invalid_dependency_reports_each_offending_path() {
    let dir = local_project();
    fs::write(
        dir.path().join("lexicons/com/example/bar.json"),
        r#"{
  "lexicon": 1,
  "id": "com.example.bar",
  "defs": {
    "main": { "type": "object", "properties": { "x": { "type": "query" }, "y": { "type": "token" } } }
  }
}
"#,
    )
    .unwrap();

    let out = lexpm(dir.path(), &["add", "-y", "local:com.example.foo"]);
    assert!(out.status.success());
    let err = stderr(&out);
    assert!(err.contains("com.example.bar could not be loaded in any registry:"), "stderr: {err}");
    assert!(err.contains("/defs/main/properties/x"), "stderr: {err}");
    assert!(err.contains("/defs/main/properties/y"), "stderr: {err}");
}

#[test]
fn unknown_output_target_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("lexpm.json"), r#"{"apiTypes": {"TSWeb": "./web"}}"#).unwrap();
    let out = lexpm(dir.path(), &["install", "-y"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).starts_with("error: "));
}
