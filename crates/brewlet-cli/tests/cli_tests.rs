//! End-to-end tests for the brewlet CLI binary.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Test context with an isolated brewlet home
struct TestContext {
    temp_dir: TempDir,
    home: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let home = temp_dir.path().join(".brewlet");
        Self { temp_dir, home }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_brewlet"));
        cmd.env("HOME", self.temp_dir.path());
        cmd.env("BREWLET_HOME", &self.home);
        cmd.env_remove("RUST_LOG");
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.cmd().args(args).output().expect("failed to run brewlet")
    }

    fn write_recipe(&self, name: &str, body: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, body).expect("failed to write recipe");
        path
    }
}

fn bundled_formula() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../formula/pup")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn recipe_for(url: &str) -> String {
    format!(
        r#"
[package]
name = "pup"
version = "0.3.2"

[[variant]]
arch = "amd64"
url = "{url}"
sha1 = "9d5ad4c0b78701b1868094bf630adbbd26ae1698"
"#
    )
}

#[test]
fn test_help_command() {
    let ctx = TestContext::new();
    let output = ctx.run(&["--help"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Usage:"));
}

#[test]
fn test_version_command() {
    let ctx = TestContext::new();
    let output = ctx.run(&["--version"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("brewlet"));
}

#[test]
fn test_info_on_bundled_formula() {
    let ctx = TestContext::new();
    let formula = bundled_formula();
    let output = ctx.run(&["info", formula.to_str().unwrap()]);
    assert!(output.status.success());

    let out = stdout(&output);
    assert!(out.contains("pup"));
    assert!(out.contains("0.3.2"));
    assert!(out.contains("pup_darwin_386.zip"));
    assert!(out.contains("sha1:9d5ad4c0b78701b1868094bf630adbbd26ae1698"));
}

#[test]
fn test_info_json() {
    let ctx = TestContext::new();
    let formula = bundled_formula().join("0.3.2.toml");
    let output = ctx.run(&["info", "--json", formula.to_str().unwrap()]);
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["version"], "0.3.2");
    assert_eq!(value["variants"].as_array().unwrap().len(), 2);
}

#[test]
fn test_versions_lists_history() {
    let ctx = TestContext::new();
    let formula = bundled_formula();
    let output = ctx.run(&["versions", formula.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("0.3.2"));
}

#[test]
fn test_hash_prints_sha1() {
    let ctx = TestContext::new();
    let file = ctx.temp_dir.path().join("abc.txt");
    std::fs::write(&file, b"abc").unwrap();

    let output = ctx.run(&["hash", file.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(stdout(&output).starts_with("sha1:a9993e364706816aba3e25717850c26c9cd0d89d"));
}

#[test]
fn test_dry_run_resolves_without_installing() {
    let ctx = TestContext::new();
    let formula = bundled_formula();
    let output = ctx.run(&[
        "install",
        formula.to_str().unwrap(),
        "--arch",
        "amd64",
        "--dry-run",
    ]);
    assert!(output.status.success());

    let out = stdout(&output);
    assert!(out.contains("pup_darwin_amd64.zip"));
    assert!(!ctx.home.join("bin").join("pup").exists());
}

#[test]
fn test_dry_run_classes_unknown_arch_by_word_size() {
    let ctx = TestContext::new();
    let formula = bundled_formula();
    let plan_for = |arch: &str| {
        let output = ctx.run(&[
            "install",
            formula.to_str().unwrap(),
            "--arch",
            arch,
            "--dry-run",
        ]);
        assert!(output.status.success());
        stdout(&output)
    };

    assert!(plan_for("aarch64").contains("pup_darwin_amd64.zip"));
    assert!(plan_for("armv7").contains("pup_darwin_386.zip"));
}

#[test]
fn test_unsupported_arch_exit_code() {
    let ctx = TestContext::new();
    let recipe = ctx.write_recipe("pup.toml", &recipe_for("https://example.com/pup.zip"));
    let output = ctx.run(&[
        "install",
        recipe.to_str().unwrap(),
        "--arch",
        "armv7",
        "--dry-run",
    ]);
    assert_eq!(output.status.code(), Some(10));
    assert!(String::from_utf8_lossy(&output.stderr).contains("armv7"));
}

#[test]
fn test_invalid_recipe_exit_code() {
    let ctx = TestContext::new();
    let recipe = ctx.write_recipe("pup.toml", &recipe_for("ftp://example.com/pup.zip"));
    let output = ctx.run(&["info", recipe.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_unreachable_artifact_exit_code() {
    let ctx = TestContext::new();
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let recipe = ctx.write_recipe(
        "pup.toml",
        &recipe_for(&format!("http://127.0.0.1:{port}/pup.zip")),
    );
    let target = ctx.temp_dir.path().join("bin");

    let output = ctx
        .cmd()
        .env("BREWLET_FETCH_ATTEMPTS", "1")
        .args([
            "install",
            recipe.to_str().unwrap(),
            "--arch",
            "amd64",
            "--target",
            target.to_str().unwrap(),
        ])
        .output()
        .expect("failed to run brewlet");

    assert_eq!(output.status.code(), Some(11));
    assert!(!target.join("pup").exists());

    // The failure is reported once, by the top-level error line.
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.matches("Download failed").count(), 1, "{stderr}");
    assert!(!stderr.contains('✗'), "{stderr}");
}
