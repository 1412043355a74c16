//! Runs the built `repo-to-repo` binary.

use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// A scratch directory holding a config whose output path lives inside it.
struct TestContext {
    temp_dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    fn write_config(&self, repos: &str) -> std::path::PathBuf {
        let out = self.temp_dir.path().join("repo");
        let text = format!(
            "{{\n  // published here\n  \"path\": {:?},\n  \"repos\": {repos}\n}}\n",
            out.display().to_string()
        );
        let path = self.temp_dir.path().join("config.json");
        std::fs::write(&path, text).expect("failed to write config");
        path
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_repo-to-repo"));
        cmd.current_dir(self.temp_dir.path());
        cmd.env_remove("RUST_LOG");
        cmd.env_remove("pgp_key");
        cmd.env_remove("pgp_key_base64");
        cmd.env_remove("PGP_KEY_FILE");
        cmd
    }

    fn root(&self) -> &Path {
        self.temp_dir.path()
    }
}

#[test]
fn test_help_command() {
    let ctx = TestContext::new();
    let output = ctx.cmd().arg("--help").output().expect("failed to run repo-to-repo");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("--config"));
}

#[test]
fn test_version_command() {
    let ctx = TestContext::new();
    let output = ctx
        .cmd()
        .arg("--version")
        .output()
        .expect("failed to run repo-to-repo");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("repo-to-repo "));
}

#[test]
fn test_missing_config_fails() {
    let ctx = TestContext::new();
    let output = ctx
        .cmd()
        .args(["--config", "nope.json"])
        .output()
        .expect("failed to run repo-to-repo");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("nope.json"));
}

#[test]
fn test_dry_run_lists_targets() {
    let ctx = TestContext::new();
    let config = ctx.write_config(
        r#"[{"owner": "acme", "repo": "tool", "target_binary": "tool", "formats": ["deb"],
            "targets": [{"architecture": "amd64"}, {"architecture": "aarch64"}]}]"#,
    );
    let output = ctx
        .cmd()
        .arg("--config")
        .arg(&config)
        .args(["--dry-run", "--clean"])
        .output()
        .expect("failed to run repo-to-repo");

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.matches("acme/tool").count(), 2);
    assert!(stdout.contains("arm64"));
    assert!(!ctx.root().join("repo").exists());
}

#[test]
fn test_missing_key_fails_before_building() {
    let ctx = TestContext::new();
    let config = ctx.write_config(r#"[{"owner": "acme", "repo": "tool", "target_binary": "tool"}]"#);
    let output = ctx
        .cmd()
        .arg("--config")
        .arg(&config)
        .output()
        .expect("failed to run repo-to-repo");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("No signing key"));
    assert!(!ctx.root().join("repo").exists());
}

#[test]
fn test_bad_timestamp_is_rejected() {
    let ctx = TestContext::new();
    let config = ctx.write_config(r#"[{"owner": "acme", "repo": "tool", "target_binary": "tool"}]"#);
    let output = ctx
        .cmd()
        .arg("--config")
        .arg(&config)
        .args(["--timestamp", "%Q", "--dry-run"])
        .output()
        .expect("failed to run repo-to-repo");
    assert!(!output.status.success());
}
