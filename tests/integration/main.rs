//! Integration tests for scriptrun

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// Command isolated from the user's config and cache
    fn scriptrun(home: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("scriptrun");
        cmd.env_remove("SCRIPTRUN_CONFIG")
            .env_remove("SCRIPTRUN_CACHE_DIR")
            .arg("--config")
            .arg(home.join("config.toml"))
            .arg("--cache-dir")
            .arg(home.join("cache"));
        cmd
    }

    fn resolved_path(home: &Path, origin: &str) -> PathBuf {
        let output = scriptrun(home)
            .args(["resolve", origin])
            .output()
            .unwrap();
        assert!(output.status.success());
        PathBuf::from(String::from_utf8(output.stdout).unwrap().trim())
    }

    fn write_config(home: &Path, body: &str) {
        std::fs::write(home.join("config.toml"), body).unwrap();
    }

    #[test]
    fn help_displays() {
        let home = TempDir::new().unwrap();
        scriptrun(home.path())
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("content-addressed cache"));
    }

    #[test]
    fn version_displays() {
        let home = TempDir::new().unwrap();
        scriptrun(home.path())
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("scriptrun"));
    }

    #[test]
    fn resolve_literal_is_stable() {
        let home = TempDir::new().unwrap();
        let first = resolved_path(home.path(), "println(\"hi\")");
        let second = resolved_path(home.path(), "println(\"hi\")");

        assert_eq!(first, second);
        let name = first.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("scriptlet."));
        assert!(name.ends_with(".kts"));
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "println(\"hi\")");
    }

    #[test]
    fn resolve_file_url() {
        let home = TempDir::new().unwrap();
        let script = home.path().join("Tool.kt");
        std::fs::write(&script, "fun main() {}").unwrap();

        let path = resolved_path(home.path(), &format!("file://{}", script.display()));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("url."));
        assert!(name.ends_with(".kt"));
    }

    #[test]
    fn exec_propagates_exit_code() {
        let home = TempDir::new().unwrap();
        scriptrun(home.path())
            .args(["exec", "--", "sh", "-c", "echo hi; echo warn >&2; exit 3"])
            .assert()
            .code(3)
            .stdout(predicate::str::contains("hi"))
            .stderr(predicate::str::contains("warn"));
    }

    #[test]
    fn exec_json_output() {
        let home = TempDir::new().unwrap();
        let output = scriptrun(home.path())
            .args(["exec", "--format", "json", "--", "sh", "-c", "echo out"])
            .output()
            .unwrap();
        assert!(output.status.success());

        let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(value["exit_code"], 0);
        assert_eq!(value["stdout"], "out");
        assert_eq!(value["command"][0], "sh");
    }

    #[test]
    fn exec_missing_executable() {
        let home = TempDir::new().unwrap();
        scriptrun(home.path())
            .args(["exec", "--", "scriptrun-no-such-tool"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to spawn"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn exec_timeout() {
        let home = TempDir::new().unwrap();
        scriptrun(home.path())
            .args(["exec", "--timeout", "1", "--", "sleep", "30"])
            .timeout(std::time::Duration::from_secs(20))
            .assert()
            .failure()
            .stderr(predicate::str::contains("timed out"));
    }

    #[test]
    fn exec_timeout_kills_whole_command_line() {
        let home = TempDir::new().unwrap();
        let start = std::time::Instant::now();
        scriptrun(home.path())
            .args(["exec", "--timeout", "1", "--"])
            .args(["sh", "-c", "echo started; sleep 30; echo after"])
            .timeout(std::time::Duration::from_secs(20))
            .assert()
            .failure()
            .stdout(predicate::str::contains("started"))
            .stdout(predicate::str::contains("after").not());
        assert!(start.elapsed() < std::time::Duration::from_secs(10));
    }

    #[test]
    fn exec_json_timeout_prints_partial_result() {
        let home = TempDir::new().unwrap();
        let output = scriptrun(home.path())
            .args(["exec", "--format", "json", "--timeout", "1", "--"])
            .args(["sh", "-c", "echo started; sleep 30"])
            .timeout(std::time::Duration::from_secs(20))
            .output()
            .unwrap();

        assert!(!output.status.success());
        let partial: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(partial["stdout"], "started");
        assert_eq!(partial["exit_code"], -1);
        assert!(String::from_utf8_lossy(&output.stderr).contains("timed out"));
    }

    #[test]
    fn relative_cache_dir_in_config_file() {
        let home = TempDir::new().unwrap();
        write_config(home.path(), "[cache]\ndir = \"from-config\"\n");

        let mut cmd = cargo_bin_cmd!("scriptrun");
        cmd.env_remove("SCRIPTRUN_CACHE_DIR")
            .env("SCRIPTRUN_CONFIG", home.path().join("config.toml"))
            .args(["cache", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains(
                home.path().join("from-config").to_str().unwrap(),
            ));
    }

    #[test]
    fn run_literal_with_configured_interpreter() {
        let home = TempDir::new().unwrap();
        write_config(home.path(), "[interpreters]\nkts = [\"sh\"]\n");

        scriptrun(home.path())
            .args(["run", "echo \"got $1\"", "hello"])
            .assert()
            .success()
            .stdout(predicate::str::contains("got hello"));
    }

    #[test]
    fn run_without_interpreter() {
        let home = TempDir::new().unwrap();
        scriptrun(home.path())
            .args(["run", "--ext", "zz", "whatever"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No interpreter configured for .zz"));
    }

    #[test]
    fn cache_list_empty() {
        let home = TempDir::new().unwrap();
        scriptrun(home.path())
            .args(["cache", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cached scripts"));
    }

    #[test]
    fn cache_list_plain_after_resolve() {
        let home = TempDir::new().unwrap();
        let path = resolved_path(home.path(), "println(1)");

        scriptrun(home.path())
            .args(["cache", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains(path.display().to_string()));
    }

    #[test]
    fn cache_verify_flags_tampering() {
        let home = TempDir::new().unwrap();
        let path = resolved_path(home.path(), "println(2)");

        scriptrun(home.path())
            .args(["cache", "verify"])
            .assert()
            .success();

        std::fs::write(&path, "println(3)").unwrap();
        scriptrun(home.path())
            .args(["cache", "verify"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("do not match"));
    }

    #[test]
    fn cache_clear_empties_directory() {
        let home = TempDir::new().unwrap();
        resolved_path(home.path(), "println(4)");

        scriptrun(home.path())
            .args(["cache", "clear"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Removed 1"));
        assert_eq!(std::fs::read_dir(home.path().join("cache")).unwrap().count(), 0);
    }

    #[test]
    fn cache_path_honours_flag() {
        let home = TempDir::new().unwrap();
        scriptrun(home.path())
            .args(["cache", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("cache"));
    }
}
