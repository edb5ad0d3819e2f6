#[cfg(test)]
mod tests {
    use assert_cmd::Command;
    use predicates::prelude::*;
    use std::io::Write;

    fn cli() -> Command {
        let mut cmd = Command::cargo_bin("mastodon_upgrade").unwrap();
        cmd.env_remove("MASTODON_UPGRADE_WORKING_DIR")
            .env_remove("MASTODON_UPGRADE_INSTANCE_URL");
        cmd
    }

    fn config_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_help_lists_subcommands() {
        cli()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("upgrade"))
            .stdout(predicate::str::contains("pending-migrations"));
    }

    #[test]
    fn test_version_flag() {
        cli()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("mastodon_upgrade"));
    }

    #[test]
    fn test_missing_subcommand_is_usage_error() {
        cli().assert().failure().code(2);
    }

    #[test]
    fn test_malformed_config_is_fatal() {
        let config = config_file("working_dir = [unterminated");
        cli()
            .arg("--config")
            .arg(config.path())
            .arg("services")
            .assert()
            .failure()
            .code(1)
            .stderr(predicate::str::contains("Fatal error"));
    }

    #[test]
    fn test_unknown_config_key_is_fatal() {
        let config = config_file("colour = \"blue\"\n");
        cli()
            .arg("--config")
            .arg(config.path())
            .arg("detect")
            .assert()
            .failure()
            .code(1);
    }

    #[test]
    fn test_invalid_migration_version_is_rejected() {
        cli()
            .args(["migrate-one", "latest"])
            .assert()
            .failure()
            .code(1)
            .stderr(predicate::str::contains("Invalid arguments"));
    }

    #[test]
    fn test_action_on_unknown_service_is_refused() {
        let config = config_file("");
        cli()
            .arg("--config")
            .arg(config.path())
            .args(["services", "stop", "nginx"])
            .assert()
            .failure()
            .code(1)
            .stdout(predicate::str::contains("not a configured service"));
    }

    #[test]
    fn test_detect_outside_repository_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_file("");
        cli()
            .arg("--config")
            .arg(config.path())
            .arg("--working-dir")
            .arg(dir.path())
            .arg("detect")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Command 'detect' failed"));
    }
}
