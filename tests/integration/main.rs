//! Integration tests for splitcast

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;

    fn splitcast() -> Command {
        cargo_bin_cmd!("splitcast")
    }

    #[test]
    fn help_displays() {
        splitcast()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("monorepo split publisher"));
    }

    #[test]
    fn version_displays() {
        splitcast()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("splitcast"));
    }

    #[test]
    fn missing_config_fails_with_hint() {
        let dir = tempfile::tempdir().unwrap();
        splitcast()
            .current_dir(dir.path())
            .assert()
            .failure()
            .stderr(predicate::str::contains("Configuration file not found"))
            .stderr(predicate::str::contains(".splitcast.yml"));
    }

    #[test]
    fn invalid_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".splitcast.yml"), "splits: 42\n").unwrap();

        splitcast()
            .current_dir(dir.path())
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn config_flag_overrides_default_path() {
        let dir = tempfile::tempdir().unwrap();
        splitcast()
            .current_dir(dir.path())
            .args(["--config", "custom.yml"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("custom.yml"));
    }
}

mod sync_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::Path;

    fn git(dir: &Path, args: &[&str]) -> String {
        let output = std::process::Command::new("git")
            .arg("-C")
            .arg(dir)
            .args([
                "-c",
                "user.name=test",
                "-c",
                "user.email=test@localhost",
            ])
            .args(args)
            .output()
            .expect("git is available");
        assert!(
            output.status.success(),
            "git {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    /// Stand-in splitter: resolves the origin reference inside the
    /// mirror, so the "split" result is the source commit itself.
    fn install_stub_splitter(dir: &Path) {
        let script = "#!/bin/sh\n\
            path=\"\"; origin=\"\"\n\
            while [ $# -gt 0 ]; do\n\
              case \"$1\" in\n\
                --path) path=\"$2\"; shift 2;;\n\
                --origin) origin=\"$2\"; shift 2;;\n\
                --prefix) shift 2;;\n\
                *) shift;;\n\
              esac\n\
            done\n\
            git --git-dir=\"$path\" rev-parse \"$origin\"\n";
        let path = dir.join("splitsh-lite");
        std::fs::write(&path, script).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
    }

    struct Project {
        dir: tempfile::TempDir,
    }

    impl Project {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path();

            let project = root.join("proj");
            std::fs::create_dir(&project).unwrap();
            git(&project, &["init", "-b", "main"]);
            std::fs::create_dir_all(project.join("lib")).unwrap();
            std::fs::write(project.join("lib/foo.txt"), "1").unwrap();
            git(&project, &["add", "."]);
            git(&project, &["commit", "-m", "initial"]);

            let target = root.join("target.git");
            std::fs::create_dir(&target).unwrap();
            git(&target, &["init", "--bare"]);

            install_stub_splitter(root);

            std::fs::write(
                root.join(".splitcast.yml"),
                format!(
                    "cache_url: {}\nproject_url: {}\nsplits:\n  - prefix: lib\n    target: {}\n",
                    root.join("cache").display(),
                    project.display(),
                    target.display(),
                ),
            )
            .unwrap();

            Self { dir }
        }

        fn command(&self) -> Command {
            let path = format!(
                "{}:{}",
                self.dir.path().display(),
                std::env::var("PATH").unwrap_or_default()
            );
            let mut command = cargo_bin_cmd!("splitcast");
            command.current_dir(self.dir.path()).env("PATH", path);
            command
        }

        fn target_head(&self) -> String {
            git(&self.dir.path().join("target.git"), &["rev-parse", "refs/heads/main"])
        }
    }

    #[test]
    fn splits_and_publishes_to_target() {
        let project = Project::new();

        project
            .command()
            .assert()
            .success()
            .stdout(predicate::str::contains("Splitting"));

        let source = git(&project.dir.path().join("proj"), &["rev-parse", "HEAD"]);
        assert_eq!(project.target_head(), source);
    }

    #[test]
    fn second_run_reuses_the_cache() {
        let project = Project::new();

        project.command().assert().success();
        project
            .command()
            .arg("-v")
            .assert()
            .success()
            .stdout(predicate::str::contains("Already split"));
    }

    #[test]
    fn ref_whitelist_excludes_other_references() {
        let project = Project::new();

        project
            .command()
            .args(["--ref", "other"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Splitting").not());
    }
}
