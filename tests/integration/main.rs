//! Integration tests for Toolscope

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn toolscope(top: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("toolscope");
        cmd.current_dir(top)
            .env_remove("TOOLSCOPE_CACHE")
            .env_remove("TOOLSCOPE_DEBUG")
            .env_remove("TOOLSCOPE_CONFIG");
        cmd
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn library_project() -> TempDir {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "build.toml", "global_tools = [\"gcc\"]\n");
        write(temp.path(), "app/build.toml", "link = [\"util\"]\n");
        write(
            temp.path(),
            "util/build.toml",
            "[[library]]\nname = \"util\"\nsources = [\"util.c\"]\n",
        );
        temp
    }

    #[test]
    fn help_displays() {
        let temp = TempDir::new().unwrap();
        toolscope(temp.path())
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("scoped tool registry"));
    }

    #[test]
    fn version_displays() {
        let temp = TempDir::new().unwrap();
        toolscope(temp.path())
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("toolscope"));
    }

    #[test]
    fn probe_missing_command_on_search_path() {
        let temp = TempDir::new().unwrap();
        toolscope(temp.path())
            .args(["probe", "--search-path"])
            .arg(temp.path())
            .args(["--", "pkgtool", "--version"])
            .assert()
            .success()
            .stdout(predicate::str::contains("status: -1"));
    }

    #[cfg(unix)]
    #[test]
    fn probe_runs_command() {
        let temp = TempDir::new().unwrap();
        toolscope(temp.path())
            .args(["probe", "--", "/bin/sh", "-c", "echo -lz"])
            .assert()
            .success()
            .stdout(predicate::str::contains("status: 0").and(predicate::str::contains("-lz")));
    }

    #[test]
    fn generate_without_project_files() {
        let temp = TempDir::new().unwrap();
        toolscope(temp.path())
            .arg("generate")
            .assert()
            .success()
            .stdout(predicate::str::contains("No build.toml files found"));
    }

    #[test]
    fn generate_links_registered_library() {
        let temp = library_project();
        toolscope(temp.path())
            .args(["generate", "--format", "json"])
            .assert()
            .success()
            .stdout(
                predicate::str::contains("\"dir\": \"app\"")
                    .and(predicate::str::contains("util/libutil.a"))
                    .and(predicate::str::contains("\"gcc\"")),
            );
    }

    #[test]
    fn generate_with_top_flag() {
        let temp = library_project();
        let elsewhere = TempDir::new().unwrap();
        toolscope(elsewhere.path())
            .arg("-C")
            .arg(temp.path())
            .args(["generate", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("util:"));
    }

    #[test]
    fn generate_unknown_tool_fails_with_hint() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "build.toml", "tools = [\"nonesuch\"]\n");
        toolscope(temp.path())
            .arg("generate")
            .assert()
            .failure()
            .stderr(
                predicate::str::contains("Tool not found: nonesuch")
                    .and(predicate::str::contains("Hint:")),
            );
    }

    #[test]
    fn generate_invalid_project_file() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "build.toml", "tools = \"gcc\"\n");
        toolscope(temp.path())
            .arg("generate")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid project file"));
    }

    #[test]
    fn tool_file_applies_during_generate() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "site/tool_zlibish.toml",
            "[[tool]]\nname = \"zlibish\"\ncppdefines = [\"HAVE_ZLIB\"]\nlibs = [\"z\"]\n",
        );
        write(temp.path(), "build.toml", "tools = [\"zlibish\"]\n");
        toolscope(temp.path())
            .args(["generate", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("HAVE_ZLIB"));
    }

    #[test]
    fn tools_lists_files_and_builtins() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "site/tool_xmlrpc.toml", "[[tool]]\nname = \"xmlrpc\"\n");
        write(temp.path(), ".git/tool_hidden.toml", "");
        toolscope(temp.path())
            .arg("tools")
            .assert()
            .success()
            .stdout(
                predicate::str::contains("xmlrpc")
                    .and(predicate::str::contains("builtin"))
                    .and(predicate::str::contains("hidden").not()),
            );
    }

    #[test]
    fn cache_path_defaults_under_top() {
        let temp = TempDir::new().unwrap();
        toolscope(temp.path())
            .args(["cache", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("tools.cache"));
    }

    #[test]
    fn cache_fills_and_clears() {
        let temp = library_project();

        toolscope(temp.path())
            .env("TOOLSCOPE_CACHE", "1")
            .arg("generate")
            .assert()
            .success();
        assert!(temp.path().join("tools.cache").exists());

        toolscope(temp.path())
            .args(["cache", "show", "--format", "plain"])
            .assert()
            .success()
            .stdout(
                predicate::str::contains("default_tool_names")
                    .and(predicate::str::contains("tool_files")),
            );

        toolscope(temp.path())
            .args(["cache", "clear"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Cleared tool cache"));
        assert!(!temp.path().join("tools.cache").exists());
    }

    #[test]
    fn cache_disabled_by_default() {
        let temp = library_project();
        toolscope(temp.path()).arg("generate").assert().success();
        assert!(!temp.path().join("tools.cache").exists());
    }
}
