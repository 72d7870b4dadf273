use anyhow::Result;
use predicates::prelude::*;

use crate::common::TestProject;

fn write_standard_manifest(project: &TestProject) -> Result<()> {
    let (errors_sum, log_sum) = project.publish_standard_modules()?;
    project.write_manifest(&format!(
        r#"directives = [
    "gazelle:repo com_github_apex_log",
    "gazelle:exclude handlers",
]

[[repository]]
name = "errors_go_mod"
importpath = "github.com/pkg/errors"
version = "v0.8.1"
sum = "{errors_sum}"

[[repository]]
importpath = "github.com/apex/log"
version = "v1.1.0"
sum = "{log_sum}"
"#
    ))?;
    Ok(())
}

#[test]
fn test_cache_dir_follows_environment() -> Result<()> {
    let project = TestProject::new()?;
    project
        .extrepo()
        .arg("cache-dir")
        .assert()
        .success()
        .stdout(predicate::str::contains(project.cache_path().display().to_string()));
    Ok(())
}

#[test]
fn test_fetch_then_fetch_again_uses_cache() -> Result<()> {
    let project = TestProject::new()?;
    write_standard_manifest(&project)?;

    project
        .extrepo()
        .arg("fetch")
        .assert()
        .success()
        .stdout(predicate::str::contains("errors_go_mod").and(predicate::str::contains("fetched")));

    project
        .extrepo()
        .args(["fetch", "errors_go_mod"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cached"));
    Ok(())
}

#[test]
fn test_generate_prints_targets_as_json() -> Result<()> {
    let project = TestProject::new()?;
    write_standard_manifest(&project)?;

    let output = project.extrepo().args(["generate", "com_github_apex_log"]).output()?;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let targets: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    let targets = targets.as_array().expect("array");
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0]["name"], "log");
    assert_eq!(targets[0]["kind"], "library");
    assert_eq!(targets[0]["deps"][0], "@errors_go_mod//:errors");

    project
        .extrepo()
        .args(["generate", "com_github_apex_log", "--package", "handlers"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"))
        .stderr(predicate::str::contains("no targets found"));
    Ok(())
}

#[test]
fn test_unknown_repository_suggests_a_name() -> Result<()> {
    let project = TestProject::new()?;
    write_standard_manifest(&project)?;

    project
        .extrepo()
        .args(["generate", "errors_go_md"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Did you mean 'errors_go_mod'?"));
    Ok(())
}

#[test]
fn test_fetch_reports_checksum_mismatch_and_fails() -> Result<()> {
    let project = TestProject::new()?;
    project.publish_standard_modules()?;
    project.write_manifest(
        r#"
[[repository]]
name = "errors_go_mod"
importpath = "github.com/pkg/errors"
version = "v0.8.1"
sum = "h1:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA="
"#,
    )?;

    project
        .extrepo()
        .arg("fetch")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Checksum mismatch for 'errors_go_mod'"))
        .stderr(predicate::str::contains("1 of 1 repositories failed"));
    Ok(())
}

#[test]
fn test_snapshot_write_and_check() -> Result<()> {
    let project = TestProject::new()?;
    write_standard_manifest(&project)?;

    project
        .extrepo()
        .arg("snapshot")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("# Code generated by extrepo; DO NOT EDIT.\n"));

    project.extrepo().args(["snapshot", "--output", "repositories.bzl", "--check"]).assert().failure();
    project
        .extrepo()
        .args(["snapshot", "--output", "repositories.bzl"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));
    project
        .extrepo()
        .args(["snapshot", "--output", "repositories.bzl", "--check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("up to date"));

    let text = std::fs::read_to_string(project.project_path().join("repositories.bzl"))?;
    assert!(text.contains("# gazelle:repo com_github_apex_log\n"));
    assert!(text.contains("name = \"com_github_apex_log\""));
    Ok(())
}

#[test]
fn test_missing_manifest_is_reported() -> Result<()> {
    let project = TestProject::new()?;
    project
        .extrepo()
        .args(["--manifest-path", "nowhere/extrepo.toml", "snapshot"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nowhere/extrepo.toml"));
    Ok(())
}
