use anyhow::Result;
use extrepo::manifest::Manifest;
use extrepo::snapshot;

use crate::common::TestProject;

const MANIFEST: &str = r#"
directives = ["repo test"]

[[repository]]
name = "errors_go_mod"
importpath = "github.com/pkg/errors"
version = "v0.8.1"
sum = "h1:iURUrRGxPUNPdy5/HRSm+Yj6okJ6UtLINN0Q9M4+h3I="

[[repository]]
name = "errors_go_git"
importpath = "github.com/pkg/errors"
commit = "816c9085562cd7ee03e7f8188a1cfd942858cded"
patches = ["//third_party:errors.patch"]
patch_args = ["-p1"]
build_naming_convention = "go_default_library"

[[repository]]
importpath = "github.com/apex/log"
version = "v1.1.0"
sum = "h1:J5rld6WVFi6NxA6m8GJ1LJqu3+GiTFIt3mYv27gdQWI="
build_directives = ["gazelle:exclude handlers"]
"#;

const EXPECTED: &str = r#"# Code generated by extrepo; DO NOT EDIT.
# gazelle:repo test

go_repository(
    name = "com_github_apex_log",
    importpath = "github.com/apex/log",
)

go_repository(
    name = "errors_go_git",
    importpath = "github.com/pkg/errors",
    build_naming_convention = "go_default_library",
)

go_repository(
    name = "errors_go_mod",
    importpath = "github.com/pkg/errors",
)
"#;

#[test]
fn test_snapshot_of_manifest_is_exact_and_stable() -> Result<()> {
    let project = TestProject::new()?;
    project.write_manifest(MANIFEST)?;
    let manifest = project.load_manifest()?;

    let text = snapshot::render(&manifest.declarations, manifest.repo_scopes());
    assert_eq!(text, EXPECTED);

    let mut reversed = manifest.declarations.clone();
    reversed.reverse();
    assert_eq!(snapshot::render(&reversed, manifest.repo_scopes()), text);
    Ok(())
}

#[test]
fn test_snapshot_round_trips_through_an_unpinned_registry() -> Result<()> {
    let restored = Manifest::from_snapshot(&snapshot::parse(EXPECTED)?);
    assert_eq!(restored.declarations.len(), 3);
    assert_eq!(restored.repo_scopes(), ["test".to_string()]);
    assert_eq!(snapshot::render(&restored.declarations, restored.repo_scopes()), EXPECTED);
    Ok(())
}

#[test]
fn test_write_snapshot_leaves_identical_file_alone() -> Result<()> {
    let project = TestProject::new()?;
    let path = project.project_path().join("repositories.bzl");

    assert!(snapshot::write_snapshot(&path, EXPECTED)?);
    let modified = std::fs::metadata(&path)?.modified()?;
    assert!(!snapshot::write_snapshot(&path, EXPECTED)?);
    assert_eq!(std::fs::metadata(&path)?.modified()?, modified);
    assert_eq!(std::fs::read_to_string(&path)?, EXPECTED);
    Ok(())
}
