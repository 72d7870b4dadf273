use anyhow::Result;
use extrepo::core::RepoError;
use extrepo::test_utils::{has_git, has_patch_tool};

use crate::common::{ERRORS_FILES, TestProject};

const ADD_FILE_PATCH: &str = "--- /dev/null
+++ b/patched.go
@@ -0,0 +1,3 @@
+package errors
+
+import \"github.com/apex/log\"
";

const BROKEN_PATCH: &str = "--- a/errors.go
+++ b/errors.go
@@ -1,3 +1,3 @@
-// Package errors does not look like this.
+// Package errors is patched.
 package errors

";

/// Commit the errors fixture to a local repository; returns (remote, commit).
fn errors_repo(project: &TestProject, extra: &[(&str, &str)]) -> Result<(String, String)> {
    let git = project.git_repo("errors")?;
    git.write_files(ERRORS_FILES)?;
    git.write_files(extra)?;
    let commit = git.commit_all("v0.8.1")?;
    Ok((git.repo_path().display().to_string(), commit))
}

#[tokio::test]
async fn test_commit_pin_with_patch_and_default_library_naming() -> Result<()> {
    if !has_git() || !has_patch_tool() {
        eprintln!("skipping: git or patch not installed");
        return Ok(());
    }
    let project = TestProject::new()?;
    let (_, log_sum) = project.publish_standard_modules()?;
    let (remote, commit) = errors_repo(&project, &[])?;
    project.write_file("third_party/errors.patch", ADD_FILE_PATCH)?;
    project.write_manifest(&format!(
        r#"
[[repository]]
name = "errors_go_git"
importpath = "github.com/pkg/errors"
commit = "{commit}"
remote = "{remote}"
patches = ["//third_party:errors.patch"]
patch_args = ["-p1"]
build_naming_convention = "go_default_library"

[[repository]]
name = "com_github_apex_log"
importpath = "github.com/apex/log"
version = "v1.1.0"
sum = "{log_sum}"
"#
    ))?;
    let manifest = project.load_manifest()?;

    let report = project
        .materializer()?
        .materialize_manifest(&manifest, &["errors_go_git".to_string()])
        .await?;
    assert!(report.is_success(), "{:?}", report.failures);
    let repo = &report.materialized[0];
    assert!(!repo.path.join(".git").exists());
    assert!(repo.path.join("patched.go").is_file());

    assert_eq!(repo.targets.len(), 1);
    let lib = &repo.targets[0];
    assert_eq!(lib.name, "go_default_library");
    assert!(lib.aliases.is_empty());
    assert_eq!(lib.srcs, vec!["errors.go", "patched.go", "stack.go"]);
    assert_eq!(lib.deps, vec!["@com_github_apex_log//:log"]);
    Ok(())
}

#[tokio::test]
async fn test_changed_patch_content_changes_identity() -> Result<()> {
    if !has_git() || !has_patch_tool() {
        eprintln!("skipping: git or patch not installed");
        return Ok(());
    }
    let project = TestProject::new()?;
    let (remote, commit) = errors_repo(&project, &[])?;
    project.write_file("errors.patch", ADD_FILE_PATCH)?;
    project.write_manifest(&format!(
        r#"
[[repository]]
name = "errors_go_git"
importpath = "github.com/pkg/errors"
commit = "{commit}"
remote = "{remote}"
patches = ["errors.patch"]
patch_args = ["-p1"]
"#
    ))?;

    let manifest = project.load_manifest()?;
    let first = project.materializer()?.materialize_manifest(&manifest, &[]).await?;
    assert!(first.is_success(), "{:?}", first.failures);

    project.write_file("errors.patch", &ADD_FILE_PATCH.replace("apex/log", "pkg/errors/internal"))?;
    let manifest = project.load_manifest()?;
    let second = project.materializer()?.materialize_manifest(&manifest, &[]).await?;
    assert!(second.is_success(), "{:?}", second.failures);

    assert_ne!(first.materialized[0].identity, second.materialized[0].identity);
    assert!(second.materialized[0].fetched);
    assert!(first.materialized[0].path.join("patched.go").is_file());
    Ok(())
}

#[tokio::test]
async fn test_failing_patch_names_the_patch() -> Result<()> {
    if !has_git() || !has_patch_tool() {
        eprintln!("skipping: git or patch not installed");
        return Ok(());
    }
    let project = TestProject::new()?;
    let (remote, commit) = errors_repo(&project, &[])?;
    project.write_file("broken.patch", BROKEN_PATCH)?;
    project.write_manifest(&format!(
        r#"
[[repository]]
name = "errors_go_git"
importpath = "github.com/pkg/errors"
commit = "{commit}"
remote = "{remote}"
patches = ["broken.patch"]
patch_args = ["-p1"]
"#
    ))?;
    let manifest = project.load_manifest()?;

    let report = project.materializer()?.materialize_manifest(&manifest, &[]).await?;
    assert_eq!(report.failures.len(), 1);
    match &report.failures[0] {
        RepoError::PatchApplyFailure { name, patch, .. } => {
            assert_eq!(name, "errors_go_git");
            assert!(patch.ends_with("broken.patch"));
        }
        other => panic!("expected patch failure, got {other}"),
    }
    let published = std::fs::read_dir(project.cache_path().join("repos")).map(|d| d.count()).unwrap_or(0);
    assert_eq!(published, 0);
    Ok(())
}

#[tokio::test]
async fn test_fork_is_rewritten_to_declared_importpath() -> Result<()> {
    if !has_git() {
        eprintln!("skipping: git not installed");
        return Ok(());
    }
    let project = TestProject::new()?;
    let (remote, commit) = errors_repo(
        &project,
        &[
            ("go.mod", "module github.com/pkg/errors\n\ngo 1.12\n"),
            ("internal/frames/frames.go", "package frames\n"),
        ],
    )?;
    project.write_manifest(&format!(
        r#"
[[repository]]
name = "com_github_fork_errors"
importpath = "github.com/fork/errors"
commit = "{commit}"
remote = "{remote}"
replace = "github.com/pkg/errors"
"#
    ))?;
    let manifest = project.load_manifest()?;

    let report = project.materializer()?.materialize_manifest(&manifest, &[]).await?;
    assert!(report.is_success(), "{:?}", report.failures);
    let repo = &report.materialized[0];

    let go_mod = std::fs::read_to_string(repo.path.join("go.mod"))?;
    assert!(go_mod.starts_with("module github.com/fork/errors\n"));

    let importpaths: Vec<&str> = repo.targets.iter().map(|t| t.importpath.as_str()).collect();
    assert_eq!(importpaths, vec!["github.com/fork/errors", "github.com/fork/errors/internal/frames"]);
    assert_eq!(repo.targets[1].visibility, vec!["//:__subpackages__"]);
    Ok(())
}

#[tokio::test]
async fn test_unreachable_remote_is_retryable() -> Result<()> {
    if !has_git() {
        eprintln!("skipping: git not installed");
        return Ok(());
    }
    let project = TestProject::new()?;
    let missing = project.project_path().join("no-such-repo");
    project.write_manifest(&format!(
        r#"
[[repository]]
name = "gone"
importpath = "example.com/gone"
commit = "816c9085562cd7ee03e7f8188a1cfd942858cded"
remote = "{}"
"#,
        missing.display()
    ))?;
    let manifest = project.load_manifest()?;

    let report = project.materializer()?.materialize_manifest(&manifest, &[]).await?;
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(report.failures[0], RepoError::FetchUnavailable { .. }));
    assert!(report.failures[0].is_retryable());
    Ok(())
}
