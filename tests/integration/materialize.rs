use anyhow::Result;
use extrepo::core::RepoError;
use extrepo::generate::TargetKind;
use extrepo::utils::probe_writable;
use walkdir::WalkDir;

use crate::common::{ERRORS_FILES, ERRORS_IMPORTPATH, TestProject};

fn standard_manifest(errors_sum: &str, log_sum: &str) -> String {
    format!(
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
    )
}

#[tokio::test]
async fn test_module_pin_generates_import_named_library_with_alias() -> Result<()> {
    let project = TestProject::new()?;
    let (errors_sum, log_sum) = project.publish_standard_modules()?;
    project.write_manifest(&standard_manifest(&errors_sum, &log_sum))?;
    let manifest = project.load_manifest()?;

    let report = project
        .materializer()?
        .materialize_manifest(&manifest, &["errors_go_mod".to_string()])
        .await?;
    assert!(report.is_success(), "{:?}", report.failures);

    let errors = &report.materialized[0];
    assert!(errors.fetched);
    assert_eq!(errors.targets.len(), 1);
    let lib = &errors.targets[0];
    assert_eq!(lib.kind, TargetKind::Library);
    assert_eq!(lib.name, "errors");
    assert_eq!(lib.package, "");
    assert_eq!(lib.importpath, ERRORS_IMPORTPATH);
    assert_eq!(lib.aliases, vec!["go_default_library"]);
    assert_eq!(lib.srcs, vec!["errors.go", "stack.go"]);
    assert!(lib.deps.is_empty());
    assert_eq!(lib.visibility, vec!["//visibility:public"]);
    Ok(())
}

#[tokio::test]
async fn test_repo_scoped_exclude_applies_only_to_its_repository() -> Result<()> {
    let project = TestProject::new()?;
    let (errors_sum, log_sum) = project.publish_standard_modules()?;
    project.write_manifest(&standard_manifest(&errors_sum, &log_sum))?;
    let manifest = project.load_manifest()?;

    let report = project.materializer()?.materialize_manifest(&manifest, &[]).await?;
    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(report.materialized.len(), 2);

    let log = &report.materialized[0];
    assert_eq!(log.name, "com_github_apex_log");
    assert!(log.path.join("handlers/text/text.go").is_file());
    let packages: Vec<&str> = log.targets.iter().map(|t| t.package.as_str()).collect();
    assert_eq!(packages, vec![""], "handlers must be excluded and _examples skipped");

    let root = &log.targets[0];
    assert_eq!(root.name, "log");
    assert_eq!(root.deps, vec!["@errors_go_mod//:errors"]);
    assert!(root.unresolved_imports.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_second_materialization_reuses_the_cache() -> Result<()> {
    let project = TestProject::new()?;
    let (errors_sum, log_sum) = project.publish_standard_modules()?;
    project.write_manifest(&standard_manifest(&errors_sum, &log_sum))?;
    let manifest = project.load_manifest()?;

    let first = project.materializer()?.materialize_manifest(&manifest, &[]).await?;
    assert_eq!(first.fetched_count(), 2);

    // Removing the proxy proves nothing is downloaded again.
    std::fs::remove_dir_all(project.proxy().root())?;

    let second = project.materializer()?.materialize_manifest(&manifest, &[]).await?;
    assert!(second.is_success(), "{:?}", second.failures);
    assert_eq!(second.fetched_count(), 0);
    for (a, b) in first.materialized.iter().zip(&second.materialized) {
        assert_eq!(a.path, b.path);
        assert_eq!(a.targets, b.targets);
    }
    Ok(())
}

#[tokio::test]
async fn test_materialized_tree_stays_writable() -> Result<()> {
    let project = TestProject::new()?;
    let (errors_sum, log_sum) = project.publish_standard_modules()?;
    project.write_manifest(&standard_manifest(&errors_sum, &log_sum))?;
    let manifest = project.load_manifest()?;

    let report = project.materializer()?.materialize_manifest(&manifest, &[]).await?;
    for repo in &report.materialized {
        for entry in WalkDir::new(&repo.path) {
            let entry = entry?;
            let mode = entry.metadata()?.permissions();
            assert!(!mode.readonly(), "{} is read-only", entry.path().display());
            if entry.file_type().is_dir() {
                probe_writable(entry.path())?;
            }
        }
    }
    Ok(())
}

#[tokio::test]
async fn test_checksum_mismatch_publishes_nothing() -> Result<()> {
    let project = TestProject::new()?;
    project.proxy().publish(ERRORS_IMPORTPATH, "v0.8.1", ERRORS_FILES)?;
    project.write_manifest(
        r#"
[[repository]]
name = "errors_go_mod"
importpath = "github.com/pkg/errors"
version = "v0.8.1"
sum = "h1:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA="
"#,
    )?;
    let manifest = project.load_manifest()?;

    let report = project.materializer()?.materialize_manifest(&manifest, &[]).await?;
    assert!(report.materialized.is_empty());
    assert_eq!(report.failures.len(), 1);
    match &report.failures[0] {
        RepoError::ChecksumMismatch { name, expected, .. } => {
            assert_eq!(name, "errors_go_mod");
            assert!(expected.starts_with("h1:AAAA"));
        }
        other => panic!("expected checksum mismatch, got {other}"),
    }
    assert!(!report.failures[0].is_retryable());

    let repos = project.cache_path().join("repos");
    let published = std::fs::read_dir(&repos).map(|d| d.count()).unwrap_or(0);
    assert_eq!(published, 0);
    Ok(())
}

#[tokio::test]
async fn test_missing_version_is_unavailable_and_others_succeed() -> Result<()> {
    let project = TestProject::new()?;
    let (errors_sum, _) = project.publish_standard_modules()?;
    project.write_manifest(&format!(
        r#"
[[repository]]
name = "errors_go_mod"
importpath = "github.com/pkg/errors"
version = "v0.8.1"
sum = "{errors_sum}"

[[repository]]
name = "missing"
importpath = "github.com/pkg/errors"
version = "v0.9.9"
sum = "{errors_sum}"

[[repository]]
name = "ambiguous"
importpath = "example.com/ambiguous"
version = "v1.0.0"
sum = "{errors_sum}"
commit = "816c9085562cd7ee03e7f8188a1cfd942858cded"
"#
    ))?;
    let manifest = project.load_manifest()?;
    assert_eq!(manifest.rejected.len(), 1);

    let report = project.materializer()?.materialize_manifest(&manifest, &[]).await?;
    assert_eq!(report.materialized.len(), 1);
    assert_eq!(report.materialized[0].name, "errors_go_mod");

    let kinds: Vec<(Option<&str>, bool)> =
        report.failures.iter().map(|f| (f.repository(), f.is_retryable())).collect();
    assert_eq!(kinds, vec![(Some("ambiguous"), false), (Some("missing"), true)]);
    assert!(matches!(report.failures[0], RepoError::AmbiguousDeclaration { .. }));
    assert!(matches!(report.failures[1], RepoError::FetchUnavailable { .. }));
    Ok(())
}
