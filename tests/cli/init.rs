use crate::common::command::{repository_dir, run_geobit_command};
use assert_fs::TempDir;
use predicates::prelude::predicate;
use rstest::rstest;

#[rstest]
fn init_creates_the_repository_layout(repository_dir: TempDir) -> Result<(), Box<dyn std::error::Error>> {
    let dir_absolute_path = repository_dir.path().canonicalize()?.display().to_string();

    run_geobit_command(repository_dir.path(), &["init"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Initialized empty geobit repository in"))
        .stdout(predicate::str::contains(dir_absolute_path));

    let repo_dir = repository_dir.path().join(".geobit");
    assert!(repo_dir.join("objects").is_dir());
    assert!(repo_dir.join("refs/heads").is_dir());
    assert!(repo_dir.join("refs/tags").is_dir());
    assert_eq!(std::fs::read_to_string(repo_dir.join("HEAD"))?.trim(), "ref: refs/heads/master");
    Ok(())
}

#[rstest]
fn init_refuses_an_existing_repository(repository_dir: TempDir) {
    run_geobit_command(repository_dir.path(), &["init"])
        .assert()
        .success();

    run_geobit_command(repository_dir.path(), &["init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("repository already exists"));
}

#[rstest]
fn init_accepts_a_target_directory(repository_dir: TempDir) {
    run_geobit_command(repository_dir.path(), &["init", "nested/project"])
        .assert()
        .success();

    assert!(repository_dir.path().join("nested/project/.geobit/HEAD").is_file());
}

#[rstest]
fn commands_outside_a_repository_fail(repository_dir: TempDir) {
    run_geobit_command(repository_dir.path(), &["status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a geobit repository"));
}
