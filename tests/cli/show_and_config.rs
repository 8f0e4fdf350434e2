use crate::common::command::{init_repository_dir, run_geobit_command};
use assert_fs::TempDir;
use predicates::prelude::predicate;
use rstest::rstest;

#[rstest]
fn show_prints_commits_features_and_trees(init_repository_dir: TempDir) {
    let dir = init_repository_dir.path();

    run_geobit_command(dir, &["show", "HEAD"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("commit "))
        .stdout(predicate::str::contains("Author: Jane Doe <jane@example.com>"))
        .stdout(predicate::str::contains("    Initial commit"));
    run_geobit_command(dir, &["show", "master:roads/2"])
        .assert()
        .success()
        .stdout(predicate::str::diff("High Street\n1\n"));
    run_geobit_command(dir, &["show", "HEAD:roads"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"(?m)^feature [0-9a-f]{40} 3$").expect("valid regex"));
    run_geobit_command(dir, &["show", "nothing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a valid object name"));
}

#[rstest]
fn config_values_round_trip_through_the_repository(init_repository_dir: TempDir) {
    let dir = init_repository_dir.path();

    run_geobit_command(dir, &["config", "core.crs", "EPSG:4326"]).assert().success();
    run_geobit_command(dir, &["config", "core.crs"])
        .assert()
        .success()
        .stdout(predicate::str::diff("EPSG:4326\n"));
    run_geobit_command(dir, &["config", "user.name"])
        .assert()
        .success()
        .stdout(predicate::str::diff("Jane Doe\n"));
    run_geobit_command(dir, &["config", "core.missing"]).assert().failure();
}
