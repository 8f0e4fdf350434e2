use crate::common::collection::RoadSpec;
use crate::common::command::{import_roads, init_repository_dir, run_geobit_command};
use assert_fs::TempDir;
use predicates::prelude::predicate;
use rstest::rstest;

#[rstest]
fn status_separates_staged_and_unstaged_changes(init_repository_dir: TempDir) {
    let dir = init_repository_dir.path();
    import_roads(dir, &[RoadSpec::new("4", "Station Road", 2)]);
    run_geobit_command(dir, &["add", "roads/4"]).assert().success();
    run_geobit_command(dir, &["delete", "roads/1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted 1 node(s)"));

    run_geobit_command(dir, &["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("On branch master"))
        .stdout(predicate::str::contains("Changes to be committed:\n\tadded:    roads/4"))
        .stdout(predicate::str::contains("Changes not staged for commit:\n\tremoved:  roads/1"));
}

#[rstest]
fn status_limits_each_section(init_repository_dir: TempDir) {
    let dir = init_repository_dir.path();
    run_geobit_command(dir, &["delete", "roads/1", "roads/2", "roads/3"]).assert().success();

    run_geobit_command(dir, &["status", "--limit", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("... and 2 more"));
}

#[rstest]
fn diff_shows_attribute_changes(init_repository_dir: TempDir) {
    let dir = init_repository_dir.path();
    import_roads(dir, &[RoadSpec::new("1", "Main Street", 3)]);

    run_geobit_command(dir, &["diff"])
        .assert()
        .success()
        .stdout(predicate::str::contains("M roads/1\n    lanes: 2 -> 3"));

    run_geobit_command(dir, &["diff", "--cached"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    run_geobit_command(dir, &["add"]).assert().success();
    run_geobit_command(dir, &["diff", "--cached", "--name-status"])
        .assert()
        .success()
        .stdout(predicate::str::diff("M roads/1\n"));
}
