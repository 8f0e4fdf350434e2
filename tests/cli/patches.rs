use crate::common::collection::RoadSpec;
use crate::common::command::{import_roads, init_repository_dir, run_geobit_command};
use assert_fs::TempDir;
use predicates::prelude::predicate;
use rstest::rstest;

/// Capture a widened Main Street and a new road as `change.json`, then revert the working tree
fn export_change(dir: &std::path::Path) {
    import_roads(dir, &[RoadSpec::new("1", "Main Street", 4), RoadSpec::new("4", "Station Road", 2)]);
    run_geobit_command(dir, &["format-patch", "HEAD", "-o", "change.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 2 change(s)"));
    run_geobit_command(dir, &["reset", "--hard"]).assert().success();
}

#[rstest]
fn patches_replay_on_another_working_tree(init_repository_dir: TempDir) {
    let dir = init_repository_dir.path();
    export_change(dir);

    run_geobit_command(dir, &["apply", "--check", "change.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Patch applies cleanly (2 change(s))"));
    run_geobit_command(dir, &["apply", "change.json"]).assert().success();

    run_geobit_command(dir, &["diff", "HEAD", "WORK_HEAD", "--name-status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("M roads/1"))
        .stdout(predicate::str::contains("A roads/4"));
    run_geobit_command(dir, &["show", "WORK_HEAD:roads/1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("4"));

    run_geobit_command(dir, &["apply", "-R", "change.json"]).assert().success();
    run_geobit_command(dir, &["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to commit, working tree clean"));
}

#[rstest]
fn conflicting_patches_are_rejected_whole(init_repository_dir: TempDir) {
    let dir = init_repository_dir.path();
    export_change(dir);
    run_geobit_command(dir, &["delete", "roads/1"]).assert().success();

    run_geobit_command(dir, &["apply", "change.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("patch cannot be applied: 1 change(s) rejected"));
    run_geobit_command(dir, &["show", "WORK_HEAD:roads/4"]).assert().failure();

    run_geobit_command(dir, &["apply", "--partial", "change.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Rejected:\nM roads/1"));
    run_geobit_command(dir, &["show", "WORK_HEAD:roads/4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Station Road"));
}

#[rstest]
fn patches_print_as_json_without_an_output_file(init_repository_dir: TempDir) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir.path();
    run_geobit_command(dir, &["delete", "roads/3"]).assert().success();

    let output = run_geobit_command(dir, &["format-patch", "HEAD"]).output()?;
    assert!(output.status.success());
    let patch: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(patch["removed"][0]["path"], "roads/3");
    assert_eq!(patch["added"].as_array().map(Vec::len), Some(0));
    Ok(())
}
