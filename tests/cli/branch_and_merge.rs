use crate::common::collection::RoadSpec;
use crate::common::command::{geobit_commit, import_roads, init_repository_dir, run_geobit_command};
use assert_fs::TempDir;
use predicates::prelude::{PredicateBooleanExt, predicate};
use rstest::rstest;
use std::path::Path;

/// Commit one road edit on `dev` and another on master
fn diverge(dir: &Path, ours: RoadSpec, theirs: RoadSpec) {
    run_geobit_command(dir, &["branch", "dev"]).assert().success();
    run_geobit_command(dir, &["checkout", "dev"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Switched to branch 'dev'"));
    import_roads(dir, &[theirs]);
    run_geobit_command(dir, &["commit", "-a", "-m", "Edit on dev"]).assert().success();

    run_geobit_command(dir, &["checkout", "master"]).assert().success();
    import_roads(dir, &[ours]);
    run_geobit_command(dir, &["commit", "-a", "-m", "Edit on master"]).assert().success();
}

#[rstest]
fn branches_are_listed_and_deleted(init_repository_dir: TempDir) {
    let dir = init_repository_dir.path();
    run_geobit_command(dir, &["branch", "dev"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Created branch dev at"));

    run_geobit_command(dir, &["branch"])
        .assert()
        .success()
        .stdout(predicate::str::contains("  dev "))
        .stdout(predicate::str::contains("* master "));

    run_geobit_command(dir, &["branch", "-d", "master"])
        .assert()
        .failure();
    run_geobit_command(dir, &["branch", "-d", "dev"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Deleted branch dev"));
}

#[rstest]
fn checkout_refuses_to_discard_local_changes(init_repository_dir: TempDir) {
    let dir = init_repository_dir.path();
    run_geobit_command(dir, &["branch", "dev"]).assert().success();
    run_geobit_command(dir, &["delete", "roads/1"]).assert().success();

    run_geobit_command(dir, &["checkout", "dev"]).assert().failure();
    run_geobit_command(dir, &["checkout", "--force", "dev"]).assert().success();
    run_geobit_command(dir, &["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("On branch dev"))
        .stdout(predicate::str::contains("nothing to commit"));
}

#[rstest]
fn merge_fast_forwards_a_branch_ahead(init_repository_dir: TempDir) {
    let dir = init_repository_dir.path();
    run_geobit_command(dir, &["branch", "dev"]).assert().success();
    run_geobit_command(dir, &["checkout", "dev"]).assert().success();
    import_roads(dir, &[RoadSpec::new("4", "Station Road", 2)]);
    run_geobit_command(dir, &["commit", "-a", "-m", "Add Station Road"]).assert().success();
    run_geobit_command(dir, &["checkout", "master"]).assert().success();

    run_geobit_command(dir, &["merge", "dev"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Fast-forward to"));
    run_geobit_command(dir, &["merge", "dev"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Already up to date."));
    run_geobit_command(dir, &["show", "HEAD:roads/4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Station Road"));
}

#[rstest]
fn merge_combines_edits_to_different_features(init_repository_dir: TempDir) {
    let dir = init_repository_dir.path();
    diverge(dir, RoadSpec::new("1", "Main Street", 4), RoadSpec::new("2", "High Street", 3));

    run_geobit_command(dir, &["merge", "dev"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Merge made, commit"));

    run_geobit_command(dir, &["log", "-n", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Merge: "))
        .stdout(predicate::str::contains("Merge commit 'dev'"));
    run_geobit_command(dir, &["show", "HEAD:roads/2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3"));
}

#[rstest]
fn merge_conflicts_must_be_resolved_before_committing(init_repository_dir: TempDir) {
    let dir = init_repository_dir.path();
    diverge(dir, RoadSpec::new("1", "Main Street", 4), RoadSpec::new("1", "Main Street", 3));

    run_geobit_command(dir, &["merge", "dev"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("CONFLICT: roads/1"));
    run_geobit_command(dir, &["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("You have unmerged paths."))
        .stdout(predicate::str::contains("both modified: roads/1"));
    geobit_commit(dir, "Merge dev")
        .assert()
        .failure()
        .stderr(predicate::str::contains("roads/1"));

    import_roads(dir, &[RoadSpec::new("1", "Main Street", 3)]);
    run_geobit_command(dir, &["add", "roads/1"]).assert().success();
    geobit_commit(dir, "Merge dev").assert().success();

    run_geobit_command(dir, &["log", "-n", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Merge: "));
    run_geobit_command(dir, &["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("unmerged").not());
}

#[rstest]
fn reset_hard_discards_commits_and_changes(init_repository_dir: TempDir) {
    let dir = init_repository_dir.path();
    import_roads(dir, &[RoadSpec::new("1", "Main Street", 4)]);
    run_geobit_command(dir, &["commit", "-a", "-m", "Widen"]).assert().success();
    run_geobit_command(dir, &["delete", "roads/2"]).assert().success();

    run_geobit_command(dir, &["reset", "--hard", "HEAD^"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("HEAD is now at"));

    run_geobit_command(dir, &["log", "--oneline"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Widen").not());
    run_geobit_command(dir, &["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to commit, working tree clean"));
}

#[rstest]
fn tags_are_created_listed_and_deleted(init_repository_dir: TempDir) {
    let dir = init_repository_dir.path();
    run_geobit_command(dir, &["tag", "v1.0", "-m", "First survey"])
        .assert()
        .success()
        .stdout(predicate::str::contains("as v1.0"));
    run_geobit_command(dir, &["tag", "v1.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    run_geobit_command(dir, &["tag"])
        .assert()
        .success()
        .stdout(predicate::str::diff("v1.0\n"));
    run_geobit_command(dir, &["show", "v1.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("First survey"));

    run_geobit_command(dir, &["tag", "-d", "v1.0"]).assert().success();
    run_geobit_command(dir, &["tag"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}
