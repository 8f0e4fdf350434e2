use crate::common::collection::RoadSpec;
use crate::common::command::{geobit_commit, import_roads, init_repository_dir, repository_dir, run_geobit_command};
use assert_fs::TempDir;
use fake::Fake;
use fake::faker::address::en::StreetName;
use fake::faker::lorem::en::Words;
use predicates::prelude::{PredicateBooleanExt, predicate};
use rstest::rstest;

#[rstest]
fn commit_records_the_staged_features(repository_dir: TempDir) {
    let dir = repository_dir.path();
    run_geobit_command(dir, &["init"]).assert().success();

    let roads = (1..=5)
        .map(|id| RoadSpec::new(id.to_string(), StreetName().fake::<String>(), (1..=4).fake::<i64>()))
        .collect::<Vec<_>>();
    import_roads(dir, &roads);
    run_geobit_command(dir, &["add"]).assert().success();

    let message = Words(3..6).fake::<Vec<String>>().join(" ");
    geobit_commit(dir, &message)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("[master "))
        .stdout(predicate::str::contains(message.clone()));

    run_geobit_command(dir, &["log", "--oneline"])
        .assert()
        .success()
        .stdout(predicate::str::contains(message));
    run_geobit_command(dir, &["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to commit, working tree clean"));
}

#[rstest]
fn commit_with_nothing_staged_fails(init_repository_dir: TempDir) {
    geobit_commit(init_repository_dir.path(), "again")
        .assert()
        .failure()
        .stderr(predicate::str::contains("nothing to commit"));

    run_geobit_command(init_repository_dir.path(), &["commit", "-m", "again", "--allow-empty"])
        .assert()
        .success();
}

#[rstest]
fn commit_all_stages_working_tree_changes(init_repository_dir: TempDir) {
    let dir = init_repository_dir.path();
    import_roads(dir, &[RoadSpec::new("1", "Main Street", 4)]);

    run_geobit_command(dir, &["commit", "-a", "-m", "Widen Main Street", "--author", "Sam Roe <sam@example.com>"])
        .assert()
        .success();

    run_geobit_command(dir, &["log", "-n", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Author: Sam Roe <sam@example.com>"))
        .stdout(predicate::str::contains("    Widen Main Street"))
        .stdout(predicate::str::contains("Initial commit").not());
}

#[rstest]
fn log_filters_commits_by_path(init_repository_dir: TempDir) {
    let dir = init_repository_dir.path();
    import_roads(dir, &[RoadSpec::new("2", "High Street", 3)]);
    run_geobit_command(dir, &["commit", "-a", "-m", "Widen High Street"]).assert().success();
    run_geobit_command(dir, &["rm", "roads/3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rm 'roads/3'"));
    geobit_commit(dir, "Drop Mill Lane").assert().success();

    run_geobit_command(dir, &["log", "--oneline", "--", "roads/2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Widen High Street"))
        .stdout(predicate::str::contains("Initial commit"))
        .stdout(predicate::str::contains("Drop Mill Lane").not());
}
