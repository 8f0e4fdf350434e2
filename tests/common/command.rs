use crate::common::collection::{RoadSpec, write_roads};
use assert_cmd::Command;
use assert_fs::TempDir;
use rstest::fixture;
use std::path::Path;

#[fixture]
pub fn repository_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

/// Repository with roads/1..3 committed on master
#[fixture]
pub fn init_repository_dir(repository_dir: TempDir) -> TempDir {
    run_geobit_command(repository_dir.path(), &["init"])
        .assert()
        .success();

    import_roads(
        repository_dir.path(),
        &[
            RoadSpec::new("1", "Main Street", 2),
            RoadSpec::new("2", "High Street", 1),
            RoadSpec::new("3", "Mill Lane", 1),
        ],
    );
    run_geobit_command(repository_dir.path(), &["add"])
        .assert()
        .success();
    geobit_commit(repository_dir.path(), "Initial commit")
        .assert()
        .success();

    repository_dir
}

pub fn run_geobit_command(dir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::cargo_bin("geobit").expect("Failed to find geobit binary");
    cmd.envs(vec![
        ("NO_COLOR", "1"),
        ("GEOBIT_LOG", "off"),
        ("GEOBIT_USER_NAME", "Jane Doe"),
        ("GEOBIT_USER_EMAIL", "jane@example.com"),
    ]);
    cmd.current_dir(dir);
    for arg in args {
        cmd.arg(arg);
    }
    cmd
}

pub fn geobit_commit(dir: &Path, message: &str) -> Command {
    run_geobit_command(dir, &["commit", "-m", message])
}

/// Write `roads` to an import file and load it into the working tree
pub fn import_roads(dir: &Path, roads: &[RoadSpec]) {
    let file = write_roads(dir, roads);
    run_geobit_command(dir, &["import", file.to_str().expect("non UTF-8 temp path")])
        .assert()
        .success();
}
