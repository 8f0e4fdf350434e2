use assert_fs::TempDir;
use chrono::{DateTime, TimeDelta};
use geobit::areas::refs::{HEAD, MERGE_HEAD};
use geobit::areas::repository::{Context, Repository};
use geobit::artifacts::core::config::{MemoryConfig, USER_EMAIL, USER_NAME};
use geobit::artifacts::core::platform::FixedPlatform;
use geobit::artifacts::objects::feature::{Feature, Value};
use geobit::artifacts::objects::feature_type::{FeatureType, ValueType};
use geobit::commands::porcelain::add::AddOp;
use geobit::commands::porcelain::branch::BranchCreateOp;
use geobit::commands::porcelain::checkout::CheckoutOp;
use geobit::commands::porcelain::commit::CommitOp;
use geobit::commands::porcelain::log::LogOp;
use geobit::commands::porcelain::merge::{MergeOp, MergeOutcome};
use geobit::commands::porcelain::status::StatusOp;
use geobit::errors::Error;
use pretty_assertions::assert_eq;
use rstest::{fixture, rstest};
use std::path::Path;

fn parcels() -> FeatureType {
    FeatureType::builder("parcels")
        .required("owner", ValueType::Text)
        .attribute("area", ValueType::Double)
        .build()
}

fn parcel(owner: &str, area: f64) -> Feature {
    Feature::new(vec![Some(Value::from(owner)), Some(Value::Double(area))])
}

fn open(root: &Path) -> Repository {
    let start = DateTime::parse_from_rfc3339("2024-06-01T08:00:00+00:00").unwrap();
    Repository::open(root)
        .unwrap()
        .with_config(MemoryConfig::new().with(USER_NAME, "Jane Doe").with(USER_EMAIL, "jane@example.com"))
        .with_platform(FixedPlatform::ticking(start, TimeDelta::minutes(1)))
}

#[fixture]
fn repository_dir() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    Repository::init(dir.path()).expect("Failed to init repository");
    dir
}

#[rstest]
#[tokio::test]
async fn history_survives_reopening(repository_dir: TempDir) -> anyhow::Result<()> {
    {
        let repo = open(repository_dir.path());
        repo.working_tree().insert("parcels", "p1", &parcel("Ann", 120.5), &parcels())?;
        repo.command(AddOp::default()).await?;
        repo.command(CommitOp::new("Survey parcels")).await?;
    }

    let repo = open(repository_dir.path());
    let log = repo.command(LogOp::default()).await?;
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].1.message(), "Survey parcels");
    assert_eq!(repo.working_tree().feature("parcels/p1")?.map(|(feature, _)| feature), Some(parcel("Ann", 120.5)));
    assert!(repo.command(StatusOp::default()).await?.is_clean());
    Ok(())
}

#[rstest]
#[tokio::test]
async fn pending_conflicts_survive_reopening(repository_dir: TempDir) -> anyhow::Result<()> {
    {
        let repo = open(repository_dir.path());
        repo.working_tree().insert("parcels", "p1", &parcel("Ann", 100.0), &parcels())?;
        repo.command(AddOp::default()).await?;
        repo.command(CommitOp::new("base")).await?;
        repo.command(BranchCreateOp::new("survey")).await?;

        repo.working_tree().insert("parcels", "p1", &parcel("Bob", 100.0), &parcels())?;
        repo.command(CommitOp::new("sold to Bob").all(true)).await?;
        repo.command(CheckoutOp::new("survey")).await?;
        repo.working_tree().insert("parcels", "p1", &parcel("Cat", 100.0), &parcels())?;
        repo.command(CommitOp::new("sold to Cat").all(true)).await?;
        repo.command(CheckoutOp::new("master")).await?;

        let outcome = repo.command(MergeOp::new("survey")).await?;
        assert!(matches!(outcome, MergeOutcome::Conflicted(conflicts) if conflicts.len() == 1));
    }

    let repo = open(repository_dir.path());
    let status = repo.command(StatusOp::default()).await?;
    assert_eq!(status.count_conflicted, 1);
    assert!(repo.refs().resolve(MERGE_HEAD)?.is_some());

    let error = repo.command(CommitOp::new("merge")).await.unwrap_err();
    assert!(matches!(error.downcast_ref::<Error>(), Some(Error::UnresolvedConflictExists { .. })));

    repo.command(AddOp::new(["parcels/p1"])).await?;
    let (_, merge) = repo.command(CommitOp::new("merge")).await?;
    assert_eq!(merge.parents().len(), 2);
    assert!(repo.refs().resolve(HEAD)?.is_some());
    assert_eq!(open(repository_dir.path()).command(StatusOp::default()).await?.count_conflicted, 0);
    Ok(())
}
