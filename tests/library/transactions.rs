use assert_fs::TempDir;
use geobit::areas::refs::{HEAD, RefValue};
use geobit::areas::repository::{Context, Repository};
use geobit::areas::transaction::Transaction;
use geobit::artifacts::core::config::{MemoryConfig, USER_EMAIL, USER_NAME};
use geobit::artifacts::objects::feature::{Feature, Value};
use geobit::artifacts::objects::feature_type::{FeatureType, ValueType};
use geobit::commands::porcelain::add::AddOp;
use geobit::commands::porcelain::commit::CommitOp;
use geobit::errors::Error;
use pretty_assertions::assert_eq;

fn wells() -> FeatureType {
    FeatureType::builder("wells").attribute("depth", ValueType::Integer).build()
}

fn well(depth: i64) -> Feature {
    Feature::new(vec![Some(Value::Integer(depth))])
}

fn open(dir: &TempDir) -> anyhow::Result<Repository> {
    Ok(Repository::init(dir.path())?
        .with_config(MemoryConfig::new().with(USER_NAME, "Jane Doe").with(USER_EMAIL, "jane@example.com")))
}

#[tokio::test]
async fn commands_inside_a_transaction_publish_on_commit() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let repo = open(&dir)?;

    let transaction = Transaction::begin(&repo).await?;
    transaction.working_tree().insert("wells", "w1", &well(40), &wells())?;
    transaction.command(AddOp::default()).await?;
    let (commit, _) = transaction.command(CommitOp::new("Drill w1")).await?;

    assert_eq!(repo.refs().resolve(HEAD)?, None);
    assert!(repo.working_tree().find("wells/w1")?.is_none());

    transaction.commit().await?;
    assert_eq!(repo.refs().resolve(HEAD)?, Some(commit));
    assert_eq!(repo.working_tree().feature("wells/w1")?.map(|(feature, _)| feature), Some(well(40)));
    Ok(())
}

#[tokio::test]
async fn concurrent_commits_fail_the_transaction() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let repo = open(&dir)?;

    let transaction = Transaction::begin(&repo).await?;
    transaction.working_tree().insert("wells", "w1", &well(40), &wells())?;
    transaction.command(CommitOp::new("Drill w1").all(true)).await?;

    repo.working_tree().insert("wells", "w2", &well(15), &wells())?;
    let (outside, _) = repo.command(CommitOp::new("Drill w2").all(true)).await?;

    let error = transaction.commit().await.unwrap_err();
    assert!(matches!(
        error.downcast_ref::<Error>(),
        Some(Error::TransactionConflict { names }) if names.contains(&"refs/heads/master".to_string())
    ));
    assert_eq!(repo.refs().resolve(HEAD)?, Some(outside));
    assert!(repo.working_tree().find("wells/w1")?.is_none());
    Ok(())
}

#[tokio::test]
async fn aborting_leaves_the_repository_untouched() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let repo = open(&dir)?;
    let before = repo.refs().list()?;

    let transaction = Transaction::begin(&repo).await?;
    transaction.refs().put("refs/heads/scratch", RefValue::symbolic(HEAD))?;
    transaction.working_tree().insert("wells", "w1", &well(40), &wells())?;
    transaction.abort();

    assert_eq!(repo.refs().list()?, before);
    Ok(())
}
