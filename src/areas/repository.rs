use crate::areas::database::{FileObjectStore, MemoryObjectStore, ObjectStore};
use crate::areas::index::StagingArea;
use crate::areas::refs::{DEFAULT_BRANCH, FileRefDatabase, HEAD, MemoryRefDatabase, RefDatabase, RefValue};
use crate::areas::working_tree::WorkingTree;
use crate::artifacts::core::config::{ConfigProvider, FileConfig, MemoryConfig};
use crate::artifacts::core::platform::{Platform, SystemPlatform};
use crate::commands::{CommandFlags, Plumbing, Porcelain};
use crate::errors::Error;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const REPOSITORY_DIR: &str = ".geobit";
const OBJECTS_DIR: &str = "objects";
const CONFLICTS_FILE: &str = "conflicts";
const CONFIG_FILE: &str = "config";

/// Everything an operation needs: stores, staging area, configuration and clock
///
/// Implemented by [`Repository`] and by
/// [`Transaction`](crate::areas::transaction::Transaction), so any operation can
/// run either directly or inside a transaction.
#[allow(async_fn_in_trait)]
pub trait Context: Sync + Sized {
    fn objects(&self) -> &Arc<dyn ObjectStore>;

    fn refs(&self) -> &Arc<dyn RefDatabase>;

    fn index(&self) -> &Arc<Mutex<StagingArea>>;

    fn config(&self) -> &dyn ConfigProvider;

    fn platform(&self) -> &dyn Platform;

    fn working_tree(&self) -> WorkingTree {
        WorkingTree::new(self.objects().clone(), self.refs().clone())
    }

    async fn run<P: Plumbing>(&self, command: P) -> anyhow::Result<P::Output> {
        self.check_flags(P::FLAGS).await?;
        command.execute(self).await
    }

    async fn command<P: Porcelain>(&self, command: P) -> anyhow::Result<P::Output> {
        self.check_flags(P::FLAGS).await?;
        command.execute(self).await
    }

    /// Refuse operations that cannot run while conflicts are pending
    async fn check_flags(&self, flags: CommandFlags) -> anyhow::Result<()> {
        if flags.contains(CommandFlags::CAN_RUN_DURING_CONFLICT) {
            return Ok(());
        }

        let index = self.index().lock().await;
        if index.has_conflicts() {
            let paths = index
                .get_conflicted("")
                .into_iter()
                .map(|conflict| conflict.path().to_string())
                .collect();
            return Err(Error::UnresolvedConflictExists { paths }.into());
        }

        Ok(())
    }
}

#[derive(Debug)]
pub struct Repository {
    root: Option<Box<Path>>,
    objects: Arc<dyn ObjectStore>,
    refs: Arc<dyn RefDatabase>,
    index: Arc<Mutex<StagingArea>>,
    config: Arc<dyn ConfigProvider>,
    platform: Arc<dyn Platform>,
}

impl Repository {
    /// Repository living only in memory, with `HEAD` on the default branch
    pub fn in_memory() -> Self {
        let objects: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
        let refs: Arc<dyn RefDatabase> = Arc::new(MemoryRefDatabase::new());
        let index = StagingArea::new(objects.clone(), refs.clone(), None);
        // A fresh in-memory database cannot hold a conflicting HEAD
        let _ = refs.put(HEAD, RefValue::symbolic(DEFAULT_BRANCH));

        Repository {
            root: None,
            objects,
            refs,
            index: Arc::new(Mutex::new(index)),
            config: Arc::new(MemoryConfig::new()),
            platform: Arc::new(SystemPlatform),
        }
    }

    pub fn with_config(mut self, config: impl ConfigProvider + 'static) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub fn with_platform(mut self, platform: impl Platform + 'static) -> Self {
        self.platform = Arc::new(platform);
        self
    }

    /// Create the repository layout under `root` and open it
    pub fn init(root: &Path) -> anyhow::Result<Self> {
        let repo_dir = root.join(REPOSITORY_DIR);
        if repo_dir.join(HEAD).exists() {
            return Err(Error::precondition(format!(
                "repository already exists at {}",
                repo_dir.display()
            )));
        }

        for dir in [OBJECTS_DIR, "refs/heads", "refs/tags"] {
            std::fs::create_dir_all(repo_dir.join(dir))?;
        }

        let repository = Self::at(root)?;
        repository
            .refs
            .put(HEAD, RefValue::symbolic(DEFAULT_BRANCH))?;
        tracing::info!(path = %repo_dir.display(), "initialized empty repository");

        Ok(repository)
    }

    /// Open the repository containing `start`, searching parent directories
    pub fn open(start: &Path) -> anyhow::Result<Self> {
        let start = start.canonicalize()?;
        let root = start
            .ancestors()
            .find(|dir| dir.join(REPOSITORY_DIR).join(HEAD).is_file())
            .ok_or_else(|| {
                Error::precondition(format!(
                    "not a geobit repository (or any of the parent directories): {}",
                    start.display()
                ))
            })?;

        Self::at(root)
    }

    fn at(root: &Path) -> anyhow::Result<Self> {
        let repo_dir = root.join(REPOSITORY_DIR);
        let objects: Arc<dyn ObjectStore> =
            Arc::new(FileObjectStore::new(repo_dir.join(OBJECTS_DIR).into_boxed_path()));
        let refs: Arc<dyn RefDatabase> = Arc::new(FileRefDatabase::new(repo_dir.clone().into_boxed_path()));

        let mut index = StagingArea::new(
            objects.clone(),
            refs.clone(),
            Some(repo_dir.join(CONFLICTS_FILE).into_boxed_path()),
        );
        index.rehydrate()?;

        Ok(Repository {
            root: Some(root.to_path_buf().into_boxed_path()),
            objects,
            refs,
            index: Arc::new(Mutex::new(index)),
            config: Arc::new(FileConfig::new(repo_dir.join(CONFIG_FILE).into_boxed_path())),
            platform: Arc::new(SystemPlatform),
        })
    }

    /// Directory holding `.geobit`, `None` for in-memory repositories
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub(crate) fn config_handle(&self) -> &Arc<dyn ConfigProvider> {
        &self.config
    }

    pub(crate) fn platform_handle(&self) -> &Arc<dyn Platform> {
        &self.platform
    }
}

impl Context for Repository {
    fn objects(&self) -> &Arc<dyn ObjectStore> {
        &self.objects
    }

    fn refs(&self) -> &Arc<dyn RefDatabase> {
        &self.refs
    }

    fn index(&self) -> &Arc<Mutex<StagingArea>> {
        &self.index
    }

    fn config(&self) -> &dyn ConfigProvider {
        self.config.as_ref()
    }

    fn platform(&self) -> &dyn Platform {
        self.platform.as_ref()
    }
}
