use std::fs::File;
use std::path::{Path, PathBuf};

use nix::fcntl::{Flock, FlockArg};
use tracing::info;

use crate::config::Config;
use crate::error::{Error, IoResultExt, Result};
use crate::index::Index;
use crate::refs::{self, RefTarget};

/// name of the metadata directory inside the working tree
pub const META_DIR: &str = ".grove";

/// a grove repository: a working tree plus its metadata directory
///
/// the handle owns the loaded config and index. there is no global state;
/// several handles may coexist in one process.
pub struct Repo {
    workdir: PathBuf,
    path: PathBuf,
    config: Config,
    index: Index,
}

impl Repo {
    /// initialize a repository in the given working directory
    ///
    /// missing directories are created. calling this on an existing
    /// repository opens it without modification.
    pub fn init(workdir: &Path) -> Result<Self> {
        let path = workdir.join(META_DIR);
        if path.join("config.toml").exists() {
            return Self::open(workdir);
        }

        // create directory structure
        std::fs::create_dir_all(path.join("objects")).with_path(&path)?;
        std::fs::create_dir_all(path.join("refs/heads")).with_path(&path)?;
        std::fs::create_dir_all(path.join("refs/tags")).with_path(&path)?;
        std::fs::create_dir_all(path.join("tmp")).with_path(&path)?;

        let config = Config::default();
        let repo = Self {
            workdir: workdir.to_path_buf(),
            path,
            config,
            index: Index::default(),
        };

        let head = RefTarget::Symbolic(format!("refs/heads/{}", repo.config.init.default_branch));
        refs::write_ref(&repo, refs::HEAD, &head)?;
        repo.save_index()?;

        // config last: its presence marks a complete repository
        repo.config.save(&repo.config_path())?;

        info!(path = %workdir.display(), "initialized repository");
        Ok(repo)
    }

    /// open an existing repository
    pub fn open(workdir: &Path) -> Result<Self> {
        let path = workdir.join(META_DIR);
        let config_path = path.join("config.toml");
        if !config_path.exists() {
            return Err(Error::NoRepo(workdir.to_path_buf()));
        }

        let config = Config::load(&config_path)?;
        let index = Index::load(&path.join("index"))?;

        Ok(Self {
            workdir: workdir.to_path_buf(),
            path,
            config,
            index,
        })
    }

    /// working tree root
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// metadata directory path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// repository configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// mutable access to configuration
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// save configuration changes
    pub fn save_config(&self) -> Result<()> {
        self.config.save(&self.config_path())
    }

    /// staging area as loaded by this handle
    pub fn index(&self) -> &Index {
        &self.index
    }

    /// mutable access to the staging area; call `save_index` to persist
    pub fn index_mut(&mut self) -> &mut Index {
        &mut self.index
    }

    /// replace the staging area wholesale
    pub fn set_index(&mut self, index: Index) {
        self.index = index;
    }

    /// persist the staging area
    pub fn save_index(&self) -> Result<()> {
        self.index.save(&self.index_path(), &self.tmp_path())
    }

    /// path to config.toml
    pub fn config_path(&self) -> PathBuf {
        self.path.join("config.toml")
    }

    /// path to objects directory
    pub fn objects_path(&self) -> PathBuf {
        self.path.join("objects")
    }

    /// path to refs directory
    pub fn refs_path(&self) -> PathBuf {
        self.path.join("refs")
    }

    /// path to the index file
    pub fn index_path(&self) -> PathBuf {
        self.path.join("index")
    }

    /// path to tmp directory (for atomic writes)
    pub fn tmp_path(&self) -> PathBuf {
        self.path.join("tmp")
    }

    /// path to lock file
    pub fn lock_path(&self) -> PathBuf {
        self.path.join(".lock")
    }

    /// acquire exclusive lock on repository
    /// returns a guard that releases the lock on drop
    pub fn lock(&self) -> Result<RepoLock> {
        let lock_path = self.lock_path();
        let file = File::create(&lock_path).with_path(&lock_path)?;

        let flock = Flock::lock(file, FlockArg::LockExclusiveNonblock)
            .map_err(|_| Error::LockContention)?;

        Ok(RepoLock { flock })
    }

    /// try to acquire exclusive lock, returning None if already locked
    pub fn try_lock(&self) -> Result<Option<RepoLock>> {
        let lock_path = self.lock_path();
        let file = File::create(&lock_path).with_path(&lock_path)?;

        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(flock) => Ok(Some(RepoLock { flock })),
            Err((_, nix::errno::Errno::EWOULDBLOCK)) => Ok(None),
            Err(_) => Err(Error::LockContention),
        }
    }
}

/// guard that holds repository lock until dropped
pub struct RepoLock {
    #[allow(dead_code)]
    flock: Flock<File>,
}
