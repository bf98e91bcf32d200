//! DFS Adapter: the four operations `suspendVm`/`resumeVm` need against
//! whatever distributed filesystem the cluster manager provides. This core
//! never talks to a concrete DFS implementation directly — it only needs
//! the trait.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;

pub enum OpenMode {
    Read,
    Write,
}

pub trait ReadWrite: Read + Write + Send {}
impl<T: Read + Write + Send> ReadWrite for T {}

pub trait Dfs: Send + Sync {
    /// Resolve a DFS path to a handle usable as a local filesystem path
    /// (e.g. the target of `-drive file=`).
    fn get_local_handle(&self, path: &str) -> Result<PathBuf>;
    fn open(&self, path: &str, mode: OpenMode) -> Result<Box<dyn ReadWrite>>;
    fn copy_to(&self, local: &Path, remote: &str) -> Result<()>;
    fn copy_from(&self, remote: &str, local: &Path) -> Result<()>;
}

/// Stand-in DFS backed by a configured root directory on the local
/// filesystem, so the crate is runnable and testable without a real
/// distributed filesystem attached.
pub struct LocalDfs {
    root: PathBuf,
}

impl LocalDfs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl Dfs for LocalDfs {
    fn get_local_handle(&self, path: &str) -> Result<PathBuf> {
        Ok(self.resolve(path))
    }

    fn open(&self, path: &str, mode: OpenMode) -> Result<Box<dyn ReadWrite>> {
        let resolved = self.resolve(path);
        let file = match mode {
            OpenMode::Read => fs::File::open(&resolved)?,
            OpenMode::Write => {
                if let Some(parent) = resolved.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::File::create(&resolved)?
            }
        };
        Ok(Box::new(file))
    }

    fn copy_to(&self, local: &Path, remote: &str) -> Result<()> {
        let resolved = self.resolve(remote);
        if let Some(parent) = resolved.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(local, resolved)?;
        Ok(())
    }

    fn copy_from(&self, remote: &str, local: &Path) -> Result<()> {
        let resolved = self.resolve(remote);
        fs::copy(resolved, local)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "dfs_tests.rs"]
mod dfs_tests;
