//! working tree access: scanning, reading and writing tracked files

use std::collections::BTreeMap;
use std::fs::{self, Permissions};
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Component, Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Error, IoResultExt, Result};
use crate::hash::compute_blob_hash;
use crate::index::IndexEntry;
use crate::repo::{Repo, META_DIR};
use crate::types::FileMode;

/// stat information for one working tree file
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorktreeFile {
    pub size: u64,
    pub mtime: i64,
    pub mode: FileMode,
}

impl WorktreeFile {
    fn from_metadata(meta: &fs::Metadata) -> Self {
        Self {
            size: meta.len(),
            mtime: meta.mtime(),
            mode: FileMode::from_permissions(meta.mode()),
        }
    }

    /// index entry for this file's content
    pub fn index_entry(&self, hash: crate::Hash) -> IndexEntry {
        IndexEntry {
            hash,
            mode: self.mode,
            size: self.size,
            mtime: self.mtime,
        }
    }
}

/// every regular file below the working tree root, keyed by relative path
///
/// the metadata directory is skipped. symlinks and special files are not
/// tracked.
pub fn scan(repo: &Repo) -> Result<BTreeMap<String, WorktreeFile>> {
    let root = repo.workdir();
    let mut files = BTreeMap::new();

    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !(e.depth() == 1 && e.file_name() == META_DIR));

    for entry in walker {
        let entry = entry.map_err(|e| walk_error(root, e))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let meta = entry.metadata().map_err(|e| walk_error(root, e))?;
        let rel = relative_path(repo, entry.path())?;
        files.insert(rel, WorktreeFile::from_metadata(&meta));
    }

    debug!(files = files.len(), "scanned working tree");
    Ok(files)
}

fn walk_error(root: &Path, e: walkdir::Error) -> Error {
    let path = e.path().unwrap_or(root).to_path_buf();
    Error::Io {
        path,
        source: e
            .into_io_error()
            .unwrap_or_else(|| std::io::Error::other("walkdir error")),
    }
}

/// absolute path of a tracked file
pub fn file_path(repo: &Repo, rel: &str) -> PathBuf {
    repo.workdir().join(rel)
}

/// slash-separated path of `path` relative to the working tree root
pub fn relative_path(repo: &Repo, path: &Path) -> Result<String> {
    let rel = path
        .strip_prefix(repo.workdir())
        .map_err(|_| Error::PathOutsideRepo(path.to_path_buf()))?;

    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            _ => return Err(Error::PathOutsideRepo(path.to_path_buf())),
        }
    }
    Ok(parts.join("/"))
}

/// stat a tracked path; None if it is absent or not a regular file
pub fn stat_file(repo: &Repo, rel: &str) -> Result<Option<WorktreeFile>> {
    let path = file_path(repo, rel);
    match fs::symlink_metadata(&path) {
        Ok(meta) if meta.file_type().is_file() => Ok(Some(WorktreeFile::from_metadata(&meta))),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        // a file where a directory is expected
        Err(e) if e.raw_os_error() == Some(nix::libc::ENOTDIR) => Ok(None),
        Err(e) => Err(Error::Io { path, source: e }),
    }
}

/// non-directory entries below `rel` when it is a directory
pub fn files_under(repo: &Repo, rel: &str) -> Result<Vec<String>> {
    let root = file_path(repo, rel);
    match fs::symlink_metadata(&root) {
        Ok(meta) if meta.is_dir() => {}
        _ => return Ok(Vec::new()),
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&root).min_depth(1).follow_links(false) {
        let entry = entry.map_err(|e| walk_error(&root, e))?;
        if !entry.file_type().is_dir() {
            files.push(relative_path(repo, entry.path())?);
        }
    }
    files.sort();
    Ok(files)
}

/// the nearest ancestor of `rel` that exists as something other than a directory
pub fn file_ancestor(repo: &Repo, rel: &str) -> Option<String> {
    let components: Vec<&str> = rel.split('/').collect();
    for depth in 1..components.len() {
        let ancestor = components[..depth].join("/");
        match fs::symlink_metadata(file_path(repo, &ancestor)) {
            Ok(meta) if meta.is_dir() => continue,
            Ok(_) => return Some(ancestor),
            Err(_) => return None,
        }
    }
    None
}

pub fn read_file(repo: &Repo, rel: &str) -> Result<Vec<u8>> {
    let path = file_path(repo, rel);
    fs::read(&path).with_path(&path)
}

/// whether the working tree file still holds the staged content
///
/// a size mismatch is decisive; otherwise the content is rehashed.
pub fn matches_entry(repo: &Repo, rel: &str, file: &WorktreeFile, entry: &IndexEntry) -> Result<bool> {
    if file.size != entry.size && entry.size != 0 {
        return Ok(false);
    }
    if file.mode != entry.mode {
        return Ok(false);
    }
    let content = read_file(repo, rel)?;
    Ok(compute_blob_hash(&content) == entry.hash)
}

/// write a tracked file, creating parent directories
///
/// anything occupying the path or one of its parents is replaced.
pub fn write_file(repo: &Repo, rel: &str, content: &[u8], mode: FileMode) -> Result<WorktreeFile> {
    let path = file_path(repo, rel);

    clear_parents(repo, rel)?;
    if let Ok(meta) = fs::symlink_metadata(&path) {
        if meta.is_dir() {
            fs::remove_dir_all(&path).with_path(&path)?;
        }
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_path(parent)?;
    }

    fs::write(&path, content).with_path(&path)?;
    let perm = match mode {
        FileMode::Executable => 0o755,
        _ => 0o644,
    };
    fs::set_permissions(&path, Permissions::from_mode(perm)).with_path(&path)?;

    let meta = fs::symlink_metadata(&path).with_path(&path)?;
    Ok(WorktreeFile::from_metadata(&meta))
}

/// remove files standing where `rel` needs a directory
fn clear_parents(repo: &Repo, rel: &str) -> Result<()> {
    let mut current = repo.workdir().to_path_buf();
    let components: Vec<&str> = rel.split('/').collect();
    for part in &components[..components.len().saturating_sub(1)] {
        current.push(part);
        match fs::symlink_metadata(&current) {
            Ok(meta) if !meta.is_dir() => {
                fs::remove_file(&current).with_path(&current)?;
                return Ok(());
            }
            Ok(_) => {}
            Err(_) => return Ok(()),
        }
    }
    Ok(())
}

/// delete a tracked file and prune directories it leaves empty
pub fn remove_file(repo: &Repo, rel: &str) -> Result<()> {
    let path = file_path(repo, rel);
    match fs::remove_file(&path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::Io { path, source: e }),
    }

    let mut dir = path.parent();
    while let Some(current) = dir {
        if current == repo.workdir() {
            break;
        }
        // stops at the first non-empty directory
        if fs::remove_dir(current).is_err() {
            break;
        }
        dir = current.parent();
    }
    Ok(())
}

/// a path selector as accepted by `add` and `remove`
#[derive(Clone, Debug)]
pub enum Pathspec {
    /// `.`: every path
    All,
    /// an exact file or a directory prefix
    Prefix(String),
    Glob(glob::Pattern),
}

impl Pathspec {
    pub fn parse(pattern: &str) -> Result<Self> {
        let trimmed = pattern.trim_start_matches("./").trim_end_matches('/');
        if trimmed.is_empty() || trimmed == "." {
            return Ok(Pathspec::All);
        }

        if trimmed.contains(['*', '?', '[']) {
            let glob = glob::Pattern::new(trimmed)
                .map_err(|_| Error::PathspecNoMatch(pattern.to_string()))?;
            return Ok(Pathspec::Glob(glob));
        }

        Ok(Pathspec::Prefix(trimmed.to_string()))
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            Pathspec::All => true,
            Pathspec::Prefix(prefix) => {
                path == prefix
                    || path
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
            Pathspec::Glob(glob) => glob.matches(path),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Pathspec::All)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repo) {
        let dir = tempdir().unwrap();
        let repo_path = dir.path().join("repo");
        let repo = Repo::init(&repo_path).unwrap();
        (dir, repo)
    }

    #[test]
    fn test_scan_skips_metadata_dir() {
        let (_dir, repo) = test_repo();

        fs::write(repo.workdir().join("a.txt"), "a").unwrap();
        fs::create_dir_all(repo.workdir().join("sub/deep")).unwrap();
        fs::write(repo.workdir().join("sub/deep/b.txt"), "bb").unwrap();

        let files = scan(&repo).unwrap();
        let paths: Vec<&str> = files.keys().map(String::as_str).collect();
        assert_eq!(paths, vec!["a.txt", "sub/deep/b.txt"]);
        assert_eq!(files["sub/deep/b.txt"].size, 2);
    }

    #[test]
    fn test_write_and_remove_prunes_dirs() {
        let (_dir, repo) = test_repo();

        write_file(&repo, "x/y/z.txt", b"hello", FileMode::Normal).unwrap();
        assert_eq!(read_file(&repo, "x/y/z.txt").unwrap(), b"hello");

        remove_file(&repo, "x/y/z.txt").unwrap();
        assert!(!repo.workdir().join("x").exists());
        assert!(repo.workdir().exists());

        // removing again is a no-op
        remove_file(&repo, "x/y/z.txt").unwrap();
    }

    #[test]
    fn test_write_executable_mode() {
        let (_dir, repo) = test_repo();

        let file = write_file(&repo, "run.sh", b"#!/bin/sh\n", FileMode::Executable).unwrap();
        assert_eq!(file.mode, FileMode::Executable);
        assert_eq!(stat_file(&repo, "run.sh").unwrap(), Some(file));
    }

    #[test]
    fn test_files_under_and_file_ancestor() {
        let (_dir, repo) = test_repo();
        write_file(&repo, "d/one", b"1", FileMode::Normal).unwrap();
        write_file(&repo, "d/sub/two", b"2", FileMode::Normal).unwrap();
        write_file(&repo, "f", b"f", FileMode::Normal).unwrap();

        assert_eq!(files_under(&repo, "d").unwrap(), vec!["d/one", "d/sub/two"]);
        assert!(files_under(&repo, "f").unwrap().is_empty());
        assert!(files_under(&repo, "absent").unwrap().is_empty());

        assert_eq!(file_ancestor(&repo, "f/x/y"), Some("f".to_string()));
        assert_eq!(file_ancestor(&repo, "d/one/x"), Some("d/one".to_string()));
        assert_eq!(file_ancestor(&repo, "d/new"), None);
        assert_eq!(file_ancestor(&repo, "f"), None);
    }

    #[test]
    fn test_write_replaces_file_with_directory() {
        let (_dir, repo) = test_repo();

        write_file(&repo, "thing", b"file", FileMode::Normal).unwrap();
        write_file(&repo, "thing/inner.txt", b"nested", FileMode::Normal).unwrap();

        assert!(repo.workdir().join("thing").is_dir());
        assert_eq!(stat_file(&repo, "thing").unwrap(), None);
    }

    #[test]
    fn test_matches_entry() {
        let (_dir, repo) = test_repo();

        let file = write_file(&repo, "a.txt", b"same", FileMode::Normal).unwrap();
        let entry = file.index_entry(compute_blob_hash(b"same"));
        assert!(matches_entry(&repo, "a.txt", &file, &entry).unwrap());

        // same size, different content
        let file = write_file(&repo, "a.txt", b"diff", FileMode::Normal).unwrap();
        assert!(!matches_entry(&repo, "a.txt", &file, &entry).unwrap());
    }

    #[test]
    fn test_relative_path_outside_repo() {
        let (dir, repo) = test_repo();
        let outside = dir.path().join("elsewhere.txt");
        assert!(matches!(
            relative_path(&repo, &outside),
            Err(Error::PathOutsideRepo(_))
        ));
    }

    #[test]
    fn test_pathspec_forms() {
        assert!(Pathspec::parse(".").unwrap().is_all());
        assert!(Pathspec::parse("./").unwrap().is_all());

        let exact = Pathspec::parse("a.txt").unwrap();
        assert!(exact.matches("a.txt"));
        assert!(!exact.matches("a.txt.bak"));

        let dir = Pathspec::parse("src/").unwrap();
        assert!(dir.matches("src/main.rs"));
        assert!(dir.matches("src/deep/mod.rs"));
        assert!(!dir.matches("srcfile"));

        let glob = Pathspec::parse("*.txt").unwrap();
        assert!(glob.matches("a.txt"));
        assert!(glob.matches("dir/b.txt"));
        assert!(!glob.matches("c.rs"));
    }
}
