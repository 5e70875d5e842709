use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::object::write_blob;
use crate::repo::Repo;
use crate::worktree::{self, Pathspec};

/// stage working tree files matching `pattern`
///
/// `.` selects every file; otherwise an exact path, a directory prefix or a
/// glob. returns the staged paths. deletions are not staged; use `remove`.
pub fn add(repo: &mut Repo, pattern: &str) -> Result<Vec<String>> {
    let spec = Pathspec::parse(pattern)?;
    let files = worktree::scan(repo)?;

    let matched: Vec<_> = files
        .into_iter()
        .filter(|(path, _)| spec.matches(path))
        .collect();

    if matched.is_empty() && !spec.is_all() {
        return Err(Error::PathspecNoMatch(pattern.to_string()));
    }

    let mut staged = Vec::with_capacity(matched.len());
    for (path, file) in matched {
        let content = worktree::read_file(repo, &path)?;
        let hash = write_blob(repo, &content)?;
        debug!(path = %path, hash = %hash.short(), "staged file");

        repo.index_mut().stage(path.clone(), file.index_entry(hash));
        staged.push(path);
    }

    repo.save_index()?;
    info!(pattern, staged = staged.len(), "add");
    Ok(staged)
}

/// unstage paths matching `pattern` and delete them from the working tree
///
/// returns the removed paths.
pub fn remove(repo: &mut Repo, pattern: &str) -> Result<Vec<String>> {
    let spec = Pathspec::parse(pattern)?;

    let matched: Vec<String> = repo
        .index()
        .paths()
        .filter(|path| spec.matches(path))
        .map(str::to_string)
        .collect();

    if matched.is_empty() {
        return Err(Error::PathspecNoMatch(pattern.to_string()));
    }

    for path in &matched {
        repo.index_mut().unstage(path);
        worktree::remove_file(repo, path)?;
    }

    repo.save_index()?;
    info!(pattern, removed = matched.len(), "remove");
    Ok(matched)
}
