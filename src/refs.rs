use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, IoResultExt, Result};
use crate::hash::Hash;
use crate::object::{object_exists, peel_to_commit};
use crate::repo::Repo;

/// name of the ref that tracks the checked-out branch or commit
pub const HEAD: &str = "HEAD";

/// pending merge parent, present between a merge and its commit
pub const MERGE_HEAD: &str = "MERGE_HEAD";

/// commit being cherry-picked, present while a pick is conflicted
pub const CHERRY_PICK_HEAD: &str = "CHERRY_PICK_HEAD";

/// prefix of branch refs
pub const HEADS_PREFIX: &str = "refs/heads/";

/// prefix of tag refs
pub const TAGS_PREFIX: &str = "refs/tags/";

/// longest chain of symbolic refs followed before giving up
pub const MAX_SYMREF_DEPTH: usize = 5;

const SYMREF_PREFIX: &str = "ref: ";

/// what a ref points at
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefTarget {
    Direct(Hash),
    Symbolic(String),
}

impl RefTarget {
    fn parse(name: &str, content: &str) -> Result<Self> {
        let content = content.trim();
        match content.strip_prefix(SYMREF_PREFIX) {
            Some(target) => Ok(RefTarget::Symbolic(target.trim().to_string())),
            None => Hash::from_hex(content).map(RefTarget::Direct).map_err(|_| {
                Error::DanglingRef {
                    name: name.to_string(),
                    reason: format!("unparseable ref content {:?}", content),
                }
            }),
        }
    }

    fn render(&self) -> String {
        match self {
            RefTarget::Direct(hash) => format!("{}\n", hash.to_hex()),
            RefTarget::Symbolic(target) => format!("{}{}\n", SYMREF_PREFIX, target),
        }
    }

    /// the digest, when this is a direct ref
    pub fn as_hash(&self) -> Option<&Hash> {
        match self {
            RefTarget::Direct(hash) => Some(hash),
            RefTarget::Symbolic(_) => None,
        }
    }
}

impl std::fmt::Display for RefTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefTarget::Direct(hash) => write!(f, "{}", hash),
            RefTarget::Symbolic(target) => write!(f, "{}{}", SYMREF_PREFIX, target),
        }
    }
}

/// a named ref and its target
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reference {
    pub name: String,
    pub target: RefTarget,
}

impl Reference {
    /// name without the `refs/heads/` or `refs/tags/` prefix
    pub fn short_name(&self) -> &str {
        self.name
            .strip_prefix(HEADS_PREFIX)
            .or_else(|| self.name.strip_prefix(TAGS_PREFIX))
            .unwrap_or(&self.name)
    }
}

/// read a ref without following it; None if it does not exist
pub fn read_ref(repo: &Repo, ref_name: &str) -> Result<Option<RefTarget>> {
    let path = ref_path(repo, ref_name);

    match fs::read_to_string(&path) {
        Ok(content) => RefTarget::parse(ref_name, &content).map(Some),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        // a directory at a ref path means only deeper refs exist
        Err(_) if path.is_dir() => Ok(None),
        Err(e) => Err(Error::Io { path, source: e }),
    }
}

/// check if a ref exists
pub fn ref_exists(repo: &Repo, ref_name: &str) -> bool {
    ref_path(repo, ref_name).is_file()
}

/// resolve a ref to a digest, following symbolic refs
pub fn resolve_ref(repo: &Repo, ref_name: &str) -> Result<Hash> {
    let mut current = ref_name.to_string();

    for depth in 0..=MAX_SYMREF_DEPTH {
        match read_ref(repo, &current)? {
            None if depth == 0 => return Err(Error::RefNotFound(ref_name.to_string())),
            None => {
                return Err(Error::DanglingRef {
                    name: ref_name.to_string(),
                    reason: format!("{} does not exist", current),
                })
            }
            Some(RefTarget::Direct(hash)) => {
                if !object_exists(repo, &hash) {
                    return Err(Error::DanglingRef {
                        name: ref_name.to_string(),
                        reason: format!("{} points at missing object {}", current, hash),
                    });
                }
                return Ok(hash);
            }
            Some(RefTarget::Symbolic(target)) => current = target,
        }
    }

    Err(Error::DanglingRef {
        name: ref_name.to_string(),
        reason: format!("symbolic ref chain longer than {}", MAX_SYMREF_DEPTH),
    })
}

/// write a ref unconditionally
///
/// used for state refs and fresh repositories; branch and tag movement goes
/// through `update_ref`.
pub fn write_ref(repo: &Repo, ref_name: &str, target: &RefTarget) -> Result<()> {
    validate_ref_name(ref_name)?;

    let path = ref_path(repo, ref_name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_path(parent)?;
    }

    // atomic write: temp -> fsync -> rename
    let tmp_path = repo.tmp_path().join(uuid::Uuid::new_v4().to_string());
    {
        let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
        tmp_file
            .write_all(target.render().as_bytes())
            .with_path(&tmp_path)?;
        tmp_file.sync_all().with_path(&tmp_path)?;
    }
    fs::rename(&tmp_path, &path).with_path(&path)?;
    sync_parent(&path)?;

    debug!(ref_name, target = %target, "wrote ref");
    Ok(())
}

/// remove a ref unconditionally; missing refs are ignored
pub fn remove_ref(repo: &Repo, ref_name: &str) -> Result<()> {
    let path = ref_path(repo, ref_name);
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Io { path, source: e }),
    }
}

/// atomically replace a ref if it currently equals `expected_old`
///
/// `expected_old = None` requires the ref to be absent. returns false when
/// the current value differs or another writer holds the ref lock; the
/// caller re-reads and decides whether to retry.
pub fn update_ref(
    repo: &Repo,
    ref_name: &str,
    expected_old: Option<&RefTarget>,
    new: &RefTarget,
) -> Result<bool> {
    validate_ref_name(ref_name)?;

    let path = ref_path(repo, ref_name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_path(parent)?;
    }

    let Some(mut lock) = RefLock::acquire(&path)? else {
        warn!(ref_name, "ref is locked by another writer");
        return Ok(false);
    };

    let current = read_ref(repo, ref_name)?;
    if current.as_ref() != expected_old {
        debug!(
            ref_name,
            expected = ?expected_old,
            actual = ?current,
            "ref compare-and-swap mismatch"
        );
        return Ok(false);
    }

    lock.commit(new)?;
    debug!(ref_name, target = %new, "updated ref");
    Ok(true)
}

/// atomically delete a ref if it currently equals `expected_old`
pub fn delete_ref(repo: &Repo, ref_name: &str, expected_old: &RefTarget) -> Result<bool> {
    validate_ref_name(ref_name)?;

    let path = ref_path(repo, ref_name);
    if !path.is_file() {
        return Err(Error::RefNotFound(ref_name.to_string()));
    }

    let Some(_lock) = RefLock::acquire(&path)? else {
        warn!(ref_name, "ref is locked by another writer");
        return Ok(false);
    };

    let current = read_ref(repo, ref_name)?;
    if current.as_ref() != Some(expected_old) {
        debug!(ref_name, "ref delete mismatch");
        return Ok(false);
    }

    fs::remove_file(&path).with_path(&path)?;
    debug!(ref_name, "deleted ref");
    Ok(true)
}

/// list refs whose name starts with `prefix`, sorted by name
pub fn list_refs(repo: &Repo, prefix: &str) -> Result<Vec<Reference>> {
    let refs_dir = repo.refs_path();
    let mut names = Vec::new();

    if refs_dir.exists() {
        collect_refs(repo.path(), &refs_dir, &mut names)?;
    }

    names.retain(|name| name.starts_with(prefix));
    names.sort();

    let mut refs = Vec::with_capacity(names.len());
    for name in names {
        if let Some(target) = read_ref(repo, &name)? {
            refs.push(Reference { name, target });
        }
    }
    Ok(refs)
}

/// current value of HEAD
pub fn head(repo: &Repo) -> Result<RefTarget> {
    read_ref(repo, HEAD)?.ok_or_else(|| Error::RefNotFound(HEAD.to_string()))
}

/// full name of the branch HEAD is attached to, None when detached
pub fn head_ref_name(repo: &Repo) -> Result<Option<String>> {
    match head(repo)? {
        RefTarget::Symbolic(name) => Ok(Some(name)),
        RefTarget::Direct(_) => Ok(None),
    }
}

/// short name of the checked-out branch, None when detached
pub fn current_branch(repo: &Repo) -> Result<Option<String>> {
    Ok(head_ref_name(repo)?.map(|name| match name.strip_prefix(HEADS_PREFIX) {
        Some(short) => short.to_string(),
        None => name,
    }))
}

/// commit HEAD points at, None while the current branch is unborn
pub fn head_commit(repo: &Repo) -> Result<Option<Hash>> {
    match head(repo)? {
        RefTarget::Direct(hash) => Ok(Some(hash)),
        RefTarget::Symbolic(name) => {
            if read_ref(repo, &name)?.is_none() {
                return Ok(None);
            }
            resolve_ref(repo, &name).map(Some)
        }
    }
}

/// move whatever HEAD designates from `expected_old` to `new`
///
/// advances the attached branch, or HEAD itself when detached. a lost race
/// surfaces as `ConcurrentUpdate`.
pub fn advance_head(repo: &Repo, expected_old: Option<Hash>, new: Hash) -> Result<()> {
    let ref_name = head_ref_name(repo)?.unwrap_or_else(|| HEAD.to_string());
    let expected = expected_old.map(RefTarget::Direct);

    if !update_ref(repo, &ref_name, expected.as_ref(), &RefTarget::Direct(new))? {
        return Err(Error::ConcurrentUpdate(ref_name));
    }
    Ok(())
}

/// resolve a revision string to a commit digest
///
/// accepts a full hex digest, `HEAD`, a full ref name, or a short branch or
/// tag name. tags are peeled to the commit they point at.
pub fn resolve_revision(repo: &Repo, rev: &str) -> Result<Hash> {
    let target = resolve_revision_target(repo, rev)?;
    let (hash, _) = peel_to_commit(repo, &target)?;
    Ok(hash)
}

fn resolve_revision_target(repo: &Repo, rev: &str) -> Result<Hash> {
    if Hash::looks_like_hex(rev) {
        let hash = Hash::from_hex(rev)?;
        if !object_exists(repo, &hash) {
            return Err(Error::RevisionNotFound(rev.to_string()));
        }
        return Ok(hash);
    }

    if rev == HEAD {
        return head_commit(repo)?.ok_or(Error::UnbornHead);
    }

    let candidates = [
        rev.to_string(),
        format!("{}{}", HEADS_PREFIX, rev),
        format!("{}{}", TAGS_PREFIX, rev),
    ];
    for candidate in candidates {
        if candidate.starts_with("refs/") && ref_exists(repo, &candidate) {
            return resolve_ref(repo, &candidate);
        }
    }

    Err(Error::RevisionNotFound(rev.to_string()))
}

/// check a ref name before it touches the filesystem
pub fn validate_ref_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidRef("empty ref name".to_string()));
    }

    if name.starts_with('/') || name.ends_with('/') {
        return Err(Error::InvalidRef(format!(
            "ref name cannot start or end with '/': {}",
            name
        )));
    }

    if name.contains("//") {
        return Err(Error::InvalidRef(format!(
            "ref name cannot contain '//': {}",
            name
        )));
    }

    if name.contains('\0') || name.chars().any(char::is_whitespace) {
        return Err(Error::InvalidRef(format!(
            "ref name cannot contain whitespace or null bytes: {:?}",
            name
        )));
    }

    if name.ends_with(".lock") {
        return Err(Error::InvalidRef(format!(
            "ref name cannot end with '.lock': {}",
            name
        )));
    }

    // check for path traversal
    for component in name.split('/') {
        if component == "." || component == ".." {
            return Err(Error::InvalidRef(format!(
                "ref name cannot contain '.' or '..': {}",
                name
            )));
        }
    }

    Ok(())
}

/// refs live under the metadata directory: `HEAD`, `refs/heads/x`, ...
fn ref_path(repo: &Repo, ref_name: &str) -> PathBuf {
    repo.path().join(ref_name)
}

fn sync_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        let dir = File::open(parent).with_path(parent)?;
        dir.sync_all().with_path(parent)?;
    }
    Ok(())
}

/// recursively collect ref names below `dir`, relative to `base`
fn collect_refs(base: &Path, dir: &Path, refs: &mut Vec<String>) -> Result<()> {
    for entry in fs::read_dir(dir).with_path(dir)? {
        let entry = entry.with_path(dir)?;
        let path = entry.path();

        if path.is_dir() {
            collect_refs(base, &path, refs)?;
        } else if path.is_file() && path.extension().map_or(true, |ext| ext != "lock") {
            if let Ok(rel) = path.strip_prefix(base) {
                let components: Vec<_> = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect();
                refs.push(components.join("/"));
            }
        }
    }
    Ok(())
}

/// exclusive `<ref>.lock` file; removed on drop unless committed
struct RefLock {
    lock_path: PathBuf,
    ref_path: PathBuf,
    file: Option<File>,
    committed: bool,
}

impl RefLock {
    /// None when the lock is already held
    fn acquire(ref_path: &Path) -> Result<Option<Self>> {
        let mut name = ref_path.as_os_str().to_os_string();
        name.push(".lock");
        let lock_path = PathBuf::from(name);

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(file) => Ok(Some(Self {
                lock_path,
                ref_path: ref_path.to_path_buf(),
                file: Some(file),
                committed: false,
            })),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(Error::Io {
                path: lock_path,
                source: e,
            }),
        }
    }

    /// write the new value into the lock file and rename it over the ref
    fn commit(&mut self, target: &RefTarget) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.write_all(target.render().as_bytes())
                .with_path(&self.lock_path)?;
            file.sync_all().with_path(&self.lock_path)?;
        }
        fs::rename(&self.lock_path, &self.ref_path).with_path(&self.ref_path)?;
        self.committed = true;
        sync_parent(&self.ref_path)
    }
}

impl Drop for RefLock {
    fn drop(&mut self) {
        // once renamed, the lock path may already belong to the next writer
        if !self.committed {
            let _ = fs::remove_file(&self.lock_path);
        }
    }
}
