use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use tracing::debug;

use crate::error::Result;
use crate::hash::Hash;
use crate::object::read_commit;
use crate::refs::resolve_revision;
use crate::repo::Repo;
use crate::types::{Commit, CommitInfo};

/// commit history reachable from a set of start commits
///
/// reachable commits are loaded into an arena keyed by digest up front;
/// iteration then emits them children-first. among commits that are ready
/// at the same time the newer timestamp wins, then the larger digest.
/// `restart` rewinds the walk without touching the object store again.
///
/// a bounded walk from one start loads only the commits it will emit while
/// the history it crosses is linear; the first merge commit inside the
/// bound falls back to loading everything reachable.
pub struct History {
    arena: HashMap<Hash, Commit>,
    max_count: Option<usize>,
    pending_children: HashMap<Hash, usize>,
    ready: BinaryHeap<Ready>,
    emitted: usize,
}

#[derive(PartialEq, Eq, PartialOrd, Ord)]
struct Ready {
    timestamp: i64,
    hash: Hash,
}

impl History {
    fn load(repo: &Repo, starts: &[Hash], max_count: Option<usize>) -> Result<Self> {
        let mut arena = HashMap::new();
        let mut queue: VecDeque<Hash> = starts.iter().copied().collect();

        if let ([start], Some(max)) = (starts, max_count) {
            queue.clear();
            let mut cursor = Some(*start);
            while let Some(hash) = cursor.take() {
                let commit = read_commit(repo, &hash)?;
                let parents = commit.parents.clone();
                arena.insert(hash, commit);
                if arena.len() >= max {
                    break;
                }
                match parents.as_slice() {
                    [parent] => cursor = Some(*parent),
                    parents => queue.extend(parents.iter().copied()),
                }
            }
        }

        while let Some(hash) = queue.pop_front() {
            if arena.contains_key(&hash) {
                continue;
            }
            let commit = read_commit(repo, &hash)?;
            queue.extend(commit.parents.iter().copied());
            arena.insert(hash, commit);
        }

        debug!(commits = arena.len(), "loaded history");

        let mut history = Self {
            arena,
            max_count,
            pending_children: HashMap::new(),
            ready: BinaryHeap::new(),
            emitted: 0,
        };
        history.restart();
        Ok(history)
    }

    /// rewind to the first commit
    pub fn restart(&mut self) {
        let mut pending: HashMap<Hash, usize> = self.arena.keys().map(|h| (*h, 0)).collect();
        for commit in self.arena.values() {
            for parent in &commit.parents {
                if let Some(count) = pending.get_mut(parent) {
                    *count += 1;
                }
            }
        }

        self.ready = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(hash, _)| Ready {
                timestamp: self.arena[hash].timestamp,
                hash: *hash,
            })
            .collect();
        self.pending_children = pending;
        self.emitted = 0;
    }

    /// number of commits loaded from the start points
    pub fn reachable(&self) -> usize {
        self.arena.len()
    }

    /// whether a commit was loaded by this walk
    pub fn contains(&self, hash: &Hash) -> bool {
        self.arena.contains_key(hash)
    }
}

impl Iterator for History {
    type Item = CommitInfo;

    fn next(&mut self) -> Option<CommitInfo> {
        if self.max_count.is_some_and(|max| self.emitted >= max) {
            return None;
        }

        let Ready { hash, .. } = self.ready.pop()?;
        let commit = self.arena.get(&hash)?.clone();

        for parent in &commit.parents {
            if let Some(count) = self.pending_children.get_mut(parent) {
                *count -= 1;
                if *count == 0 {
                    self.ready.push(Ready {
                        timestamp: self.arena[parent].timestamp,
                        hash: *parent,
                    });
                }
            }
        }

        self.emitted += 1;
        Some(CommitInfo { hash, commit })
    }
}

/// history of a revision, newest first
pub fn log(repo: &Repo, rev: &str, max_count: Option<usize>) -> Result<History> {
    let start = resolve_revision(repo, rev)?;
    walk(repo, &[start], max_count)
}

/// history reachable from several start commits
pub fn walk(repo: &Repo, starts: &[Hash], max_count: Option<usize>) -> Result<History> {
    History::load(repo, starts, max_count)
}

/// nearest common ancestor of two commits
///
/// marks every ancestor of `a`, then walks breadth-first from `b` and
/// returns the first marked commit. criss-cross histories get one of the
/// candidates, not the full set.
pub fn merge_base(repo: &Repo, a: &Hash, b: &Hash) -> Result<Option<Hash>> {
    let marked = ancestors(repo, a)?;

    let mut queue = VecDeque::from([*b]);
    let mut visited = HashSet::new();
    while let Some(hash) = queue.pop_front() {
        if !visited.insert(hash) {
            continue;
        }
        if marked.contains(&hash) {
            return Ok(Some(hash));
        }
        queue.extend(read_commit(repo, &hash)?.parents);
    }
    Ok(None)
}

/// whether `ancestor` is reachable from `descendant` (a commit is its own ancestor)
pub fn is_ancestor(repo: &Repo, ancestor: &Hash, descendant: &Hash) -> Result<bool> {
    let mut queue = VecDeque::from([*descendant]);
    let mut visited = HashSet::new();

    while let Some(hash) = queue.pop_front() {
        if hash == *ancestor {
            return Ok(true);
        }
        if !visited.insert(hash) {
            continue;
        }
        queue.extend(read_commit(repo, &hash)?.parents);
    }
    Ok(false)
}

fn ancestors(repo: &Repo, start: &Hash) -> Result<HashSet<Hash>> {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([*start]);
    while let Some(hash) = queue.pop_front() {
        if !seen.insert(hash) {
            continue;
        }
        queue.extend(read_commit(repo, &hash)?.parents);
    }
    Ok(seen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{write_commit, write_flat_tree, FlatTree};
    use crate::refs::{write_ref, RefTarget};
    use crate::types::Signature;
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repo) {
        let dir = tempdir().unwrap();
        let repo_path = dir.path().join("repo");
        let repo = Repo::init(&repo_path).unwrap();
        (dir, repo)
    }

    fn commit_at(repo: &Repo, parents: &[Hash], timestamp: i64, message: &str) -> Hash {
        let tree = write_flat_tree(repo, &FlatTree::new()).unwrap();
        let sig = Signature::new("Ada", "ada@example.com");
        let commit = Commit::with_timestamp(tree, parents.to_vec(), sig.clone(), sig, timestamp, message);
        write_commit(repo, &commit).unwrap()
    }

    fn messages(history: History) -> Vec<String> {
        history.map(|info| info.commit.message).collect()
    }

    #[test]
    fn test_linear_log_newest_first() {
        let (_dir, repo) = test_repo();

        let c1 = commit_at(&repo, &[], 100, "first");
        let c2 = commit_at(&repo, &[c1], 200, "second");
        let c3 = commit_at(&repo, &[c2], 300, "third");
        write_ref(&repo, "refs/heads/master", &RefTarget::Direct(c3)).unwrap();

        let history = log(&repo, "HEAD", None).unwrap();
        assert_eq!(history.reachable(), 3);
        assert_eq!(messages(history), vec!["third", "second", "first"]);
    }

    #[test]
    fn test_log_max_count() {
        let (_dir, repo) = test_repo();

        let c1 = commit_at(&repo, &[], 100, "first");
        let c2 = commit_at(&repo, &[c1], 200, "second");

        let history = walk(&repo, &[c2], Some(1)).unwrap();
        assert_eq!(messages(history), vec!["second"]);
    }

    #[test]
    fn test_bounded_linear_walk_stops_early() {
        let (_dir, repo) = test_repo();

        let c1 = commit_at(&repo, &[], 100, "first");
        let c2 = commit_at(&repo, &[c1], 200, "second");
        let c3 = commit_at(&repo, &[c2], 300, "third");

        let history = walk(&repo, &[c3], Some(2)).unwrap();
        assert_eq!(history.reachable(), 2);
        assert!(!history.contains(&c1));
        assert_eq!(messages(history), vec!["third", "second"]);
    }

    #[test]
    fn test_bounded_walk_through_merge_stays_topological() {
        let (_dir, repo) = test_repo();

        let root = commit_at(&repo, &[], 100, "root");
        let left = commit_at(&repo, &[root], 300, "left");
        let right = commit_at(&repo, &[root], 200, "right");
        let merge = commit_at(&repo, &[left, right], 400, "merge");
        let tip = commit_at(&repo, &[merge], 500, "tip");

        let history = walk(&repo, &[tip], Some(4)).unwrap();
        assert_eq!(history.reachable(), 5);
        assert_eq!(messages(history), vec!["tip", "merge", "left", "right"]);
    }

    #[test]
    fn test_children_before_parents_despite_clock_skew() {
        let (_dir, repo) = test_repo();

        // child has an older timestamp than its parent
        let parent = commit_at(&repo, &[], 500, "parent");
        let child = commit_at(&repo, &[parent], 100, "child");

        let history = walk(&repo, &[child], None).unwrap();
        assert_eq!(messages(history), vec!["child", "parent"]);
    }

    #[test]
    fn test_merge_history_is_topological() {
        let (_dir, repo) = test_repo();

        let root = commit_at(&repo, &[], 100, "root");
        let left = commit_at(&repo, &[root], 200, "left");
        let right = commit_at(&repo, &[root], 300, "right");
        let merge = commit_at(&repo, &[left, right], 400, "merge");

        let order = messages(walk(&repo, &[merge], None).unwrap());
        assert_eq!(order, vec!["merge", "right", "left", "root"]);
    }

    #[test]
    fn test_equal_timestamps_are_deterministic() {
        let (_dir, repo) = test_repo();

        let root = commit_at(&repo, &[], 100, "root");
        let a = commit_at(&repo, &[root], 200, "a");
        let b = commit_at(&repo, &[root], 200, "b");

        let first: Vec<Hash> = walk(&repo, &[a, b], None).unwrap().map(|i| i.hash).collect();
        let second: Vec<Hash> = walk(&repo, &[b, a], None).unwrap().map(|i| i.hash).collect();
        assert_eq!(first, second);
        assert_eq!(first[0], a.max(b));
        assert_eq!(first[2], root);
    }

    #[test]
    fn test_restart_replays_walk() {
        let (_dir, repo) = test_repo();

        let c1 = commit_at(&repo, &[], 100, "first");
        let c2 = commit_at(&repo, &[c1], 200, "second");

        let mut history = walk(&repo, &[c2], None).unwrap();
        let first: Vec<Hash> = history.by_ref().map(|i| i.hash).collect();
        assert!(history.next().is_none());

        history.restart();
        let second: Vec<Hash> = history.map(|i| i.hash).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_merge_base_and_ancestry() {
        let (_dir, repo) = test_repo();

        let root = commit_at(&repo, &[], 100, "root");
        let base = commit_at(&repo, &[root], 200, "base");
        let ours = commit_at(&repo, &[base], 300, "ours");
        let theirs = commit_at(&repo, &[base], 400, "theirs");
        let unrelated = commit_at(&repo, &[], 500, "unrelated");

        assert_eq!(merge_base(&repo, &ours, &theirs).unwrap(), Some(base));
        assert_eq!(merge_base(&repo, &ours, &base).unwrap(), Some(base));
        assert_eq!(merge_base(&repo, &ours, &unrelated).unwrap(), None);

        assert!(is_ancestor(&repo, &root, &theirs).unwrap());
        assert!(is_ancestor(&repo, &ours, &ours).unwrap());
        assert!(!is_ancestor(&repo, &ours, &theirs).unwrap());
    }
}
