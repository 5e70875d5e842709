use serde::{Deserialize, Serialize};

use crate::hash::Hash;

/// name and email of an author, committer or tagger
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
}

impl Signature {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// a commit object pointing to a tree with metadata
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// root tree hash
    pub tree: Hash,
    /// parent commit hashes (empty for initial, 1 for linear, 2+ for merge)
    pub parents: Vec<Hash>,
    pub author: Signature,
    pub committer: Signature,
    /// unix timestamp (seconds since epoch)
    pub timestamp: i64,
    pub message: String,
}

impl Commit {
    /// create a new commit stamped with the current time
    pub fn new(
        tree: Hash,
        parents: Vec<Hash>,
        author: Signature,
        committer: Signature,
        message: impl Into<String>,
    ) -> Self {
        Self::with_timestamp(tree, parents, author, committer, now_timestamp(), message)
    }

    /// create a new commit with explicit timestamp
    pub fn with_timestamp(
        tree: Hash,
        parents: Vec<Hash>,
        author: Signature,
        committer: Signature,
        timestamp: i64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            tree,
            parents,
            author,
            committer,
            timestamp,
            message: message.into(),
        }
    }

    /// is this an initial commit (no parents)
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// is this a merge commit (multiple parents)
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// first line of the message
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}

/// commit paired with its hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub hash: Hash,
    pub commit: Commit,
}

impl std::fmt::Display for CommitInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "commit {}", self.hash)?;
        if self.commit.is_merge() {
            let parents: Vec<String> = self.commit.parents.iter().map(|p| p.short()).collect();
            writeln!(f, "Merge: {}", parents.join(" "))?;
        }
        writeln!(f, "Author: {}", self.commit.author)?;
        writeln!(f, "Date:   {}", self.commit.timestamp)?;

        writeln!(f)?;
        for line in self.commit.message.lines() {
            writeln!(f, "    {}", line)?;
        }

        Ok(())
    }
}

/// an annotated tag object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// tagged object (a commit)
    pub target: Hash,
    pub name: String,
    pub tagger: Signature,
    pub timestamp: i64,
    pub message: String,
}

impl Tag {
    pub fn new(
        target: Hash,
        name: impl Into<String>,
        tagger: Signature,
        message: impl Into<String>,
    ) -> Self {
        Self {
            target,
            name: name.into(),
            tagger,
            timestamp: now_timestamp(),
            message: message.into(),
        }
    }
}

/// seconds since the unix epoch
pub fn now_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
