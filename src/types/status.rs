use std::collections::BTreeSet;

/// classification of paths by comparing HEAD, index and working tree
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// staged: in index, not in HEAD
    pub added: BTreeSet<String>,
    /// staged: in both, index differs from HEAD
    pub changed: BTreeSet<String>,
    /// staged: in HEAD, not in index
    pub removed: BTreeSet<String>,
    /// unstaged: working tree differs from index
    pub modified: BTreeSet<String>,
    /// unstaged: in index, missing on disk
    pub missing: BTreeSet<String>,
    /// on disk, in neither HEAD nor index
    pub untracked: BTreeSet<String>,
    /// unresolved merge or cherry-pick conflicts
    pub conflicting: BTreeSet<String>,
}

impl StatusSnapshot {
    /// nothing staged, nothing modified, nothing untracked
    pub fn is_clean(&self) -> bool {
        self.added.is_empty()
            && self.changed.is_empty()
            && self.removed.is_empty()
            && self.modified.is_empty()
            && self.missing.is_empty()
            && self.untracked.is_empty()
            && self.conflicting.is_empty()
    }

    /// staged differences between HEAD and index
    pub fn has_staged_changes(&self) -> bool {
        !self.added.is_empty() || !self.changed.is_empty() || !self.removed.is_empty()
    }

    /// tracked paths whose working tree content differs from the index
    pub fn has_unstaged_changes(&self) -> bool {
        !self.modified.is_empty() || !self.missing.is_empty()
    }
}

impl std::fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sections: [(&str, &BTreeSet<String>); 7] = [
            ("added", &self.added),
            ("changed", &self.changed),
            ("removed", &self.removed),
            ("modified", &self.modified),
            ("missing", &self.missing),
            ("untracked", &self.untracked),
            ("conflicting", &self.conflicting),
        ];
        for (label, paths) in sections {
            for path in paths {
                writeln!(f, "{:<12} {}", label, path)?;
            }
        }
        Ok(())
    }
}
