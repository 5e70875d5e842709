use std::fmt;

use crate::types::BlobRef;

/// diff entry change kind
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    /// same content, different file mode
    ModeChanged,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Added => write!(f, "A"),
            ChangeKind::Modified => write!(f, "M"),
            ChangeKind::Deleted => write!(f, "D"),
            ChangeKind::ModeChanged => write!(f, "m"),
        }
    }
}

/// a single line in a hunk
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiffLine {
    Context(String),
    Added(String),
    Removed(String),
    /// the preceding line is the last one and has no trailing newline
    NoNewlineAtEof,
}

/// contiguous region of changes; line numbers are 1-based
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    pub lines: Vec<DiffLine>,
}

/// per-file entry of a diff result
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileDiff {
    pub path: String,
    pub kind: ChangeKind,
    pub old: Option<BlobRef>,
    pub new: Option<BlobRef>,
    /// content is not utf-8 text; no hunks are produced
    pub binary: bool,
    pub hunks: Vec<Hunk>,
}

impl FileDiff {
    /// lines added across all hunks
    pub fn additions(&self) -> usize {
        self.hunks
            .iter()
            .flat_map(|h| &h.lines)
            .filter(|l| matches!(l, DiffLine::Added(_)))
            .count()
    }

    /// lines removed across all hunks
    pub fn deletions(&self) -> usize {
        self.hunks
            .iter()
            .flat_map(|h| &h.lines)
            .filter(|l| matches!(l, DiffLine::Removed(_)))
            .count()
    }
}

/// unified diff rendering
impl fmt::Display for FileDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "diff a/{} b/{}", self.path, self.path)?;
        match (&self.old, &self.new) {
            (None, Some(new)) => writeln!(f, "new file mode {}", new.mode)?,
            (Some(old), None) => writeln!(f, "deleted file mode {}", old.mode)?,
            (Some(old), Some(new)) if old.mode != new.mode => {
                writeln!(f, "old mode {}", old.mode)?;
                writeln!(f, "new mode {}", new.mode)?;
            }
            _ => {}
        }

        if self.binary {
            return writeln!(f, "Binary files differ");
        }
        if self.hunks.is_empty() {
            return Ok(());
        }

        let old_name = match self.old {
            Some(_) => format!("a/{}", self.path),
            None => "/dev/null".to_string(),
        };
        let new_name = match self.new {
            Some(_) => format!("b/{}", self.path),
            None => "/dev/null".to_string(),
        };
        writeln!(f, "--- {}", old_name)?;
        writeln!(f, "+++ {}", new_name)?;

        for hunk in &self.hunks {
            writeln!(
                f,
                "@@ -{},{} +{},{} @@",
                hunk.old_start, hunk.old_count, hunk.new_start, hunk.new_count
            )?;
            for line in &hunk.lines {
                match line {
                    DiffLine::Context(text) => writeln!(f, " {}", text)?,
                    DiffLine::Added(text) => writeln!(f, "+{}", text)?,
                    DiffLine::Removed(text) => writeln!(f, "-{}", text)?,
                    DiffLine::NoNewlineAtEof => writeln!(f, "\\ No newline at end of file")?,
                }
            }
        }

        Ok(())
    }
}
