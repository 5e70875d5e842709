use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, IoResultExt, Result};
use crate::hash::{compute_object_hash, Hash};
use crate::repo::Repo;
use crate::types::{Commit, Tag, Tree};

/// object type tag, part of the canonical form
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
    Tag,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Tree => "tree",
            ObjectKind::Commit => "commit",
            ObjectKind::Tag => "tag",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "blob" => Some(ObjectKind::Blob),
            "tree" => Some(ObjectKind::Tree),
            "commit" => Some(ObjectKind::Commit),
            "tag" => Some(ObjectKind::Tag),
            _ => None,
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// any object that can live in the store
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Object {
    Blob(Vec<u8>),
    Tree(Tree),
    Commit(Commit),
    Tag(Tag),
}

impl Object {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Object::Blob(_) => ObjectKind::Blob,
            Object::Tree(_) => ObjectKind::Tree,
            Object::Commit(_) => ObjectKind::Commit,
            Object::Tag(_) => ObjectKind::Tag,
        }
    }

    /// payload bytes: raw content for blobs, CBOR for everything else
    fn payload(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        match self {
            Object::Blob(content) => bytes.extend_from_slice(content),
            Object::Tree(tree) => ciborium::into_writer(tree, &mut bytes)?,
            Object::Commit(commit) => ciborium::into_writer(commit, &mut bytes)?,
            Object::Tag(tag) => ciborium::into_writer(tag, &mut bytes)?,
        }
        Ok(bytes)
    }

    fn from_payload(kind: ObjectKind, payload: &[u8]) -> Result<Self> {
        Ok(match kind {
            ObjectKind::Blob => Object::Blob(payload.to_vec()),
            ObjectKind::Tree => Object::Tree(ciborium::from_reader(payload)?),
            ObjectKind::Commit => Object::Commit(ciborium::from_reader(payload)?),
            ObjectKind::Tag => Object::Tag(ciborium::from_reader(payload)?),
        })
    }

    /// digest of the canonical form, without touching the store
    pub fn hash(&self) -> Result<Hash> {
        Ok(compute_object_hash(self.kind().as_str(), &self.payload()?))
    }
}

/// write an object to the store (put)
///
/// the canonical form is `kind SP len NUL payload`; its SHA-256 is the
/// object's identity. the file holds the zstd-compressed canonical form.
/// writing an object that already exists is a no-op.
pub fn write_object(repo: &Repo, object: &Object) -> Result<Hash> {
    let kind = object.kind();
    let payload = object.payload()?;
    let hash = compute_object_hash(kind.as_str(), &payload);

    let (dir, file) = hash.to_path_components();
    let object_dir = repo.objects_path().join(&dir);
    let object_path = object_dir.join(&file);

    // dedup: if object already exists, we're done
    if object_path.exists() {
        return Ok(hash);
    }

    let mut canonical = Vec::with_capacity(payload.len() + 16);
    write!(canonical, "{} {}\0", kind.as_str(), payload.len()).with_path("<header>")?;
    canonical.extend_from_slice(&payload);

    // compress with zstd (level 3 - fast, reasonable ratio)
    let compressed = zstd::encode_all(&canonical[..], 3).map_err(|e| Error::Io {
        path: PathBuf::from("<zstd>"),
        source: e,
    })?;

    fs::create_dir_all(&object_dir).with_path(&object_dir)?;

    // atomic write: temp -> fsync -> rename
    // racing writers of the same object produce identical bytes, so the
    // last rename wins harmlessly
    let tmp_path = repo.tmp_path().join(uuid::Uuid::new_v4().to_string());
    {
        let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
        tmp_file.write_all(&compressed).with_path(&tmp_path)?;
        tmp_file.sync_all().with_path(&tmp_path)?;
    }

    fs::rename(&tmp_path, &object_path).with_path(&object_path)?;
    fsync_dir(&object_dir)?;

    debug!(hash = %hash.short(), kind = %kind, size = payload.len(), "wrote object");
    Ok(hash)
}

/// read an object from the store (get)
pub fn read_object(repo: &Repo, hash: &Hash) -> Result<Object> {
    let path = object_path(repo, hash);

    let compressed = fs::read(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::ObjectNotFound(*hash)
        } else {
            Error::Io {
                path: path.clone(),
                source: e,
            }
        }
    })?;

    let canonical = zstd::decode_all(&compressed[..]).map_err(|e| Error::Io {
        path: path.clone(),
        source: e,
    })?;

    let (kind, payload) = split_header(&canonical).ok_or_else(|| {
        Error::CorruptObjectMessage(format!("malformed header in object {}", hash))
    })?;

    // verify hash
    if compute_object_hash(kind.as_str(), payload) != *hash {
        return Err(Error::CorruptObject(*hash));
    }

    Object::from_payload(kind, payload)
}

/// check if an object exists in the store (contains)
pub fn object_exists(repo: &Repo, hash: &Hash) -> bool {
    object_path(repo, hash).exists()
}

/// get the filesystem path to an object
pub fn object_path(repo: &Repo, hash: &Hash) -> PathBuf {
    let (dir, file) = hash.to_path_components();
    repo.objects_path().join(dir).join(file)
}

/// parse `kind SP len NUL` and return the payload slice
fn split_header(canonical: &[u8]) -> Option<(ObjectKind, &[u8])> {
    let nul = canonical.iter().position(|b| *b == 0)?;
    let header = std::str::from_utf8(&canonical[..nul]).ok()?;
    let (kind, len) = header.split_once(' ')?;
    let kind = ObjectKind::parse(kind)?;
    let len: usize = len.parse().ok()?;

    let payload = &canonical[nul + 1..];
    if payload.len() != len {
        return None;
    }
    Some((kind, payload))
}

/// fsync a directory
fn fsync_dir(path: &Path) -> Result<()> {
    let dir = File::open(path).with_path(path)?;
    dir.sync_all().with_path(path)?;
    Ok(())
}
