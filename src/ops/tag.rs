use tracing::info;

use crate::error::{Error, Result};
use crate::object::write_tag;
use crate::refs::{head_commit, list_refs, update_ref, validate_ref_name, RefTarget, Reference, TAGS_PREFIX};
use crate::repo::Repo;
use crate::types::Tag;

/// create an annotated tag at HEAD
pub fn tag_create(repo: &Repo, name: &str, message: &str) -> Result<Reference> {
    let ref_name = format!("{}{}", TAGS_PREFIX, name);
    validate_ref_name(&ref_name)?;

    let target = head_commit(repo)?.ok_or(Error::UnbornHead)?;
    let tag = Tag::new(target, name, repo.config().identity(), message);
    let tag_hash = write_tag(repo, &tag)?;

    let new = RefTarget::Direct(tag_hash);
    if !update_ref(repo, &ref_name, None, &new)? {
        return Err(Error::RefExists(ref_name));
    }

    info!(tag = name, commit = %target.short(), "created tag");
    Ok(Reference {
        name: ref_name,
        target: new,
    })
}

/// all tags, sorted by name
pub fn tag_list(repo: &Repo) -> Result<Vec<Reference>> {
    list_refs(repo, TAGS_PREFIX)
}
