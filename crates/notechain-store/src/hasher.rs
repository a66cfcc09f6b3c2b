use notechain_types::ObjectId;

use crate::object::ObjectKind;

/// BLAKE3 hasher keyed by a domain tag.
///
/// The tag is hashed ahead of the content, so a blob and a commit with the
/// same bytes never share an `ObjectId`.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    pub const BLOB: Self = Self {
        domain: "notechain-blob-v1",
    };
    pub const COMMIT: Self = Self {
        domain: "notechain-commit-v1",
    };

    /// The hasher that names objects of `kind`.
    pub fn for_kind(kind: ObjectKind) -> &'static Self {
        match kind {
            ObjectKind::Blob => &Self::BLOB,
            ObjectKind::Commit => &Self::COMMIT,
        }
    }

    pub fn hash(&self, data: &[u8]) -> ObjectId {
        let digest = blake3::Hasher::new()
            .update(self.domain.as_bytes())
            .update(b":")
            .update(data)
            .finalize();
        ObjectId::from_hash(*digest.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_bytes_same_id() {
        let data = b"Patch-set: 1";
        assert_eq!(ContentHasher::COMMIT.hash(data), ContentHasher::COMMIT.hash(data));
    }

    #[test]
    fn kinds_never_share_ids() {
        let data = b"same content";
        assert_ne!(
            ContentHasher::for_kind(ObjectKind::Blob).hash(data),
            ContentHasher::for_kind(ObjectKind::Commit).hash(data)
        );
    }

    #[test]
    fn tagged_hash_differs_from_plain_hash() {
        assert_ne!(ContentHasher::BLOB.hash(b"x"), ObjectId::of(b"x"));
    }
}
