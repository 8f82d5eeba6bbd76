use relaxo_types::ObjectId;

/// Domain-separated BLAKE3 content hasher.
///
/// The digest is `BLAKE3(domain || ":" || data)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    pub const BLOB: Self = Self {
        domain: "relaxo-blob-v1",
    };
    pub const TREE: Self = Self {
        domain: "relaxo-tree-v1",
    };
    pub const COMMIT: Self = Self {
        domain: "relaxo-commit-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    pub fn hash(&self, data: &[u8]) -> ObjectId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        ObjectId::from_hash(*hasher.finalize().as_bytes())
    }

    pub fn domain(&self) -> &str {
        self.domain
    }
}
