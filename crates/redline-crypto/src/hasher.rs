use crate::digest::Digest;

/// Domain-separated BLAKE3 content hasher.
///
/// The block contract (`clause_hash`, `anchor_signature`) is plain BLAKE3 and
/// lives in [`crate::anchor`]. Everything else the engine derives from content
/// (forest digests for cache keys, deterministic identifiers) goes through a
/// domain tag so it can never collide with a block digest.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for whole-forest content digests.
    pub const FOREST: Self = Self {
        domain: "redline-forest-v1",
    };
    /// Hasher for deterministic identifier derivation.
    pub const IDENTITY: Self = Self {
        domain: "redline-identity-v1",
    };

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> Digest {
        let mut builder = self.builder();
        builder.update(data);
        builder.finish()
    }

    /// Hash a serializable value as JSON with domain separation.
    pub fn hash_json<T: serde::Serialize>(&self, value: &T) -> Result<Digest, HasherError> {
        let data =
            serde_json::to_vec(value).map_err(|e| HasherError::Serialization(e.to_string()))?;
        Ok(self.hash(&data))
    }

    /// Start an incremental hash in this domain.
    pub fn builder(&self) -> DigestBuilder {
        let mut inner = blake3::Hasher::new();
        inner.update(self.domain.as_bytes());
        inner.update(b":");
        DigestBuilder { inner }
    }
}

/// Incremental domain-separated hash.
///
/// [`DigestBuilder::field`] length-prefixes its input, so a sequence of fields
/// hashes unambiguously (`"ab" + "c"` differs from `"a" + "bc"`).
pub struct DigestBuilder {
    inner: blake3::Hasher,
}

impl DigestBuilder {
    /// Feed raw bytes.
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.inner.update(data);
        self
    }

    /// Feed one length-prefixed field.
    pub fn field(&mut self, data: &[u8]) -> &mut Self {
        self.inner.update(&(data.len() as u64).to_le_bytes());
        self.inner.update(data);
        self
    }

    pub fn finish(&self) -> Digest {
        Digest::from_hash(*self.inner.finalize().as_bytes())
    }
}

/// Errors from hashing operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HasherError {
    #[error("serialization error: {0}")]
    Serialization(String),
}
