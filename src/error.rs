use thiserror::Error;

/// Catalog-wide integrity violations. Any of these aborts a pass before the
/// catalog is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error(
        "fingerprint collision on {hash}: {first} is {first_size} bytes but {second} is {second_size} bytes"
    )]
    HashCollision {
        hash: String,
        first: String,
        first_size: u64,
        second: String,
        second_size: u64,
    },

    #[error("content hash {hash} is held by two entries: {first_id} and {second_id}")]
    DuplicateHash {
        hash: String,
        first_id: String,
        second_id: String,
    },

    #[error("id {id} is assigned to two content hashes: {first_hash} and {second_hash}")]
    DuplicateId {
        id: String,
        first_hash: String,
        second_hash: String,
    },

    #[error("id {id} was retired and cannot be assigned again")]
    IdReused { id: String },

    #[error("entry {id} is marked as a duplicate of itself")]
    SelfDuplicate { id: String },

    #[error("entry {id} references missing duplicate target {target}")]
    DanglingDuplicate { id: String, target: String },

    #[error("entry {id} points at {target}, which itself points at {next}")]
    DuplicateChain {
        id: String,
        target: String,
        next: String,
    },

    #[error("entry {id} is marked as a duplicate of {target} but both share hash {hash}")]
    DuplicateSameHash {
        id: String,
        target: String,
        hash: String,
    },

    #[error("entry {id} is still referenced as canonical by: {}", referrers.join(", "))]
    StillReferenced { id: String, referrers: Vec<String> },

    #[error("entry {id} cannot change its {field}")]
    ImmutableField { id: String, field: &'static str },

    #[error("entry {id} not found")]
    NotFound { id: String },
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;
