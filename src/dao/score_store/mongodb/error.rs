use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use thiserror::Error;
use uuid::Uuid;

pub type MongoResult<T> = Result<T, MongoDaoError>;

/// Server error code reported for duplicate keys on a unique index.
const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("duplicate key on `{constraint}` while writing `{id}` to `{collection}`")]
    Duplicate {
        collection: &'static str,
        id: Uuid,
        constraint: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to write `{id}` to `{collection}`")]
    Write {
        collection: &'static str,
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to query `{collection}`")]
    Query {
        collection: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("invalid `{field}` value `{value}` in `{collection}` document")]
    InvalidDocument {
        collection: &'static str,
        field: &'static str,
        value: String,
    },
}

impl MongoDaoError {
    /// Classify a failed write, separating unique-index collisions from other failures.
    pub fn from_write(
        collection: &'static str,
        id: Uuid,
        constraint: &'static str,
        source: MongoError,
    ) -> Self {
        if is_duplicate_key(&source) {
            MongoDaoError::Duplicate {
                collection,
                id,
                constraint,
                source,
            }
        } else {
            MongoDaoError::Write {
                collection,
                id,
                source,
            }
        }
    }

    /// Name of the violated constraint for duplicate-key failures.
    pub fn unique_constraint(&self) -> Option<&'static str> {
        match self {
            MongoDaoError::Duplicate { constraint, .. } => Some(constraint),
            _ => None,
        }
    }
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == DUPLICATE_KEY_CODE
    )
}

/// Whether a duplicate-key failure was raised by the `_id` index rather than a secondary one.
pub fn violates_primary_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == DUPLICATE_KEY_CODE && write_error.message.contains("_id_")
    )
}
