mod config;
mod connection;
mod error;
mod models;
mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoScoreStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err.unique_constraint() {
            Some(constraint) => StorageError::UniqueViolation { constraint },
            None => StorageError::unavailable(err.to_string(), err),
        }
    }
}
