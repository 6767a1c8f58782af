use std::env;

use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

/// Database holding the score collections, overriding the one named in the URI.
pub const DATABASE_ENV: &str = "DART_SCORE_MONGO_DB";

const DEFAULT_DATABASE: &str = "dart_score";
const APP_NAME: &str = "dart-score-back";

/// Connection settings for the MongoDB score store.
#[derive(Clone)]
pub struct MongoConfig {
    pub options: ClientOptions,
    pub database_name: String,
}

impl MongoConfig {
    /// Parse a connection string. The database comes from [`DATABASE_ENV`], then
    /// from the URI path, then falls back to `dart_score`.
    pub async fn from_uri(uri: &str) -> MongoResult<Self> {
        let mut options =
            ClientOptions::parse(uri)
                .await
                .map_err(|source| MongoDaoError::InvalidUri {
                    uri: uri.to_owned(),
                    source,
                })?;
        options.app_name.get_or_insert_with(|| APP_NAME.to_owned());
        let database_name = pick_database(
            env::var(DATABASE_ENV).ok(),
            options.default_database.as_deref(),
        );

        Ok(Self {
            options,
            database_name,
        })
    }
}

fn pick_database(configured: Option<String>, from_uri: Option<&str>) -> String {
    configured
        .filter(|name| !name.trim().is_empty())
        .or_else(|| from_uri.map(str::to_owned))
        .unwrap_or_else(|| DEFAULT_DATABASE.to_owned())
}
