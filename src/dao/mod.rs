/// Database model definitions.
pub mod models;
/// Score storage backends and the trait they implement.
pub mod score_store;
/// Storage abstraction layer for database operations.
pub mod storage;
