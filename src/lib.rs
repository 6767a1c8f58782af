//! Library crate for dart-score-back: X01 scoring, match lifecycle, storage
//! backends and the HTTP/SSE surface, exposed for binaries and integration tests.

pub mod config;
pub mod dao;
pub mod dto;
pub mod error;
pub mod routes;
pub mod scoring;
pub mod services;
pub mod state;
