/// Checkout suggestions and segment resolution.
pub mod board_service;
/// Row change construction and publication.
pub mod change_feed;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Leg snapshots, scoreboard views and recomputation.
pub mod leg_service;
/// Match lifecycle, leg completion and play order.
pub mod match_service;
/// Server-Sent Events streams.
pub mod sse_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
/// Dart recording, correction and removal.
pub mod throw_service;
/// Turn resolution for the player on the oche.
pub mod turn_service;
