mod changes;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{config::AppConfig, dao::score_store::ScoreStore, error::ServiceError};

pub use self::changes::{ChangeHub, LegRow, MatchRow, RowChangeEvent};

/// Cheaply cloneable handle passed to every route and service.
pub type SharedState = Arc<AppState>;

/// Central application state: storage handle, change feed and configuration.
pub struct AppState {
    score_store: RwLock<Option<Arc<dyn ScoreStore>>>,
    changes: ChangeHub,
    degraded: watch::Sender<bool>,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            score_store: RwLock::new(None),
            changes: ChangeHub::new(config.change_feed_capacity),
            degraded: degraded_tx,
            config,
        })
    }

    /// Build a state with `store` already installed.
    pub async fn with_store(config: AppConfig, store: Arc<dyn ScoreStore>) -> SharedState {
        let state = Self::new(config);
        state.set_score_store(store).await;
        state
    }

    /// Obtain a handle to the current score store, if one is installed.
    pub async fn score_store(&self) -> Option<Arc<dyn ScoreStore>> {
        let guard = self.score_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current score store, or [`ServiceError::Degraded`] while none is installed.
    pub async fn require_score_store(&self) -> Result<Arc<dyn ScoreStore>, ServiceError> {
        self.score_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new score store implementation and leave degraded mode.
    pub async fn set_score_store(&self, store: Arc<dyn ScoreStore>) {
        {
            let mut guard = self.score_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Broadcast hub carrying row changes to the SSE streams.
    pub fn changes(&self) -> &ChangeHub {
        &self.changes
    }

    /// Runtime configuration loaded at start-up.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::score_store::memory::MemoryScoreStore;

    #[tokio::test]
    async fn installing_a_store_leaves_degraded_mode() {
        let state = AppState::new(AppConfig::default());
        let mut watcher = state.degraded_watcher();
        assert!(state.is_degraded().await);
        assert!(matches!(
            state.require_score_store().await,
            Err(ServiceError::Degraded)
        ));

        state
            .set_score_store(Arc::new(MemoryScoreStore::new()))
            .await;

        assert!(!state.is_degraded().await);
        assert!(watcher.has_changed().expect("sender alive"));
        assert!(!*watcher.borrow_and_update());
        assert!(state.require_score_store().await.is_ok());
    }
}
