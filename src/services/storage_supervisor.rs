use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{score_store::ScoreStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Exponential back-off capped at [`MAX_DELAY`].
struct Backoff {
    delay: Duration,
}

impl Backoff {
    fn new() -> Self {
        Self {
            delay: INITIAL_DELAY,
        }
    }

    async fn wait(&mut self) {
        sleep(self.delay).await;
        self.delay = (self.delay * 2).min(MAX_DELAY);
    }
}

/// Keep a score store connected, installing it on success and flipping the
/// shared state into degraded mode while it is unreachable.
///
/// Never returns; spawn it on the runtime.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn ScoreStore>, StorageError>> + Send,
{
    let mut backoff = Backoff::new();

    loop {
        match connect().await {
            Ok(store) => {
                state.set_score_store(store.clone()).await;
                info!("score store connected; leaving degraded mode");
                backoff = Backoff::new();
                watch_health(&state, store.as_ref()).await;
                warn!("score store lost; reconnecting from scratch");
            }
            Err(err) => warn!(error = %err, "score store connection attempt failed"),
        }
        backoff.wait().await;
    }
}

/// Poll `store` until it fails and cannot be revived in place.
async fn watch_health(state: &SharedState, store: &dyn ScoreStore) {
    loop {
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded().await {
                    info!("score store healthy again; leaving degraded mode");
                    state.update_degraded(false).await;
                }
            }
            Err(err) => {
                warn!(error = %err, "score store health check failed; entering degraded mode");
                state.update_degraded(true).await;
                if !reconnect(store).await {
                    warn!("exhausted score store reconnect attempts; staying in degraded mode");
                    return;
                }
                info!("score store reconnected after health check failure");
                state.update_degraded(false).await;
            }
        }
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

async fn reconnect(store: &dyn ScoreStore) -> bool {
    let mut backoff = Backoff::new();
    for attempt in 1..=MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => return true,
            Err(err) => {
                warn!(attempt, error = %err, "score store reconnect attempt failed");
                backoff.wait().await;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, dao::score_store::memory::MemoryScoreStore, state::AppState};

    #[tokio::test]
    async fn installs_the_connected_store() {
        let state = AppState::new(AppConfig::default());
        let supervisor = tokio::spawn(run(state.clone(), || async {
            Ok::<_, StorageError>(Arc::new(MemoryScoreStore::new()) as Arc<dyn ScoreStore>)
        }));

        let mut degraded = state.degraded_watcher();
        tokio::time::timeout(Duration::from_secs(1), degraded.wait_for(|value| !*value))
            .await
            .expect("left degraded mode in time")
            .expect("watch sender alive");
        assert!(state.require_score_store().await.is_ok());

        supervisor.abort();
    }
}
