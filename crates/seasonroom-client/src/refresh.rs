//! Single-flight token refresh.
//!
//! The first caller to see an expired token runs the refresh; everyone who
//! arrives while it is running parks on a oneshot channel and receives the
//! same outcome.

use std::future::Future;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    #[error("no refresh token is stored")]
    NoRefreshToken,
    #[error("refresh token expired")]
    Expired,
    #[error("refresh was abandoned")]
    Abandoned,
    #[error("{0}")]
    Failed(String),
}

type Waiter = oneshot::Sender<Result<String, RefreshError>>;

#[derive(Debug, Default)]
struct RefreshState {
    in_progress: bool,
    waiters: Vec<Waiter>,
}

#[derive(Debug, Default)]
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_progress(&self) -> bool {
        self.state.lock().in_progress
    }

    /// Runs `refresh` unless one is already running, in which case this
    /// waits for that one. Resolves to the new access token.
    pub async fn refresh<F, Fut>(&self, refresh: F) -> Result<String, RefreshError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, RefreshError>>,
    {
        let waiting = {
            let mut state = self.state.lock();
            if state.in_progress {
                let (tx, rx) = oneshot::channel();
                state.waiters.push(tx);
                Some(rx)
            } else {
                state.in_progress = true;
                None
            }
        };

        if let Some(rx) = waiting {
            debug!("waiting on in-flight token refresh");
            return rx.await.unwrap_or(Err(RefreshError::Abandoned));
        }

        let mut leader = Leader {
            coordinator: self,
            finished: false,
        };
        info!("refreshing access token");
        let result = refresh().await;
        match &result {
            Ok(_) => info!("access token refreshed"),
            Err(err) => warn!(error = %err, "token refresh failed"),
        }
        leader.finish(result.clone());
        result
    }

    fn settle(&self, result: Result<String, RefreshError>) {
        let waiters = {
            let mut state = self.state.lock();
            state.in_progress = false;
            std::mem::take(&mut state.waiters)
        };
        debug!(waiters = waiters.len(), "releasing refresh waiters");
        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }
    }
}

/// Releases the waiters even if the refreshing future is dropped.
struct Leader<'a> {
    coordinator: &'a RefreshCoordinator,
    finished: bool,
}

impl Leader<'_> {
    fn finish(&mut self, result: Result<String, RefreshError>) {
        self.finished = true;
        self.coordinator.settle(result);
    }
}

impl Drop for Leader<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.coordinator.settle(Err(RefreshError::Abandoned));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::{RefreshCoordinator, RefreshError};

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let coordinator = Arc::clone(&coordinator);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                coordinator
                    .refresh(|| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok("fresh".to_string())
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.expect("join"), Ok("fresh".to_string()));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!coordinator.in_progress());
    }

    #[tokio::test]
    async fn failure_reaches_every_waiter() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        let leader = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                coordinator
                    .refresh(|| async {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Err(RefreshError::Expired)
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(coordinator.in_progress());

        let waiter = coordinator
            .refresh(|| async { Ok("never runs".to_string()) })
            .await;
        assert_eq!(waiter, Err(RefreshError::Expired));
        assert_eq!(leader.await.expect("join"), Err(RefreshError::Expired));
    }

    #[tokio::test]
    async fn next_refresh_runs_again_after_completion() {
        let coordinator = RefreshCoordinator::new();
        let first = coordinator.refresh(|| async { Ok("one".to_string()) }).await;
        let second = coordinator.refresh(|| async { Ok("two".to_string()) }).await;
        assert_eq!(first, Ok("one".to_string()));
        assert_eq!(second, Ok("two".to_string()));
    }
}
