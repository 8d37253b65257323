//! Single-flight renewal of the access credential
//!
//! When several requests hit a 401 at the same time only the first one calls
//! the refresh endpoint. The others park on a one-shot channel and are woken
//! with the new access credential once it has been written to the store, or
//! with nothing if the refresh failed.

use crate::client::error::RefreshError;
use crate::types::RefreshResponse;
use naturein_core::{CredentialStore, Credentials};
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// A request parked until the in-flight refresh settles
type Waiter = oneshot::Sender<Option<String>>;

#[derive(Debug, Default)]
enum RefreshState {
    #[default]
    Idle,
    Refreshing(Vec<Waiter>),
}

enum Role {
    Leader,
    Follower(oneshot::Receiver<Option<String>>),
}

/// Coordinates credential refreshes so at most one is outstanding
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    /// Create an idle coordinator
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a refresh call is currently outstanding
    pub fn is_refreshing(&self) -> bool {
        matches!(*self.state(), RefreshState::Refreshing(_))
    }

    /// Number of requests parked behind the outstanding refresh
    pub fn waiting(&self) -> usize {
        match &*self.state() {
            RefreshState::Refreshing(waiters) => waiters.len(),
            RefreshState::Idle => 0,
        }
    }

    /// Obtain an access credential to replay a request that got a 401.
    ///
    /// `sent_with` is the access credential the failed request carried. If
    /// the store already holds a different one it is returned without
    /// refreshing. Otherwise the request either leads a refresh through
    /// `call`, or waits for the refresh already in flight.
    ///
    /// A missing refresh credential or a failed refresh clears the store.
    pub async fn renew<F, Fut>(
        &self,
        store: &dyn CredentialStore,
        sent_with: Option<&str>,
        call: F,
    ) -> Result<String, RefreshError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<RefreshResponse, RefreshError>>,
    {
        let stored = store.get().await?;

        if let Some(access) = newer_access(&stored, sent_with) {
            debug!("Access credential changed while the request was in flight");
            return Ok(access);
        }

        if stored.refresh.is_none() {
            info!("No refresh credential stored, clearing credentials");
            store.clear().await?;
            return Err(RefreshError::MissingRefreshCredential);
        }

        if let Role::Follower(receiver) = self.join_or_lead() {
            debug!("Refresh already in flight, waiting for it");
            return match receiver.await {
                Ok(Some(access)) => Ok(access),
                Ok(None) => Err(RefreshError::SharedRefreshFailed),
                Err(_) => Err(RefreshError::Abandoned),
            };
        }

        let flight = InFlight {
            coordinator: self,
            settled: false,
        };

        // A refresh may have settled between the read above and taking the lead
        let outcome = match store.get().await {
            Ok(current) => {
                if let Some(access) = newer_access(&current, sent_with) {
                    debug!("Access credential renewed by a refresh that just settled");
                    flight.settle(Some(&access));
                    return Ok(access);
                }
                refresh_and_store(store, current, call).await
            }
            Err(err) => Err(err.into()),
        };

        match &outcome {
            Ok(_) => info!(waiters = self.waiting(), "Access credential renewed"),
            Err(err) => {
                warn!(
                    error = %err,
                    waiters = self.waiting(),
                    "Credential refresh failed, logging out"
                );
                if let Err(clear_err) = store.clear().await {
                    warn!(error = %clear_err, "Failed to clear credentials");
                }
            }
        }

        flight.settle(outcome.as_ref().ok());
        outcome
    }

    fn state(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check-and-set of the in-flight flag; must not yield in between.
    fn join_or_lead(&self) -> Role {
        let mut state = self.state();
        match *state {
            RefreshState::Refreshing(ref mut waiters) => {
                let (sender, receiver) = oneshot::channel();
                waiters.push(sender);
                Role::Follower(receiver)
            }
            RefreshState::Idle => {
                *state = RefreshState::Refreshing(Vec::new());
                Role::Leader
            }
        }
    }

    /// Return to idle and hand back everyone who was waiting
    fn release(&self) -> Vec<Waiter> {
        match std::mem::take(&mut *self.state()) {
            RefreshState::Refreshing(waiters) => waiters,
            RefreshState::Idle => Vec::new(),
        }
    }
}

/// Stored access credential, if it is not the one the request was sent with
fn newer_access(stored: &Credentials, sent_with: Option<&str>) -> Option<String> {
    stored
        .access
        .as_deref()
        .filter(|access| sent_with != Some(*access))
        .map(str::to_string)
}

async fn refresh_and_store<F, Fut>(
    store: &dyn CredentialStore,
    current: Credentials,
    call: F,
) -> Result<String, RefreshError>
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = Result<RefreshResponse, RefreshError>>,
{
    let Some(refresh) = current.refresh.clone() else {
        return Err(RefreshError::MissingRefreshCredential);
    };

    debug!("Refreshing access credential");
    let renewed = call(refresh).await?;
    if renewed.access.is_empty() {
        return Err(RefreshError::Malformed("empty access credential".into()));
    }

    let mut credentials = current.with_access(renewed.access.as_str());
    if renewed.refresh.is_some() {
        credentials.refresh = renewed.refresh;
    }
    store.set(&credentials).await?;

    Ok(renewed.access)
}

/// Leader's hold on the refreshing state.
///
/// Dropping it unsettled (the leading request was cancelled) returns the
/// coordinator to idle and closes every waiter's channel.
struct InFlight<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl InFlight<'_> {
    fn settle(mut self, access: Option<&String>) {
        self.settled = true;
        for waiter in self.coordinator.release() {
            // Receiver gone means that request was cancelled
            let _ = waiter.send(access.cloned());
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            let abandoned = self.coordinator.release();
            warn!(waiters = abandoned.len(), "Refresh dropped before settling");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use naturein_core::{CoreResult, MemoryCredentialStore};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Memory store that counts how often it was cleared
    struct CountingStore {
        inner: MemoryCredentialStore,
        clears: AtomicUsize,
    }

    impl CountingStore {
        fn with_credentials(credentials: Credentials) -> Self {
            Self {
                inner: MemoryCredentialStore::with_credentials(credentials),
                clears: AtomicUsize::new(0),
            }
        }

        fn logged_in() -> Arc<Self> {
            let credentials = Credentials::new("A1", "R1");
            Arc::new(Self::with_credentials(credentials))
        }
    }

    #[async_trait]
    impl CredentialStore for CountingStore {
        async fn get(&self) -> CoreResult<Credentials> {
            self.inner.get().await
        }

        async fn set(&self, credentials: &Credentials) -> CoreResult<()> {
            self.inner.set(credentials).await
        }

        async fn clear(&self) -> CoreResult<()> {
            self.clears.fetch_add(1, Ordering::SeqCst);
            self.inner.clear().await
        }
    }

    async fn never_refresh(_: String) -> Result<RefreshResponse, RefreshError> {
        panic!("refresh endpoint must not be called")
    }

    async fn wait_until(condition: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("condition not reached");
    }

    /// Spawn `n` renewals behind a refresh that only completes once `release`
    /// is notified. Returns the join handles.
    fn spawn_renewals(
        n: usize,
        store: &Arc<CountingStore>,
        coordinator: &Arc<RefreshCoordinator>,
        calls: &Arc<AtomicUsize>,
        release: &Arc<Notify>,
        outcome: fn() -> Result<RefreshResponse, RefreshError>,
    ) -> Vec<tokio::task::JoinHandle<Result<String, RefreshError>>> {
        (0..n)
            .map(|_| {
                let store = Arc::clone(store);
                let coordinator = Arc::clone(coordinator);
                let calls = Arc::clone(calls);
                let release = Arc::clone(release);
                tokio::spawn(async move {
                    let access = coordinator
                        .renew(store.as_ref(), Some("A1"), |refresh| async move {
                            assert_eq!(refresh, "R1");
                            calls.fetch_add(1, Ordering::SeqCst);
                            release.notified().await;
                            outcome()
                        })
                        .await?;
                    // Replays must see the new credential already stored
                    let stored = store.get().await?;
                    assert_eq!(stored.access.as_deref(), Some(access.as_str()));
                    Ok(access)
                })
            })
            .collect()
    }

    #[tokio::test]
    async fn concurrent_renewals_share_one_refresh() {
        for n in [1usize, 5, 50] {
            let store = CountingStore::logged_in();
            let coordinator = Arc::new(RefreshCoordinator::new());
            let calls = Arc::new(AtomicUsize::new(0));
            let release = Arc::new(Notify::new());

            let handles = spawn_renewals(n, &store, &coordinator, &calls, &release, || {
                Ok(RefreshResponse {
                    access: "A2".into(),
                    refresh: None,
                })
            });

            let parked = || calls.load(Ordering::SeqCst) == 1 && coordinator.waiting() == n - 1;
            wait_until(parked).await;
            release.notify_one();

            for handle in handles {
                assert_eq!(handle.await.unwrap().unwrap(), "A2");
            }

            assert_eq!(calls.load(Ordering::SeqCst), 1, "n = {n}");
            assert!(!coordinator.is_refreshing());
            assert_eq!(store.get().await.unwrap(), Credentials::new("A2", "R1"));
            assert_eq!(store.clears.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn failed_refresh_fans_out_and_clears_once() {
        let n = 5;
        let store = CountingStore::logged_in();
        let coordinator = Arc::new(RefreshCoordinator::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());

        let handles = spawn_renewals(n, &store, &coordinator, &calls, &release, || {
            Err(RefreshError::Rejected { status: 401 })
        });

        let parked = || calls.load(Ordering::SeqCst) == 1 && coordinator.waiting() == n - 1;
        wait_until(parked).await;
        release.notify_one();

        let mut leaders = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Err(RefreshError::Rejected { status: 401 }) => leaders += 1,
                Err(RefreshError::SharedRefreshFailed) => {}
                other => panic!("unexpected outcome: {other:?}"),
            }
        }

        assert_eq!(leaders, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.clears.load(Ordering::SeqCst), 1);
        assert!(store.get().await.unwrap().is_empty());
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn missing_refresh_credential_fails_fast() {
        let store = CountingStore::with_credentials(Credentials::access_only("A1"));
        let coordinator = RefreshCoordinator::new();

        let result = coordinator.renew(&store, Some("A1"), never_refresh).await;

        assert!(matches!(result, Err(RefreshError::MissingRefreshCredential)));
        assert_eq!(store.clears.load(Ordering::SeqCst), 1);
        assert!(store.get().await.unwrap().is_empty());
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn newer_stored_credential_skips_refresh() {
        let store = MemoryCredentialStore::with_credentials(Credentials::new("A2", "R1"));
        let coordinator = RefreshCoordinator::new();

        let access = coordinator
            .renew(&store, Some("A1"), never_refresh)
            .await
            .unwrap();

        assert_eq!(access, "A2");
    }

    #[tokio::test]
    async fn rotated_refresh_credential_is_stored() {
        let store = MemoryCredentialStore::with_credentials(Credentials::new("A1", "R1"));
        let coordinator = RefreshCoordinator::new();

        let access = coordinator
            .renew(&store, Some("A1"), |_| async {
                Ok(RefreshResponse {
                    access: "A2".into(),
                    refresh: Some("R2".into()),
                })
            })
            .await
            .unwrap();

        assert_eq!(access, "A2");
        assert_eq!(store.get().await.unwrap(), Credentials::new("A2", "R2"));
    }

    #[tokio::test]
    async fn empty_access_is_a_failed_refresh() {
        let store = MemoryCredentialStore::with_credentials(Credentials::new("A1", "R1"));
        let coordinator = RefreshCoordinator::new();

        let result = coordinator
            .renew(&store, Some("A1"), |_| async {
                Ok(RefreshResponse {
                    access: String::new(),
                    refresh: None,
                })
            })
            .await;

        assert!(matches!(result, Err(RefreshError::Malformed(_))));
        assert!(store.get().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancelled_leader_releases_waiters() {
        let store = CountingStore::logged_in();
        let coordinator = Arc::new(RefreshCoordinator::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());

        let mut handles = spawn_renewals(2, &store, &coordinator, &calls, &release, || {
            Ok(RefreshResponse {
                access: "A2".into(),
                refresh: None,
            })
        });

        let parked = || calls.load(Ordering::SeqCst) == 1 && coordinator.waiting() == 1;
        wait_until(parked).await;

        // Whichever task leads is the one whose refresh call was entered;
        // abort both and check the coordinator is usable again.
        for handle in &handles {
            handle.abort();
        }
        for handle in handles.drain(..) {
            match handle.await {
                Err(join_err) => assert!(join_err.is_cancelled()),
                Ok(result) => assert!(matches!(result, Err(RefreshError::Abandoned))),
            }
        }

        assert!(!coordinator.is_refreshing());
        assert_eq!(coordinator.waiting(), 0);
        assert_eq!(store.clears.load(Ordering::SeqCst), 0);
        assert_eq!(store.get().await.unwrap(), Credentials::new("A1", "R1"));
    }

    #[tokio::test]
    async fn waiter_is_released_when_only_leader_is_cancelled() {
        let store = Arc::new(MemoryCredentialStore::with_credentials(Credentials::new(
            "A1", "R1",
        )));
        let coordinator = Arc::new(RefreshCoordinator::new());

        let leader = {
            let store = Arc::clone(&store);
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                coordinator
                    .renew(store.as_ref(), Some("A1"), |_| {
                        std::future::pending::<Result<RefreshResponse, RefreshError>>()
                    })
                    .await
            })
        };
        wait_until(|| coordinator.is_refreshing()).await;

        let follower = {
            let store = Arc::clone(&store);
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                coordinator
                    .renew(store.as_ref(), Some("A1"), never_refresh)
                    .await
            })
        };
        wait_until(|| coordinator.waiting() == 1).await;

        leader.abort();
        assert!(leader.await.unwrap_err().is_cancelled());

        let result = follower.await.unwrap();
        assert!(matches!(result, Err(RefreshError::Abandoned)));
        assert!(!coordinator.is_refreshing());
    }
}
