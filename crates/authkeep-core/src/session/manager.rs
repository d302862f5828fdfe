//! Session manager: the only writer of session state.
//!
//! Each public operation holds `op_lock` from start to finish, network
//! calls included. Tokio's mutex hands out the lock in FIFO order, so
//! overlapping calls complete in the order they were issued and a logout
//! can never be overwritten by a login that started before it.

use serde_json::Value;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::api::IdentityClient;
use crate::auth::CredentialStore;
use crate::models::{CredentialToken, Route, UserProfile};

use super::{NavigationSink, SessionState, SessionWatcher};

pub struct SessionManager<C, S, N> {
    client: C,
    store: S,
    navigator: N,
    state: watch::Sender<SessionState>,
    op_lock: Mutex<()>,
}

impl<C, S, N> SessionManager<C, S, N>
where
    C: IdentityClient,
    S: CredentialStore,
    N: NavigationSink,
{
    /// Create a manager in the `Unauthenticated` state.
    /// Call [`initialize`](Self::initialize) once at startup to pick up a
    /// persisted token.
    pub fn new(client: C, store: S, navigator: N) -> Self {
        let (state, _) = watch::channel(SessionState::Unauthenticated);
        Self {
            client,
            store,
            navigator,
            state,
            op_lock: Mutex::new(()),
        }
    }

    // ===== Observation =====

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.state.borrow().user().cloned()
    }

    pub fn subscribe(&self) -> SessionWatcher {
        SessionWatcher::new(self.state.subscribe())
    }

    // ===== Operations =====

    /// Reconcile the persisted token with the backend.
    ///
    /// No token: stays unauthenticated without touching the network.
    /// A token the backend will not resolve is discarded silently.
    pub async fn initialize(&self) {
        let _guard = self.op_lock.lock().await;

        let Some(token) = self.read_token() else {
            debug!("No persisted token, starting unauthenticated");
            self.publish(SessionState::Unauthenticated);
            return;
        };

        match self.resolve_identity(&token).await {
            Some(user) => {
                info!("Restored session from persisted token");
                self.publish(SessionState::Authenticated { user });
            }
            None => {
                info!("Persisted token rejected, discarding it");
                self.clear_token();
                self.publish(SessionState::Unauthenticated);
            }
        }
    }

    /// Log in and resolve the new identity.
    ///
    /// Returns the message to display when the backend refuses the
    /// credentials or cannot be reached, `None` otherwise. If the token is
    /// issued but identity resolution fails, the token stays persisted,
    /// the session is unauthenticated and `None` is returned.
    pub async fn login(&self, username: &str, password: &str) -> Option<String> {
        let _guard = self.op_lock.lock().await;

        let token = match self.client.login(username, password).await {
            Ok(token) => token,
            Err(e) => {
                info!(username = username, error = %e, "Login failed");
                return Some(e.into_message());
            }
        };

        self.persist_token(&token);

        match self.resolve_identity(&token).await {
            Some(user) => {
                info!(username = username, "Login successful");
                self.publish(SessionState::Authenticated { user });
                self.navigator.navigate(Route::Profile);
            }
            None => {
                warn!(username = username, "Login succeeded but identity could not be resolved");
                self.publish(SessionState::Unauthenticated);
            }
        }
        None
    }

    /// Forget the token and return to the root view. Never fails.
    pub async fn logout(&self) {
        let _guard = self.op_lock.lock().await;

        self.clear_token();
        self.publish(SessionState::Unauthenticated);
        info!("Logged out");
        self.navigator.navigate(Route::Root);
    }

    /// Create an account. Does not log in.
    ///
    /// Only transport failures produce a message; a backend rejection
    /// returns `None` just like success, minus the navigation.
    pub async fn register(&self, profile: &Value) -> Option<String> {
        let _guard = self.op_lock.lock().await;

        match self.client.register(profile).await {
            Ok(()) => {
                info!("Registration successful");
                self.navigator.navigate(Route::Success);
                None
            }
            Err(e) => {
                warn!(error = %e, "Registration failed");
                e.into_message()
            }
        }
    }

    // ===== Helpers =====

    async fn resolve_identity(&self, token: &CredentialToken) -> Option<UserProfile> {
        match self.client.fetch_identity(token).await {
            Ok(user) => Some(user),
            Err(e) => {
                debug!(error = %e, "Identity resolution failed");
                None
            }
        }
    }

    fn read_token(&self) -> Option<CredentialToken> {
        match self.store.get() {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!(error = %e, "Failed to read credential store, treating as empty");
                None
            }
        }
    }

    fn persist_token(&self, token: &CredentialToken) {
        if let Err(e) = self.store.set(token) {
            warn!(error = %e, "Failed to persist token");
        }
    }

    fn clear_token(&self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear credential store");
        }
    }

    fn publish(&self, state: SessionState) {
        self.state.send_replace(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex as StdMutex};
    use std::time::Duration;

    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde_json::json;

    use crate::api::{ApiError, IdentityFetchError, LoginError, RegisterError};
    use crate::auth::MemoryCredentialStore;

    // ========================================================================
    // Mock Collaborators
    // ========================================================================

    /// Mock identity backend driven by in-memory tables
    #[derive(Default)]
    struct MockIdentityClient {
        identities: HashMap<String, Value>,
        accounts: HashMap<String, (String, String)>,
        unreachable: bool,
        register_outcome: Option<RegisterError>,
        fetch_delay: Option<Duration>,
        fetch_calls: AtomicUsize,
        login_calls: AtomicUsize,
        register_calls: AtomicUsize,
    }

    impl MockIdentityClient {
        fn new() -> Self {
            Self::default()
        }

        /// Token the backend resolves to `user`
        fn with_identity(mut self, token: &str, user: Value) -> Self {
            self.identities.insert(token.to_string(), user);
            self
        }

        /// Account that logs in with `password` and receives `token`
        fn with_account(mut self, username: &str, password: &str, token: &str) -> Self {
            self.accounts
                .insert(username.to_string(), (password.to_string(), token.to_string()));
            self
        }

        fn unreachable(mut self) -> Self {
            self.unreachable = true;
            self
        }

        fn rejecting_registration(mut self, error: RegisterError) -> Self {
            self.register_outcome = Some(error);
            self
        }

        fn with_fetch_delay(mut self, delay: Duration) -> Self {
            self.fetch_delay = Some(delay);
            self
        }

        fn fetch_calls(&self) -> usize {
            self.fetch_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl IdentityClient for MockIdentityClient {
        async fn fetch_identity(&self, token: &CredentialToken) -> Result<UserProfile, IdentityFetchError> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.fetch_delay {
                tokio::time::sleep(delay).await;
            }
            if self.unreachable {
                return Err(IdentityFetchError(ApiError::ServerError("down".into())));
            }
            self.identities
                .get(token.expose())
                .cloned()
                .map(UserProfile::new)
                .ok_or(IdentityFetchError(ApiError::Unauthorized))
        }

        async fn login(&self, username: &str, password: &str) -> Result<CredentialToken, LoginError> {
            self.login_calls.fetch_add(1, Ordering::SeqCst);
            if self.unreachable {
                return Err(LoginError::Transport("connection refused".into()));
            }
            match self.accounts.get(username) {
                Some((expected, token)) if expected == password => Ok(CredentialToken::from(token.as_str())),
                _ => Err(LoginError::Rejected("invalid credentials".into())),
            }
        }

        async fn register(&self, _profile: &Value) -> Result<(), RegisterError> {
            self.register_calls.fetch_add(1, Ordering::SeqCst);
            match &self.register_outcome {
                Some(error) => Err(error.clone()),
                None => Ok(()),
            }
        }
    }

    #[derive(Default)]
    struct RecordingNavigator {
        routes: StdMutex<Vec<Route>>,
    }

    impl RecordingNavigator {
        fn routes(&self) -> Vec<Route> {
            self.routes.lock().unwrap().clone()
        }
    }

    impl NavigationSink for RecordingNavigator {
        fn navigate(&self, route: Route) {
            self.routes.lock().unwrap().push(route);
        }
    }

    /// Store whose backing medium is broken
    struct BrokenStore;

    impl CredentialStore for BrokenStore {
        fn get(&self) -> anyhow::Result<Option<CredentialToken>> {
            Err(anyhow!("keychain locked"))
        }

        fn set(&self, _token: &CredentialToken) -> anyhow::Result<()> {
            Err(anyhow!("keychain locked"))
        }

        fn clear(&self) -> anyhow::Result<()> {
            Err(anyhow!("keychain locked"))
        }
    }

    type TestManager =
        SessionManager<Arc<MockIdentityClient>, MemoryCredentialStore, Arc<RecordingNavigator>>;

    struct Harness {
        manager: TestManager,
        client: Arc<MockIdentityClient>,
        store: MemoryCredentialStore,
        navigator: Arc<RecordingNavigator>,
    }

    fn harness(client: MockIdentityClient, store: MemoryCredentialStore) -> Harness {
        let client = Arc::new(client);
        let navigator = Arc::new(RecordingNavigator::default());
        let manager = SessionManager::new(client.clone(), store.clone(), navigator.clone());
        Harness {
            manager,
            client,
            store,
            navigator,
        }
    }

    fn authenticated(user: Value) -> SessionState {
        SessionState::Authenticated {
            user: UserProfile::new(user),
        }
    }

    fn token(value: &str) -> Option<CredentialToken> {
        Some(CredentialToken::from(value))
    }

    // ========================================================================
    // initialize
    // ========================================================================

    #[tokio::test]
    async fn test_initialize_without_token_skips_network() {
        let h = harness(MockIdentityClient::new(), MemoryCredentialStore::new());

        h.manager.initialize().await;

        assert_eq!(h.manager.state(), SessionState::Unauthenticated);
        assert_eq!(h.client.fetch_calls(), 0);
        assert!(h.navigator.routes().is_empty());
    }

    #[tokio::test]
    async fn test_initialize_restores_session_from_token() {
        let client = MockIdentityClient::new().with_identity("abc", json!({"name": "alice"}));
        let h = harness(client, MemoryCredentialStore::with_token("abc"));

        h.manager.initialize().await;

        assert_eq!(h.manager.state(), authenticated(json!({"name": "alice"})));
        assert!(h.manager.is_authenticated());
        assert_eq!(h.manager.current_user(), Some(UserProfile::new(json!({"name": "alice"}))));
        assert_eq!(h.store.get().unwrap(), token("abc"));
        assert!(h.navigator.routes().is_empty());
    }

    #[tokio::test]
    async fn test_initialize_discards_rejected_token() {
        let h = harness(MockIdentityClient::new(), MemoryCredentialStore::with_token("expired"));

        h.manager.initialize().await;

        assert_eq!(h.manager.state(), SessionState::Unauthenticated);
        assert_eq!(h.store.get().unwrap(), None);
        assert_eq!(h.client.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn test_initialize_discards_token_when_backend_unreachable() {
        let client = MockIdentityClient::new()
            .with_identity("abc", json!({"name": "alice"}))
            .unreachable();
        let h = harness(client, MemoryCredentialStore::with_token("abc"));

        h.manager.initialize().await;

        assert_eq!(h.manager.state(), SessionState::Unauthenticated);
        assert_eq!(h.store.get().unwrap(), None);
    }

    #[tokio::test]
    async fn test_initialize_treats_broken_store_as_empty() {
        let client = Arc::new(MockIdentityClient::new());
        let navigator = Arc::new(RecordingNavigator::default());
        let manager = SessionManager::new(client.clone(), BrokenStore, navigator);

        manager.initialize().await;

        assert_eq!(manager.state(), SessionState::Unauthenticated);
        assert_eq!(client.fetch_calls(), 0);
    }

    // ========================================================================
    // login
    // ========================================================================

    #[tokio::test]
    async fn test_login_rejected_returns_backend_message() {
        let client = MockIdentityClient::new().with_account("bob", "right", "xyz");
        let h = harness(client, MemoryCredentialStore::new());

        let result = h.manager.login("bob", "wrong").await;

        assert_eq!(result.as_deref(), Some("invalid credentials"));
        assert_eq!(h.manager.state(), SessionState::Unauthenticated);
        assert_eq!(h.store.get().unwrap(), None);
        assert!(h.navigator.routes().is_empty());
        assert_eq!(h.client.fetch_calls(), 0);
    }

    #[tokio::test]
    async fn test_login_rejected_leaves_existing_session_alone() {
        let client = MockIdentityClient::new()
            .with_identity("abc", json!({"name": "alice"}))
            .with_account("bob", "right", "xyz");
        let h = harness(client, MemoryCredentialStore::with_token("abc"));
        h.manager.initialize().await;

        let result = h.manager.login("bob", "wrong").await;

        assert!(result.is_some());
        assert_eq!(h.manager.state(), authenticated(json!({"name": "alice"})));
        assert_eq!(h.store.get().unwrap(), token("abc"));
    }

    #[tokio::test]
    async fn test_login_transport_failure_returns_message() {
        let client = MockIdentityClient::new()
            .with_account("bob", "right", "xyz")
            .unreachable();
        let h = harness(client, MemoryCredentialStore::new());

        let result = h.manager.login("bob", "right").await;

        assert_eq!(result.as_deref(), Some("connection refused"));
        assert_eq!(h.manager.state(), SessionState::Unauthenticated);
        assert!(h.navigator.routes().is_empty());
    }

    #[tokio::test]
    async fn test_login_success_authenticates_and_navigates_to_profile() {
        let client = MockIdentityClient::new()
            .with_account("bob", "right", "xyz")
            .with_identity("xyz", json!({"name": "bob"}));
        let h = harness(client, MemoryCredentialStore::new());

        let result = h.manager.login("bob", "right").await;

        assert_eq!(result, None);
        assert_eq!(h.manager.state(), authenticated(json!({"name": "bob"})));
        assert_eq!(h.store.get().unwrap(), token("xyz"));
        assert_eq!(h.navigator.routes(), vec![Route::Profile]);
    }

    #[tokio::test]
    async fn test_login_with_unresolvable_identity_keeps_token() {
        // Token issued, but /user/me refuses it
        let client = MockIdentityClient::new().with_account("bob", "right", "xyz");
        let h = harness(client, MemoryCredentialStore::new());

        let result = h.manager.login("bob", "right").await;

        assert_eq!(result, None);
        assert_eq!(h.manager.state(), SessionState::Unauthenticated);
        assert_eq!(h.store.get().unwrap(), token("xyz"));
        assert!(h.navigator.routes().is_empty());
    }

    #[tokio::test]
    async fn test_login_with_unresolvable_identity_drops_previous_session() {
        let client = MockIdentityClient::new()
            .with_identity("abc", json!({"name": "alice"}))
            .with_account("bob", "right", "xyz");
        let h = harness(client, MemoryCredentialStore::with_token("abc"));
        h.manager.initialize().await;
        assert!(h.manager.is_authenticated());

        h.manager.login("bob", "right").await;

        assert_eq!(h.manager.state(), SessionState::Unauthenticated);
        assert_eq!(h.store.get().unwrap(), token("xyz"));
    }

    // ========================================================================
    // logout
    // ========================================================================

    #[tokio::test]
    async fn test_logout_clears_everything() {
        let client = MockIdentityClient::new().with_identity("abc", json!({"name": "alice"}));
        let h = harness(client, MemoryCredentialStore::with_token("abc"));
        h.manager.initialize().await;

        h.manager.logout().await;

        assert_eq!(h.manager.state(), SessionState::Unauthenticated);
        assert_eq!(h.store.get().unwrap(), None);
        assert_eq!(h.navigator.routes(), vec![Route::Root]);
    }

    #[tokio::test]
    async fn test_logout_twice_matches_logout_once() {
        let client = MockIdentityClient::new().with_identity("abc", json!({"name": "alice"}));
        let h = harness(client, MemoryCredentialStore::with_token("abc"));
        h.manager.initialize().await;

        h.manager.logout().await;
        let after_once = (h.manager.state(), h.store.get().unwrap());
        h.manager.logout().await;
        let after_twice = (h.manager.state(), h.store.get().unwrap());

        assert_eq!(after_once, after_twice);
        assert_eq!(h.navigator.routes(), vec![Route::Root, Route::Root]);
    }

    #[tokio::test]
    async fn test_logout_when_never_authenticated() {
        let h = harness(MockIdentityClient::new(), MemoryCredentialStore::new());

        h.manager.logout().await;

        assert_eq!(h.manager.state(), SessionState::Unauthenticated);
        assert_eq!(h.store.get().unwrap(), None);
    }

    #[tokio::test]
    async fn test_logout_with_broken_store_still_unauthenticates() {
        let navigator = Arc::new(RecordingNavigator::default());
        let manager = SessionManager::new(Arc::new(MockIdentityClient::new()), BrokenStore, navigator.clone());

        manager.logout().await;

        assert_eq!(manager.state(), SessionState::Unauthenticated);
        assert_eq!(navigator.routes(), vec![Route::Root]);
    }

    // ========================================================================
    // register
    // ========================================================================

    #[tokio::test]
    async fn test_register_success_navigates_without_logging_in() {
        let h = harness(MockIdentityClient::new(), MemoryCredentialStore::new());

        let result = h.manager.register(&json!({"email": "dave@example.com"})).await;

        assert_eq!(result, None);
        assert_eq!(h.manager.state(), SessionState::Unauthenticated);
        assert_eq!(h.store.get().unwrap(), None);
        assert_eq!(h.navigator.routes(), vec![Route::Success]);
    }

    #[tokio::test]
    async fn test_register_rejected_is_silent() {
        let client = MockIdentityClient::new()
            .with_identity("abc", json!({"name": "alice"}))
            .rejecting_registration(RegisterError::Rejected);
        let h = harness(client, MemoryCredentialStore::with_token("abc"));
        h.manager.initialize().await;

        let result = h.manager.register(&json!({"name": "dave"})).await;

        assert_eq!(result, None);
        assert_eq!(h.manager.state(), authenticated(json!({"name": "alice"})));
        assert_eq!(h.store.get().unwrap(), token("abc"));
        assert!(h.navigator.routes().is_empty());
        assert_eq!(h.client.register_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_register_transport_failure_returns_message() {
        let client = MockIdentityClient::new()
            .rejecting_registration(RegisterError::Transport("connection reset".into()));
        let h = harness(client, MemoryCredentialStore::new());

        let result = h.manager.register(&json!({"name": "dave"})).await;

        assert_eq!(result.as_deref(), Some("connection reset"));
        assert!(h.navigator.routes().is_empty());
    }

    // ========================================================================
    // Cross-operation properties
    // ========================================================================

    #[tokio::test]
    async fn test_login_then_restart_restores_same_state() {
        let client = Arc::new(
            MockIdentityClient::new()
                .with_account("bob", "right", "xyz")
                .with_identity("xyz", json!({"name": "bob"})),
        );
        let store = MemoryCredentialStore::new();

        let live = SessionManager::new(client.clone(), store.clone(), Arc::new(RecordingNavigator::default()));
        assert_eq!(live.login("bob", "right").await, None);

        let restarted = SessionManager::new(client.clone(), store.clone(), Arc::new(RecordingNavigator::default()));
        restarted.initialize().await;

        assert_eq!(restarted.state(), live.state());
        assert!(restarted.is_authenticated());
    }

    #[tokio::test]
    async fn test_watchers_see_each_transition() {
        let client = MockIdentityClient::new()
            .with_account("bob", "right", "xyz")
            .with_identity("xyz", json!({"name": "bob"}));
        let h = harness(client, MemoryCredentialStore::new());
        let mut watcher = h.manager.subscribe();

        h.manager.login("bob", "right").await;
        assert_eq!(watcher.changed().await, Some(authenticated(json!({"name": "bob"}))));

        h.manager.logout().await;
        assert_eq!(watcher.changed().await, Some(SessionState::Unauthenticated));
        assert_eq!(watcher.current(), h.manager.state());
    }

    #[tokio::test]
    async fn test_logout_issued_during_login_runs_after_it() {
        let client = MockIdentityClient::new()
            .with_account("bob", "right", "xyz")
            .with_identity("xyz", json!({"name": "bob"}))
            .with_fetch_delay(Duration::from_millis(50));
        let h = harness(client, MemoryCredentialStore::new());

        let (login_result, ()) = tokio::join!(h.manager.login("bob", "right"), async {
            tokio::task::yield_now().await;
            h.manager.logout().await;
        });

        assert_eq!(login_result, None);
        assert_eq!(h.manager.state(), SessionState::Unauthenticated);
        assert_eq!(h.store.get().unwrap(), None);
        assert_eq!(h.navigator.routes(), vec![Route::Profile, Route::Root]);
    }

    #[tokio::test]
    async fn test_concurrent_operations_complete_in_call_order() {
        let client = MockIdentityClient::new()
            .with_account("bob", "right", "xyz")
            .with_identity("xyz", json!({"name": "bob"}))
            .with_fetch_delay(Duration::from_millis(20));
        let h = harness(client, MemoryCredentialStore::new());
        let profile = json!({"email": "dave@example.com"});

        futures::future::join3(
            h.manager.login("bob", "right"),
            h.manager.register(&profile),
            h.manager.logout(),
        )
        .await;

        assert_eq!(
            h.navigator.routes(),
            vec![Route::Profile, Route::Success, Route::Root]
        );
        assert_eq!(h.manager.state(), SessionState::Unauthenticated);
        assert_eq!(h.client.login_calls.load(Ordering::SeqCst), 1);
    }
}
