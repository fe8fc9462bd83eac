//! Single source of truth for "is this device authenticated".
//!
//! The session store is the only component allowed to mutate the persisted
//! credential. Screens observe it through a watch channel instead of polling,
//! and every authenticated request goes through `authenticated()` so a
//! 401-equivalent response always tears the session down, even when the
//! screen that fired the request is long gone.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::{info, warn};

use crate::common::ClientError;
use crate::kernel::{ApiError, ClientDeps, LoginRequest, RegisterRequest};

/// Opaque bearer token identifying an authenticated session
pub type Credential = String;

/// Holds the current credential and owns its persistence.
pub struct SessionStore {
    deps: Arc<ClientDeps>,
    credential: RwLock<Option<Credential>>,
    observer: watch::Sender<Option<Credential>>,
}

impl SessionStore {
    pub fn new(deps: Arc<ClientDeps>) -> Self {
        let (observer, _) = watch::channel(None);
        Self {
            deps,
            credential: RwLock::new(None),
            observer,
        }
    }

    /// Current credential, if any. Absence means "logged out".
    pub async fn credential(&self) -> Option<Credential> {
        self.credential.read().await.clone()
    }

    /// Shared dependency container (for components layered on this store).
    pub fn deps(&self) -> Arc<ClientDeps> {
        self.deps.clone()
    }

    /// Subscribe to credential changes (login, logout, forced expiry).
    pub fn subscribe(&self) -> watch::Receiver<Option<Credential>> {
        self.observer.subscribe()
    }

    /// Read the persisted credential at process start.
    ///
    /// A restored credential is trusted until the next authenticated request
    /// fails; there is no eager remote re-validation.
    pub async fn restore_session(&self) -> Option<Credential> {
        let token = match self.deps.credential_store.load().await {
            Ok(token) => token,
            Err(e) => {
                warn!("failed to read persisted credential: {:#}", e);
                None
            }
        };
        if let Some(token) = token.clone() {
            let mut credential = self.credential.write().await;
            *credential = Some(token.clone());
            self.observer.send_replace(Some(token));
            info!("session restored from storage");
        }
        token
    }

    /// Authenticate with phone number + PIN.
    ///
    /// Captures device location first (the backend requires it); a denied
    /// location permission fails the login before any network call. On
    /// success the token is persisted before it becomes observable, so no
    /// partial state survives a storage failure.
    pub async fn login(&self, phone: &str, pin: &str) -> Result<Credential, ClientError> {
        let location = self.deps.location.current().await?;
        let request = LoginRequest {
            phone: phone.to_string(),
            pin: pin.to_string(),
            ip: location.ip,
            latitude: location.latitude,
            longitude: location.longitude,
        };
        let token = self
            .deps
            .api
            .login(&request)
            .await
            .map_err(login_error)?;
        self.install_credential(token).await
    }

    /// Create an account and authenticate in one step. Same persistence
    /// contract as `login`.
    pub async fn register(
        &self,
        phone: &str,
        pin: &str,
        invite_code: &str,
        option: i32,
    ) -> Result<Credential, ClientError> {
        let location = self.deps.location.current().await?;
        let request = RegisterRequest {
            phone: phone.to_string(),
            pin: pin.to_string(),
            ip: location.ip,
            latitude: location.latitude,
            longitude: location.longitude,
            invite_code: invite_code.to_string(),
            option,
        };
        let token = self
            .deps
            .api
            .register(&request)
            .await
            .map_err(login_error)?;
        self.install_credential(token).await
    }

    /// Registration prechecks: the phone must not already have an account
    /// and the invite code must be valid.
    pub async fn precheck_registration(
        &self,
        phone: &str,
        invite_code: &str,
    ) -> Result<(), ClientError> {
        use crate::kernel::{InviteCodeCheck, PhoneCheck};

        match self.deps.api.check_phone(phone).await.map_err(remote_error)? {
            PhoneCheck::Registered => {
                return Err(ClientError::Authentication(
                    "this phone number is already registered".to_string(),
                ))
            }
            PhoneCheck::NotRegistered => {}
        }
        match self
            .deps
            .api
            .check_invite_code(invite_code)
            .await
            .map_err(remote_error)?
        {
            InviteCodeCheck::Valid => Ok(()),
            InviteCodeCheck::Invalid => Err(ClientError::Authentication(
                "invite code is not valid".to_string(),
            )),
        }
    }

    /// Clear the session unconditionally. Never fails: a storage error is
    /// logged and the in-memory credential is dropped regardless.
    pub async fn logout(&self) {
        let mut credential = self.credential.write().await;
        *credential = None;
        if let Err(e) = self.deps.credential_store.clear().await {
            warn!("failed to clear persisted credential: {:#}", e);
        }
        self.observer.send_replace(None);
        info!("logged out");
    }

    /// Run an API call with the current credential attached.
    ///
    /// A 401-equivalent from the backend clears this store's state before the
    /// error reaches the caller; callers treat `SessionExpired` as an implicit
    /// logout that has already happened.
    pub async fn authenticated<T, F, Fut>(&self, call: F) -> Result<T, ClientError>
    where
        F: FnOnce(Credential) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let token = self
            .credential()
            .await
            .ok_or(ClientError::SessionExpired)?;
        match call(token).await {
            Ok(value) => Ok(value),
            Err(ApiError::Unauthorized) => {
                warn!("credential rejected by backend, forcing logout");
                self.logout().await;
                Err(ClientError::SessionExpired)
            }
            Err(e) => Err(remote_error(e)),
        }
    }

    /// Persist then publish a fresh credential.
    async fn install_credential(&self, token: Credential) -> Result<Credential, ClientError> {
        // Hold the write lock across persist + publish so logout cannot
        // interleave and resurrect a cleared credential.
        let mut credential = self.credential.write().await;
        self.deps.credential_store.save(&token).await?;
        *credential = Some(token.clone());
        self.observer.send_replace(Some(token.clone()));
        info!("authenticated");
        Ok(token)
    }
}

/// Map login/register failures: backend rejections are authentication
/// errors, everything else is transport.
fn login_error(e: ApiError) -> ClientError {
    match e {
        ApiError::Unauthorized => {
            ClientError::Authentication("phone number or PIN is incorrect".to_string())
        }
        ApiError::Api { message, .. } => ClientError::Authentication(message),
        ApiError::Network(m) | ApiError::Parse(m) => ClientError::Network(m),
    }
}

/// Map failures of already-authenticated calls (401 is handled separately).
fn remote_error(e: ApiError) -> ClientError {
    match e {
        ApiError::Unauthorized => ClientError::SessionExpired,
        ApiError::Api { message, .. } => ClientError::Network(message),
        ApiError::Network(m) | ApiError::Parse(m) => ClientError::Network(m),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_dependencies::{MockBackendApi, TestDependencies};
    use crate::kernel::traits::BaseCredentialStore;

    fn store_with(td: &TestDependencies) -> SessionStore {
        SessionStore::new(Arc::new(td.deps()))
    }

    #[tokio::test]
    async fn test_login_persists_and_publishes_credential() {
        let td = TestDependencies::with_api(
            MockBackendApi::new().with_login_result(Ok("tok_abc".to_string())),
        );
        let store = store_with(&td);
        let mut rx = store.subscribe();

        let token = store.login("081234567890", "000000").await.unwrap();

        assert_eq!(token, "tok_abc");
        assert_eq!(store.credential().await, Some("tok_abc".to_string()));
        assert_eq!(td.credential_store.stored(), Some("tok_abc".to_string()));
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Some("tok_abc".to_string()));

        let calls = td.api.login_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].phone, "081234567890");
    }

    #[tokio::test]
    async fn test_login_rejection_leaves_no_state() {
        let td = TestDependencies::with_api(MockBackendApi::new().with_login_result(Err(
            ApiError::Api {
                status: 422,
                message: "PIN salah".to_string(),
            },
        )));
        let store = store_with(&td);

        let err = store.login("081234567890", "999999").await.unwrap_err();

        assert!(matches!(err, ClientError::Authentication(_)));
        assert_eq!(store.credential().await, None);
        assert_eq!(td.credential_store.stored(), None);
    }

    #[tokio::test]
    async fn test_login_without_location_permission_makes_no_network_call() {
        let td = TestDependencies::new();
        let store = SessionStore::new(Arc::new(td.deps_without_location()));

        let err = store.login("081234567890", "000000").await.unwrap_err();

        assert!(matches!(err, ClientError::PermissionDenied(_)));
        assert!(td.api.login_calls().is_empty());
    }

    #[tokio::test]
    async fn test_storage_failure_leaves_no_partial_state() {
        let td = TestDependencies::new();
        td.credential_store.set_fail_saves(true);
        let store = store_with(&td);

        let err = store.login("081234567890", "000000").await.unwrap_err();

        assert!(matches!(err, ClientError::Internal(_)));
        assert_eq!(store.credential().await, None);
        assert_eq!(td.credential_store.stored(), None);
    }

    #[tokio::test]
    async fn test_logout_clears_memory_and_storage() {
        let td = TestDependencies::new();
        let store = store_with(&td);
        store.login("081234567890", "000000").await.unwrap();

        store.logout().await;

        assert_eq!(store.credential().await, None);
        assert_eq!(td.credential_store.stored(), None);
    }

    #[tokio::test]
    async fn test_restore_session_reads_storage_once() {
        let td = TestDependencies::new();
        td.credential_store.save("tok_persisted").await.unwrap();
        let store = store_with(&td);

        let restored = store.restore_session().await;

        assert_eq!(restored, Some("tok_persisted".to_string()));
        assert_eq!(store.credential().await, Some("tok_persisted".to_string()));
    }

    #[tokio::test]
    async fn test_unauthorized_response_forces_logout() {
        let td = TestDependencies::new();
        let store = store_with(&td);
        store.login("081234567890", "000000").await.unwrap();

        let result: Result<(), ClientError> = store
            .authenticated(|_token| async { Err(ApiError::Unauthorized) })
            .await;

        assert!(matches!(result, Err(ClientError::SessionExpired)));
        assert_eq!(store.credential().await, None);
        assert_eq!(td.credential_store.stored(), None);
    }

    #[tokio::test]
    async fn test_authenticated_without_credential_is_session_expired() {
        let td = TestDependencies::new();
        let store = store_with(&td);

        let result: Result<(), ClientError> =
            store.authenticated(|_token| async { Ok(()) }).await;

        assert!(matches!(result, Err(ClientError::SessionExpired)));
    }

    #[tokio::test]
    async fn test_credential_follows_most_recent_terminal_event() {
        // login -> logout -> login -> forced expiry, in sequence; the
        // observable credential always matches the latest event.
        let td = TestDependencies::with_api(
            MockBackendApi::new()
                .with_login_result(Ok("tok_one".to_string()))
                .with_login_result(Ok("tok_two".to_string())),
        );
        let store = store_with(&td);

        store.login("081234567890", "000000").await.unwrap();
        assert_eq!(store.credential().await, Some("tok_one".to_string()));

        store.logout().await;
        assert_eq!(store.credential().await, None);

        store.login("081234567890", "000000").await.unwrap();
        assert_eq!(store.credential().await, Some("tok_two".to_string()));

        let _: Result<(), ClientError> = store
            .authenticated(|_| async { Err(ApiError::Unauthorized) })
            .await;
        assert_eq!(store.credential().await, None);
    }

    #[tokio::test]
    async fn test_logout_during_inflight_request_ends_logged_out() {
        // Explicit logout races an authenticated call that is about to come
        // back Unauthorized. Whichever order the two land in, the store must
        // end logged out with nothing persisted.
        let td = TestDependencies::new();
        let store = Arc::new(store_with(&td));
        store.login("081234567890", "000000").await.unwrap();

        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let inflight = {
            let store = store.clone();
            tokio::spawn(async move {
                let result: Result<(), ClientError> = store
                    .authenticated(move |_token| async move {
                        // Hold the request open until the test releases it
                        let _ = release_rx.await;
                        Err(ApiError::Unauthorized)
                    })
                    .await;
                result
            })
        };

        tokio::task::yield_now().await;
        store.logout().await;
        let _ = release_tx.send(());

        let result = inflight.await.unwrap();
        assert!(matches!(result, Err(ClientError::SessionExpired)));
        assert_eq!(store.credential().await, None);
        assert_eq!(td.credential_store.stored(), None);
    }

    #[tokio::test]
    async fn test_network_failure_does_not_touch_session() {
        let td = TestDependencies::new();
        let store = store_with(&td);
        store.login("081234567890", "000000").await.unwrap();

        let result: Result<(), ClientError> = store
            .authenticated(|_| async { Err(ApiError::Network("timed out".to_string())) })
            .await;

        assert!(matches!(result, Err(ClientError::Network(_))));
        assert_eq!(store.credential().await, Some("tok_test".to_string()));
    }
}
