//! End-to-end flows over mock dependencies: login through forced expiry,
//! and the full registration + top-up happy path.

use std::sync::Arc;
use std::time::Duration;

use client_core::common::ClientError;
use client_core::domains::otp::CodeTracker;
use client_core::domains::payment::{SettlementPoller, SettlementState};
use client_core::domains::pin::{PinGate, PinVerification};
use client_core::domains::session::SessionStore;
use client_core::kernel::test_dependencies::{MockBackendApi, TestDependencies};
use client_core::kernel::{ApiError, SettlementStatus, StatusSnapshot};

#[tokio::test]
async fn login_then_unauthorized_call_ends_logged_out() {
    let td = TestDependencies::with_api(
        MockBackendApi::new().with_login_result(Ok("tok_abc".to_string())),
    );
    let session = Arc::new(SessionStore::new(Arc::new(td.deps())));
    let mut observer = session.subscribe();

    let token = session.login("081234567890", "000000").await.unwrap();
    assert_eq!(token, "tok_abc");

    // Backend invalidates the credential mid-session
    let result: Result<(), ClientError> = session
        .authenticated(|_| async { Err(ApiError::Unauthorized) })
        .await;

    assert!(matches!(result, Err(ClientError::SessionExpired)));
    assert_eq!(session.credential().await, None);
    assert_eq!(td.credential_store.stored(), None);

    // The observer saw both the login and the forced logout
    observer.changed().await.unwrap();
    assert_eq!(*observer.borrow_and_update(), None);
}

#[tokio::test]
async fn registration_flow_with_otp_and_prechecks() {
    let td = TestDependencies::new();
    let deps = Arc::new(td.deps());
    let session = Arc::new(SessionStore::new(deps.clone()));
    let tracker = CodeTracker::new(deps);

    // Prechecks pass with the mock defaults (unregistered phone, valid code)
    session
        .precheck_registration("081234567890", "INVITE1")
        .await
        .unwrap();

    // Phone ownership via OTP
    tracker.issue("081234567890").await.unwrap();
    let sends = td.messaging.sends();
    assert_eq!(sends.len(), 1);
    let code: String = sends[0].1.chars().filter(|c| c.is_ascii_digit()).take(6).collect();
    assert!(tracker.verify(&code).await.unwrap());

    // Account creation yields a live session
    session
        .register("081234567890", "123456", "INVITE1", 1)
        .await
        .unwrap();
    assert!(session.credential().await.is_some());
}

#[tokio::test]
async fn topup_behind_pin_gate_settles_and_refreshes_balance() {
    let api = MockBackendApi::new()
        .with_pin_result(Ok(true))
        .with_status_result(Ok(StatusSnapshot {
            order_id: "order-test".to_string(),
            status: SettlementStatus::Pending,
            processed: false,
            expires_at: chrono::Utc::now() + chrono::Duration::minutes(10),
        }))
        .with_status_result(Ok(StatusSnapshot {
            order_id: "order-test".to_string(),
            status: SettlementStatus::Settlement,
            processed: true,
            expires_at: chrono::Utc::now() + chrono::Duration::minutes(10),
        }));
    let td = TestDependencies::with_api(api);
    let session = Arc::new(SessionStore::new(Arc::new(td.deps())));
    session.login("081234567890", "000000").await.unwrap();

    // Sensitive action: confirm presence first
    let gate = PinGate::new(session.clone());
    assert_eq!(gate.verify("123456").await.unwrap(), PinVerification::Accepted);

    // Start the top-up and poll it to settlement
    let poller = SettlementPoller::new(session);
    let settlement = poller.create(100_000, 10).await.unwrap();
    assert!(settlement.qris_url.is_some());

    let handle = poller.watch(&settlement.order_id).unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("polling should reach a terminal state")
        .unwrap();

    assert_eq!(poller.state(&settlement.order_id), Some(SettlementState::Settled));
    assert_eq!(td.wallet.refresh_count(), 1);
}
