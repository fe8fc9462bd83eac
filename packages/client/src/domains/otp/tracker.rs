//! Verification code tracker.
//!
//! Manages a single outstanding OTP challenge: a 6-digit code, an absolute
//! expiry instant, and resend eligibility. All countdown math is
//! `expires_at - clock.now()`, never an accumulated tick count, so time
//! spent backgrounded is charged correctly when the app resumes.
//!
//! The code is generated and compared on this device; the gateway only
//! delivers the message. See DESIGN.md for why that is kept as-is.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::common::ClientError;
use crate::kernel::ClientDeps;

const CODE_LENGTH: usize = 6;

struct CodeSession {
    code: String,
    destination: String,
    expires_at: DateTime<Utc>,
}

/// Tracks the lifecycle of the outstanding OTP challenge.
pub struct CodeTracker {
    deps: Arc<ClientDeps>,
    session: Mutex<Option<CodeSession>>,
}

impl CodeTracker {
    pub fn new(deps: Arc<ClientDeps>) -> Self {
        Self {
            deps,
            session: Mutex::new(None),
        }
    }

    /// Issue a fresh code and dispatch it to the destination.
    ///
    /// Re-issue replaces any outstanding session: only the latest code is
    /// acceptable. The countdown starts whether or not dispatch succeeds;
    /// a gateway failure is surfaced so the user can retry, but the resend
    /// cooldown is already running (matches the shipped app's behavior).
    pub async fn issue(&self, destination: &str) -> Result<(), ClientError> {
        let code = format!("{:06}", fastrand::u32(0..1_000_000));
        let expires_at = self.deps.clock.now()
            + chrono::Duration::from_std(self.deps.otp_ttl)
                .unwrap_or_else(|_| chrono::Duration::seconds(120));

        {
            let mut session = self.session.lock().await;
            *session = Some(CodeSession {
                code: code.clone(),
                destination: destination.to_string(),
                expires_at,
            });
        }

        let body = format!("Kode verifikasi pasarin: {}. Berlaku 2 menit.", code);
        if let Err(e) = self.deps.messaging.send_message(destination, &body).await {
            warn!(destination, "otp dispatch failed: {:#}", e);
            return Err(ClientError::Network(format!(
                "could not deliver the verification code: {}",
                e
            )));
        }
        info!(destination, "otp dispatched");
        Ok(())
    }

    /// Compare user input against the outstanding code.
    ///
    /// An expired session fails with `ExpiredCode` even when the digits
    /// match; a missing session counts as expired too.
    pub async fn verify(&self, input: &str) -> Result<bool, ClientError> {
        if input.len() != CODE_LENGTH || !input.chars().all(|c| c.is_ascii_digit()) {
            return Err(ClientError::MalformedInput(
                "verification code must be 6 digits".to_string(),
            ));
        }

        let session = self.session.lock().await;
        let session = session.as_ref().ok_or(ClientError::ExpiredCode)?;
        if self.deps.clock.now() >= session.expires_at {
            return Err(ClientError::ExpiredCode);
        }
        Ok(input == session.code)
    }

    /// Wall-clock time left on the countdown; zero when expired or idle.
    ///
    /// Call this on foreground-resume before any `can_resend()` check so the
    /// UI shows the backgrounding-corrected remainder.
    pub async fn remaining(&self) -> Duration {
        let session = self.session.lock().await;
        match session.as_ref() {
            Some(session) => (session.expires_at - self.deps.clock.now())
                .to_std()
                .unwrap_or(Duration::ZERO),
            None => Duration::ZERO,
        }
    }

    /// True when a new code may be requested.
    pub async fn can_resend(&self) -> bool {
        let session = self.session.lock().await;
        match session.as_ref() {
            Some(session) => self.deps.clock.now() >= session.expires_at,
            None => true,
        }
    }

    /// Destination of the outstanding challenge, if any.
    pub async fn destination(&self) -> Option<String> {
        let session = self.session.lock().await;
        session.as_ref().map(|s| s.destination.clone())
    }

    #[cfg(test)]
    async fn current_code(&self) -> Option<String> {
        let session = self.session.lock().await;
        session.as_ref().map(|s| s.code.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_dependencies::TestDependencies;

    fn tracker_with(td: &TestDependencies) -> CodeTracker {
        CodeTracker::new(Arc::new(td.deps()))
    }

    #[tokio::test]
    async fn test_issue_dispatches_code_to_destination() {
        let td = TestDependencies::new();
        let tracker = tracker_with(&td);

        tracker.issue("081234567890").await.unwrap();

        let sends = td.messaging.sends();
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0].0, "081234567890");
        let code = tracker.current_code().await.unwrap();
        assert_eq!(code.len(), 6);
        assert!(sends[0].1.contains(&code));
    }

    #[tokio::test]
    async fn test_verify_accepts_matching_code_within_countdown() {
        let td = TestDependencies::new();
        let tracker = tracker_with(&td);
        tracker.issue("081234567890").await.unwrap();
        let code = tracker.current_code().await.unwrap();

        assert!(tracker.verify(&code).await.unwrap());

        let wrong = if code == "111111" { "222222" } else { "111111" };
        assert!(!tracker.verify(wrong).await.unwrap());
    }

    #[tokio::test]
    async fn test_verify_after_expiry_fails_even_on_match() {
        let td = TestDependencies::new();
        let tracker = tracker_with(&td);
        tracker.issue("081234567890").await.unwrap();
        let code = tracker.current_code().await.unwrap();

        td.clock.advance(Duration::from_secs(120));

        let err = tracker.verify(&code).await.unwrap_err();
        assert!(matches!(err, ClientError::ExpiredCode));
    }

    #[tokio::test]
    async fn test_countdown_is_wall_clock_correct_across_backgrounding() {
        let td = TestDependencies::new();
        let tracker = tracker_with(&td);
        tracker.issue("081234567890").await.unwrap();

        // 10s in the foreground, then 85s backgrounded
        td.clock.advance(Duration::from_secs(10));
        td.clock.advance(Duration::from_secs(85));

        // On resume the remainder reflects all 95 elapsed seconds
        assert_eq!(tracker.remaining().await, Duration::from_secs(25));
        assert!(!tracker.can_resend().await);

        td.clock.advance(Duration::from_secs(25));
        assert_eq!(tracker.remaining().await, Duration::ZERO);
        assert!(tracker.can_resend().await);
    }

    #[tokio::test]
    async fn test_reissue_invalidates_previous_code() {
        let td = TestDependencies::new();
        let tracker = tracker_with(&td);

        tracker.issue("081234567890").await.unwrap();
        let first = tracker.current_code().await.unwrap();

        // Random codes can collide; reissue until one differs so the
        // stale-code assertion is always exercised
        let second = loop {
            td.clock.advance(Duration::from_secs(120));
            tracker.issue("081234567890").await.unwrap();
            let code = tracker.current_code().await.unwrap();
            if code != first {
                break code;
            }
        };

        assert!(!tracker.verify(&first).await.unwrap());
        assert!(tracker.verify(&second).await.unwrap());
    }

    #[tokio::test]
    async fn test_dispatch_failure_still_starts_countdown() {
        let td = TestDependencies::new();
        td.messaging.set_fail_sends(true);
        let tracker = tracker_with(&td);

        let err = tracker.issue("081234567890").await.unwrap_err();

        assert!(matches!(err, ClientError::Network(_)));
        // The cooldown is running even though nothing was delivered
        assert!(!tracker.can_resend().await);
        assert_eq!(tracker.remaining().await, Duration::from_secs(120));
    }

    #[tokio::test]
    async fn test_malformed_input_is_rejected_locally() {
        let td = TestDependencies::new();
        let tracker = tracker_with(&td);
        tracker.issue("081234567890").await.unwrap();

        assert!(matches!(
            tracker.verify("12345").await.unwrap_err(),
            ClientError::MalformedInput(_)
        ));
        assert!(matches!(
            tracker.verify("abcdef").await.unwrap_err(),
            ClientError::MalformedInput(_)
        ));
    }

    #[tokio::test]
    async fn test_verify_without_session_counts_as_expired() {
        let td = TestDependencies::new();
        let tracker = tracker_with(&td);

        let err = tracker.verify("123456").await.unwrap_err();
        assert!(matches!(err, ClientError::ExpiredCode));
        assert!(tracker.can_resend().await);
    }
}
