//! OTP Challenge Manager
//!
//! Issues and verifies one-time codes. Challenges live in the cache keyed
//! by (destination, purpose, session); only the code's digest is stored,
//! and the attempt count is a sibling atomic counter so concurrent
//! verification attempts cannot double-count.
//!
//! State machine per challenge: Active -> Verified (terminal), Active ->
//! Expired / AttemptsExceeded (terminal), or Active -> superseded by a
//! newer issue for the same key. Nothing transitions out of a terminal
//! state.

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::CacheStore;
use crate::models::otp::{OtpChallenge, OtpIssued, OtpOutcome, OtpPolicy, OtpPurpose};
use crate::service::abuse_guard::{AbuseGuard, RateRule};
use crate::service::delivery::CodeDelivery;
use crate::utils::error::{AppError, AppResult};
use crate::utils::security::{constant_time_compare, generate_otp_code, hash_sensitive_data};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

fn resend_rule(policy: &OtpPolicy) -> RateRule {
    RateRule {
        scope: "otp_resend",
        ceiling: 1,
        window: policy.resend_window(),
    }
}

fn daily_rule(policy: &OtpPolicy) -> RateRule {
    RateRule {
        scope: "otp_daily",
        ceiling: policy.daily_ceiling,
        window: DAY,
    }
}

/// Creates, stores, and verifies one-time codes
pub struct OtpService {
    cache: Arc<dyn CacheStore>,
    guard: AbuseGuard,
    delivery: Arc<dyn CodeDelivery>,
    policies: fn(OtpPurpose) -> OtpPolicy,
}

impl OtpService {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        guard: AbuseGuard,
        delivery: Arc<dyn CodeDelivery>,
    ) -> Self {
        Self {
            cache,
            guard,
            delivery,
            policies: |purpose| purpose.policy(),
        }
    }

    /// Replace the purpose policy table (used to tighten or relax limits
    /// in tests and staging).
    pub fn with_policy_table(mut self, policies: fn(OtpPurpose) -> OtpPolicy) -> Self {
        self.policies = policies;
        self
    }

    /// The policy in force for a purpose
    pub fn policy(&self, purpose: OtpPurpose) -> OtpPolicy {
        (self.policies)(purpose)
    }

    /// Run only the send-side admission checks for a destination. Called
    /// by `issue`, and by flows that must burn the same budget without
    /// creating a challenge (enumeration resistance).
    pub async fn admit_send(&self, destination: &str, purpose: OtpPurpose) -> AppResult<()> {
        let policy = (self.policies)(purpose);
        let throttle_id = format!("{purpose}:{destination}");
        self.guard.admit(&throttle_id, &resend_rule(&policy)).await?;
        self.guard.admit(&throttle_id, &daily_rule(&policy)).await?;
        Ok(())
    }

    /// Issue a fresh challenge for (destination, purpose, session).
    ///
    /// Any pre-existing active challenge for the same key is overwritten
    /// and its attempt budget reset. The raw code goes to the delivery
    /// collaborator fire-and-forget: a delivery failure is logged and the
    /// challenge stands for its full TTL.
    pub async fn issue(
        &self,
        destination: &str,
        purpose: OtpPurpose,
        session_ref: &str,
    ) -> AppResult<OtpIssued> {
        self.admit_send(destination, purpose).await?;

        let policy = (self.policies)(purpose);
        let code = generate_otp_code();
        let now = Utc::now();
        let challenge = OtpChallenge {
            destination: destination.to_string(),
            purpose,
            session_ref: session_ref.to_string(),
            code_hash: hash_sensitive_data(&code),
            issued_at: now,
            expires_at: now + ChronoDuration::seconds(policy.code_ttl_seconds as i64),
            consumed: false,
        };

        let payload = serde_json::to_string(&challenge)
            .map_err(|e| AppError::Internal(format!("challenge serialization failed: {e}")))?;
        self.cache
            .set(
                &OtpChallenge::cache_key(destination, purpose, session_ref),
                &payload,
                policy.code_ttl(),
            )
            .await?;
        self.cache
            .delete(&OtpChallenge::attempts_key(destination, purpose, session_ref))
            .await?;

        if let Err(err) = self.delivery.send(destination, purpose, &code).await {
            log::warn!("{purpose} code delivery to {destination} failed: {err}");
        }

        Ok(OtpIssued {
            destination: destination.to_string(),
            purpose,
            expires_at: challenge.expires_at,
            resend_after_seconds: policy.resend_window_seconds,
        })
    }

    /// Verify a submitted code against the challenge for its key.
    ///
    /// This is the only path into the steps gated on proof of control:
    /// absent/expired challenges answer `Expired`, consumed ones
    /// `AlreadyUsed`; otherwise the attempt is counted atomically, a
    /// challenge past its attempt limit answers `AttemptsExceeded` no
    /// matter what code was submitted, and only then is the digest
    /// compared in constant time.
    pub async fn verify(
        &self,
        destination: &str,
        purpose: OtpPurpose,
        session_ref: &str,
        submitted_code: &str,
    ) -> AppResult<OtpOutcome> {
        let key = OtpChallenge::cache_key(destination, purpose, session_ref);

        let Some(payload) = self.cache.get(&key).await? else {
            return Ok(OtpOutcome::Expired);
        };
        let mut challenge: OtpChallenge = serde_json::from_str(&payload)
            .map_err(|e| AppError::Internal(format!("challenge deserialization failed: {e}")))?;

        if challenge.is_expired() {
            return Ok(OtpOutcome::Expired);
        }
        if challenge.consumed {
            return Ok(OtpOutcome::AlreadyUsed);
        }

        let policy = (self.policies)(purpose);
        let remaining = (challenge.expires_at - Utc::now())
            .to_std()
            .unwrap_or(Duration::from_secs(1));

        let counter = self
            .cache
            .increment(
                &OtpChallenge::attempts_key(destination, purpose, session_ref),
                remaining,
            )
            .await?;
        if counter.count > policy.attempt_limit {
            return Ok(OtpOutcome::AttemptsExceeded);
        }

        if !constant_time_compare(&hash_sensitive_data(submitted_code), &challenge.code_hash) {
            return Ok(OtpOutcome::InvalidCode {
                attempts: counter.count,
            });
        }

        challenge.consumed = true;
        let payload = serde_json::to_string(&challenge)
            .map_err(|e| AppError::Internal(format!("challenge serialization failed: {e}")))?;
        self.cache.set(&key, &payload, remaining).await?;

        Ok(OtpOutcome::Verified)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::service::delivery::DeliveryError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Captures outgoing codes instead of delivering them
    #[derive(Default)]
    pub(crate) struct RecordingDelivery {
        pub sent: Mutex<Vec<(String, OtpPurpose, String)>>,
        pub reject: bool,
    }

    impl RecordingDelivery {
        pub fn last_code(&self) -> Option<String> {
            self.sent
                .lock()
                .unwrap()
                .last()
                .map(|(_, _, code)| code.clone())
        }
    }

    #[async_trait]
    impl CodeDelivery for RecordingDelivery {
        async fn send(
            &self,
            destination: &str,
            purpose: OtpPurpose,
            code: &str,
        ) -> Result<(), DeliveryError> {
            self.sent.lock().unwrap().push((
                destination.to_string(),
                purpose,
                code.to_string(),
            ));
            if self.reject {
                return Err(DeliveryError::Rejected("gateway down".to_string()));
            }
            Ok(())
        }
    }

    /// Relaxed resend spacing so tests can issue repeatedly
    fn test_policies(purpose: OtpPurpose) -> OtpPolicy {
        OtpPolicy {
            code_ttl_seconds: 300,
            attempt_limit: match purpose {
                OtpPurpose::Login => 3,
                _ => 5,
            },
            resend_window_seconds: 0,
            daily_ceiling: 100,
        }
    }

    pub(crate) fn service_with(
        cache: Arc<InMemoryCache>,
        delivery: Arc<RecordingDelivery>,
    ) -> OtpService {
        OtpService::new(cache.clone(), AbuseGuard::new(cache), delivery)
            .with_policy_table(test_policies)
    }

    fn setup() -> (Arc<InMemoryCache>, Arc<RecordingDelivery>, OtpService) {
        let cache = Arc::new(InMemoryCache::new());
        let delivery = Arc::new(RecordingDelivery::default());
        let service = service_with(cache.clone(), delivery.clone());
        (cache, delivery, service)
    }

    const DEST: &str = "+8801712345678";
    const SESSION: &str = "device-1";

    #[tokio::test]
    async fn test_issue_then_verify_succeeds_exactly_once() {
        let (_, delivery, service) = setup();

        service.issue(DEST, OtpPurpose::Login, SESSION).await.unwrap();
        let code = delivery.last_code().unwrap();

        let outcome = service
            .verify(DEST, OtpPurpose::Login, SESSION, &code)
            .await
            .unwrap();
        assert_eq!(outcome, OtpOutcome::Verified);

        // Replaying the same code hits the consumed flag.
        let outcome = service
            .verify(DEST, OtpPurpose::Login, SESSION, &code)
            .await
            .unwrap();
        assert_eq!(outcome, OtpOutcome::AlreadyUsed);
    }

    #[tokio::test]
    async fn test_wrong_code_counts_attempts_then_locks_out() {
        let (_, delivery, service) = setup();

        service.issue(DEST, OtpPurpose::Login, SESSION).await.unwrap();
        let code = delivery.last_code().unwrap();
        let wrong = if code == "000000" { "000001" } else { "000000" };

        // Login permits 3 counted attempts; each mismatch reports its number.
        for expected in 1..=3 {
            let outcome = service
                .verify(DEST, OtpPurpose::Login, SESSION, wrong)
                .await
                .unwrap();
            assert_eq!(
                outcome,
                OtpOutcome::InvalidCode {
                    attempts: expected
                }
            );
        }

        // Past the limit even the correct code is refused.
        let outcome = service
            .verify(DEST, OtpPurpose::Login, SESSION, &code)
            .await
            .unwrap();
        assert_eq!(outcome, OtpOutcome::AttemptsExceeded);

        let outcome = service
            .verify(DEST, OtpPurpose::Login, SESSION, wrong)
            .await
            .unwrap();
        assert_eq!(outcome, OtpOutcome::AttemptsExceeded);
    }

    #[tokio::test]
    async fn test_absent_challenge_reads_as_expired() {
        let (_, _, service) = setup();
        let outcome = service
            .verify(DEST, OtpPurpose::Login, SESSION, "123456")
            .await
            .unwrap();
        assert_eq!(outcome, OtpOutcome::Expired);
    }

    #[tokio::test]
    async fn test_elapsed_challenge_reads_as_expired_not_invalid() {
        let (cache, _, service) = setup();

        // Plant a challenge whose embedded expiry is already in the past.
        let challenge = OtpChallenge {
            destination: DEST.to_string(),
            purpose: OtpPurpose::Login,
            session_ref: SESSION.to_string(),
            code_hash: hash_sensitive_data("123456"),
            issued_at: Utc::now() - ChronoDuration::minutes(10),
            expires_at: Utc::now() - ChronoDuration::minutes(5),
            consumed: false,
        };
        cache
            .set(
                &OtpChallenge::cache_key(DEST, OtpPurpose::Login, SESSION),
                &serde_json::to_string(&challenge).unwrap(),
                Duration::from_secs(60),
            )
            .await
            .unwrap();

        let outcome = service
            .verify(DEST, OtpPurpose::Login, SESSION, "123456")
            .await
            .unwrap();
        assert_eq!(outcome, OtpOutcome::Expired);
    }

    #[tokio::test]
    async fn test_new_issue_supersedes_prior_challenge() {
        let (_, delivery, service) = setup();

        service.issue(DEST, OtpPurpose::Login, SESSION).await.unwrap();
        let first_code = delivery.last_code().unwrap();

        service.issue(DEST, OtpPurpose::Login, SESSION).await.unwrap();
        let second_code = delivery.last_code().unwrap();

        if first_code != second_code {
            let outcome = service
                .verify(DEST, OtpPurpose::Login, SESSION, &first_code)
                .await
                .unwrap();
            assert!(matches!(outcome, OtpOutcome::InvalidCode { .. }));
        }

        let outcome = service
            .verify(DEST, OtpPurpose::Login, SESSION, &second_code)
            .await
            .unwrap();
        assert_eq!(outcome, OtpOutcome::Verified);
    }

    #[tokio::test]
    async fn test_challenges_are_scoped_by_session_ref() {
        let (_, delivery, service) = setup();

        service.issue(DEST, OtpPurpose::Login, "device-a").await.unwrap();
        let code = delivery.last_code().unwrap();

        // The same code presented under another session binding fails.
        let outcome = service
            .verify(DEST, OtpPurpose::Login, "device-b", &code)
            .await
            .unwrap();
        assert_eq!(outcome, OtpOutcome::Expired);
    }

    #[tokio::test]
    async fn test_delivery_failure_keeps_challenge_valid() {
        let cache = Arc::new(InMemoryCache::new());
        let delivery = Arc::new(RecordingDelivery {
            reject: true,
            ..Default::default()
        });
        let service = service_with(cache, delivery.clone());

        service.issue(DEST, OtpPurpose::Login, SESSION).await.unwrap();
        let code = delivery.last_code().unwrap();

        let outcome = service
            .verify(DEST, OtpPurpose::Login, SESSION, &code)
            .await
            .unwrap();
        assert_eq!(outcome, OtpOutcome::Verified);
    }

    #[tokio::test]
    async fn test_resend_window_throttles_issue() {
        // Default table: 1 send per 60 seconds per (purpose, destination).
        let cache = Arc::new(InMemoryCache::new());
        let delivery = Arc::new(RecordingDelivery::default());
        let service = OtpService::new(
            cache.clone(),
            AbuseGuard::new(cache),
            delivery.clone(),
        );

        service.issue(DEST, OtpPurpose::Login, SESSION).await.unwrap();

        match service.issue(DEST, OtpPurpose::Login, SESSION).await {
            Err(AppError::RateLimited { .. }) => {}
            other => panic!("expected RateLimited, got {other:?}"),
        }

        // A different purpose keeps its own budget.
        assert!(service
            .issue(DEST, OtpPurpose::PasswordReset, SESSION)
            .await
            .is_ok());
    }
}
