use std::time::Duration;

use repairdesk_auth::Identity;
use repairdesk_auth::Role;
use repairdesk_context::Context;
use repairdesk_events::emit::Events;
use repairdesk_events::emit::EventsFixture;
use repairdesk_identity_client::fixture::IdentityFixture;
use repairdesk_identity_client::fixture::Operation;
use repairdesk_identity_client::fixture::TOTP_CODE;
use repairdesk_identity_client::AssuranceLevel;
use repairdesk_identity_client::Client;
use repairdesk_identity_client::FactorStatus;
use repairdesk_identity_client::Profiles;

use crate::codes;
use crate::IdentityCache;
use crate::OutcomeErrorKind;
use crate::SessionConf;
use crate::SessionGate;
use crate::SessionState;

const EMAIL: &str = "tech@shop.example";
const PASSWORD: &str = "correct horse";

struct Harness {
    events: EventsFixture,
    fixture: IdentityFixture,
    gate: SessionGate,
}

impl Harness {
    fn new() -> Harness {
        Harness::with_cache(IdentityCache::memory())
    }

    fn with_cache(cache: IdentityCache) -> Harness {
        let fixture = IdentityFixture::default();
        let events = EventsFixture::new();
        let conf = SessionConf {
            timeout_sec: 1,
            ..Default::default()
        };
        let gate = SessionGate::new(
            Client::from(fixture.clone()),
            Profiles::from(fixture.clone()),
            cache,
            Events::from(events.backend()),
            conf,
        );
        Harness {
            events,
            fixture,
            gate,
        }
    }

    /// Register an account with a matching profile.
    fn account(&self, email: &str, role: Option<&str>) -> String {
        let id = self.fixture.add_account(email, PASSWORD);
        self.fixture.add_profile(&id, email, role);
        id
    }

    async fn next_audit(&mut self) -> String {
        self.events
            .pop_audit_timeout(Duration::from_millis(100))
            .await
            .unwrap()
            .code
    }
}

fn cached(id: &str, role: Role) -> Identity {
    Identity {
        id: id.into(),
        email: format!("{}@shop.example", id),
        full_name: Some("Cached Principal".into()),
        role: Some(role),
        created_at: time::OffsetDateTime::UNIX_EPOCH,
    }
}

#[tokio::test]
async fn login_authenticated_lands_on_role_route() {
    let mut harness = Harness::new();
    let id = harness.account(EMAIL, Some("technician"));
    let context = Context::fixture();

    let outcome = harness.gate.login(&context, EMAIL, PASSWORD).await;
    assert!(outcome.success);
    assert_eq!(outcome.state, SessionState::Authenticated);
    assert_eq!(outcome.redirect_to.as_deref(), Some("/repair-orders"));
    assert_eq!(outcome.error, None);

    let identity = harness.gate.current_identity().unwrap();
    assert_eq!(identity.id, id);
    assert_eq!(identity.email, EMAIL);
    assert_eq!(harness.gate.permissions(), Some(Role::Technician));
    assert_eq!(harness.next_audit().await, codes::LOGIN);
}

#[tokio::test]
async fn login_needing_second_factor_does_not_cache_identity() {
    let mut harness = Harness::new();
    harness.account(EMAIL, Some("front_desk"));
    harness.fixture.add_factor(EMAIL, FactorStatus::Verified);
    let context = Context::fixture();

    let outcome = harness.gate.login(&context, EMAIL, PASSWORD).await;
    assert!(outcome.success);
    assert_eq!(outcome.state, SessionState::NeedsSecondFactor);
    assert_eq!(outcome.redirect_to.as_deref(), Some("/mfa-challenge"));
    assert_eq!(harness.gate.current_identity(), None);
    assert!(!harness.fixture.calls().contains(&Operation::Profile));
    assert_eq!(harness.next_audit().await, codes::LOGIN_SECOND_FACTOR);
}

#[tokio::test]
async fn login_rejected_leaves_cache_untouched() {
    let mut harness = Harness::new();
    harness.account(EMAIL, Some("technician"));
    let previous = cached("previous", Role::Partner);
    harness.gate.cache.set(previous.clone()).unwrap();
    let context = Context::fixture();

    let outcome = harness.gate.login(&context, EMAIL, "wrong").await;
    assert!(!outcome.success);
    assert_eq!(outcome.state, SessionState::Unauthenticated);
    let error = outcome.error.unwrap();
    assert_eq!(error.kind, OutcomeErrorKind::Credentials);
    assert_eq!(error.message, "invalid email or password");
    assert_eq!(harness.gate.current_identity(), Some(previous));
    assert_eq!(harness.next_audit().await, codes::LOGIN_FAILED);
}

#[tokio::test]
async fn login_unknown_account_looks_like_bad_password() {
    let harness = Harness::new();
    harness.account(EMAIL, Some("technician"));
    let context = Context::fixture();

    let unknown = harness
        .gate
        .login(&context, "nobody@shop.example", PASSWORD)
        .await;
    let wrong = harness.gate.login(&context, EMAIL, "wrong").await;
    assert_eq!(unknown.error, wrong.error);
}

#[tokio::test]
async fn login_requires_email_and_password() {
    let harness = Harness::new();
    let context = Context::fixture();
    let outcome = harness.gate.login(&context, "", PASSWORD).await;
    assert_eq!(outcome.error.unwrap().kind, OutcomeErrorKind::Credentials);
    assert!(harness.fixture.calls().is_empty());
}

#[tokio::test]
async fn login_transport_failure_is_not_a_credentials_error() {
    let harness = Harness::new();
    harness.account(EMAIL, Some("technician"));
    harness.fixture.fail(Operation::SignIn);
    let context = Context::fixture();

    let outcome = harness.gate.login(&context, EMAIL, PASSWORD).await;
    assert!(!outcome.success);
    assert_eq!(outcome.error.unwrap().kind, OutcomeErrorKind::Transport);
    assert_eq!(harness.gate.current_identity(), None);
}

#[tokio::test]
async fn login_timeout_fails_closed() {
    let harness = Harness::new();
    harness.account(EMAIL, Some("technician"));
    harness.fixture.stall(Operation::Profile);
    let context = Context::fixture();

    let outcome = harness.gate.login(&context, EMAIL, PASSWORD).await;
    assert!(!outcome.success);
    assert_eq!(outcome.state, SessionState::Unauthenticated);
    assert_eq!(outcome.error.unwrap().kind, OutcomeErrorKind::Transport);
    assert_eq!(harness.gate.current_identity(), None);
}

#[tokio::test]
async fn login_without_profile_is_an_integrity_error() {
    let harness = Harness::new();
    harness.fixture.add_account(EMAIL, PASSWORD);
    let context = Context::fixture();

    let outcome = harness.gate.login(&context, EMAIL, PASSWORD).await;
    assert!(!outcome.success);
    assert_eq!(outcome.error.unwrap().kind, OutcomeErrorKind::Integrity);
    assert_eq!(harness.gate.current_identity(), None);
    assert_eq!(harness.fixture.session_level(), None);
}

#[tokio::test]
async fn login_with_unrecognised_role_grants_no_role() {
    let harness = Harness::new();
    harness.account(EMAIL, Some("owner"));
    let context = Context::fixture();

    let outcome = harness.gate.login(&context, EMAIL, PASSWORD).await;
    assert_eq!(outcome.state, SessionState::Authenticated);
    assert_eq!(outcome.redirect_to.as_deref(), Some("/"));
    assert!(harness.gate.current_identity().is_some());
    assert_eq!(harness.gate.permissions(), None);
}

#[tokio::test]
async fn check_session_without_session_clears_cache() {
    let harness = Harness::new();
    harness.gate.cache.set(cached("stale", Role::Admin)).unwrap();
    let context = Context::fixture();

    let check = harness.gate.check_session(&context).await;
    assert!(!check.authenticated);
    assert!(check.force_logout);
    assert_eq!(check.state, SessionState::Unauthenticated);
    assert_eq!(check.redirect_to.as_deref(), Some("/login"));
    assert_eq!(check.error, None);
    assert_eq!(harness.gate.current_identity(), None);
}

#[tokio::test]
async fn check_session_mid_challenge_keeps_session_and_cache() {
    let harness = Harness::new();
    let id = harness.account(EMAIL, Some("technician"));
    harness.fixture.add_factor(EMAIL, FactorStatus::Verified);
    harness.fixture.set_session(EMAIL, AssuranceLevel::Single);
    let identity = cached(&id, Role::Technician);
    harness.gate.cache.set(identity.clone()).unwrap();
    let context = Context::fixture();

    let check = harness.gate.check_session(&context).await;
    assert!(!check.authenticated);
    assert!(!check.force_logout);
    assert_eq!(check.state, SessionState::NeedsSecondFactor);
    assert_eq!(check.redirect_to.as_deref(), Some("/mfa-challenge"));
    assert_eq!(harness.gate.current_identity(), Some(identity));
    assert!(!harness.fixture.calls().contains(&Operation::SignOut));
}

#[tokio::test]
async fn check_session_mid_challenge_forgets_other_principal() {
    let harness = Harness::new();
    harness.account(EMAIL, Some("technician"));
    harness.fixture.add_factor(EMAIL, FactorStatus::Verified);
    harness.fixture.set_session(EMAIL, AssuranceLevel::Single);
    harness.gate.cache.set(cached("admin", Role::Admin)).unwrap();
    let context = Context::fixture();

    let check = harness.gate.check_session(&context).await;
    assert_eq!(check.state, SessionState::NeedsSecondFactor);
    assert!(!check.force_logout);
    assert_eq!(harness.gate.current_identity(), None);
    assert_eq!(harness.gate.permissions(), None);
    assert!(!harness.fixture.calls().contains(&Operation::SignOut));
}

#[tokio::test]
async fn login_needing_second_factor_forgets_previous_principal() {
    let harness = Harness::new();
    harness.account("admin@shop.example", Some("admin"));
    harness.account(EMAIL, Some("technician"));
    harness.fixture.add_factor(EMAIL, FactorStatus::Verified);
    let context = Context::fixture();

    let outcome = harness
        .gate
        .login(&context, "admin@shop.example", PASSWORD)
        .await;
    assert_eq!(outcome.state, SessionState::Authenticated);
    assert_eq!(harness.gate.permissions(), Some(Role::Admin));

    let outcome = harness.gate.login(&context, EMAIL, PASSWORD).await;
    assert_eq!(outcome.state, SessionState::NeedsSecondFactor);
    assert_eq!(harness.gate.current_identity(), None);

    let check = harness.gate.check_session(&context).await;
    assert_eq!(check.state, SessionState::NeedsSecondFactor);
    assert_eq!(harness.gate.current_identity(), None);
    assert_eq!(harness.gate.permissions(), None);
}

#[tokio::test]
async fn check_session_rehydrates_empty_cache() {
    let harness = Harness::new();
    let id = harness.account(EMAIL, Some("partner"));
    harness.fixture.set_session(EMAIL, AssuranceLevel::Single);
    let context = Context::fixture();

    let check = harness.gate.check_session(&context).await;
    assert!(check.authenticated);
    assert_eq!(check.state, SessionState::Authenticated);
    let identity = harness.gate.current_identity().unwrap();
    assert_eq!(identity.id, id);
    assert_eq!(identity.role, Some(Role::Partner));
}

#[tokio::test]
async fn check_session_reuses_cache_of_same_principal() {
    let harness = Harness::new();
    let id = harness.account(EMAIL, Some("partner"));
    harness.fixture.set_session(EMAIL, AssuranceLevel::Single);
    harness.gate.cache.set(cached(&id, Role::Partner)).unwrap();
    let context = Context::fixture();

    let check = harness.gate.check_session(&context).await;
    assert!(check.authenticated);
    assert!(!harness.fixture.calls().contains(&Operation::Profile));
}

#[tokio::test]
async fn check_session_replaces_cache_of_other_principal() {
    let harness = Harness::new();
    let id = harness.account(EMAIL, Some("front_desk"));
    harness.fixture.set_session(EMAIL, AssuranceLevel::Single);
    harness.gate.cache.set(cached("other", Role::Admin)).unwrap();
    let context = Context::fixture();

    let check = harness.gate.check_session(&context).await;
    assert!(check.authenticated);
    let identity = harness.gate.current_identity().unwrap();
    assert_eq!(identity.id, id);
    assert_eq!(identity.role, Some(Role::FrontDesk));
}

#[tokio::test]
async fn check_session_with_deleted_profile_forces_logout() {
    let mut harness = Harness::new();
    let id = harness.account(EMAIL, Some("technician"));
    harness.fixture.set_session(EMAIL, AssuranceLevel::Single);
    harness.fixture.remove_profile(&id);
    let context = Context::fixture();

    let check = harness.gate.check_session(&context).await;
    assert!(!check.authenticated);
    assert!(check.force_logout);
    assert_eq!(check.state, SessionState::Unauthenticated);
    assert_eq!(check.error.unwrap().kind, OutcomeErrorKind::Integrity);
    assert_eq!(harness.gate.current_identity(), None);
    assert_eq!(harness.next_audit().await, codes::FORCED_LOGOUT);
}

#[tokio::test]
async fn check_session_fails_closed_on_service_errors() {
    let harness = Harness::new();
    let id = harness.account(EMAIL, Some("technician"));
    harness.fixture.set_session(EMAIL, AssuranceLevel::Single);
    harness.gate.cache.set(cached(&id, Role::Technician)).unwrap();
    harness.fixture.fail(Operation::AssuranceLevel);
    let context = Context::fixture();

    let check = harness.gate.check_session(&context).await;
    assert!(!check.authenticated);
    assert!(check.force_logout);
    assert_eq!(check.error.unwrap().kind, OutcomeErrorKind::Transport);
    assert_eq!(harness.gate.current_identity(), None);
}

#[tokio::test]
async fn logout_clears_cache_and_redirects_to_root() {
    let mut harness = Harness::new();
    harness.account(EMAIL, Some("technician"));
    let context = Context::fixture();
    harness.gate.login(&context, EMAIL, PASSWORD).await;
    assert_eq!(harness.next_audit().await, codes::LOGIN);

    let outcome = harness.gate.logout(&context).await;
    assert!(outcome.success);
    assert_eq!(outcome.redirect_to.as_deref(), Some("/"));
    assert_eq!(harness.gate.current_identity(), None);
    assert_eq!(harness.fixture.session_level(), None);
    assert_eq!(harness.next_audit().await, codes::LOGOUT);
}

#[tokio::test]
async fn logout_failure_keeps_cache() {
    let harness = Harness::new();
    harness.account(EMAIL, Some("technician"));
    let context = Context::fixture();
    harness.gate.login(&context, EMAIL, PASSWORD).await;
    harness.fixture.fail(Operation::SignOut);

    let outcome = harness.gate.logout(&context).await;
    assert!(!outcome.success);
    assert_eq!(outcome.error.unwrap().kind, OutcomeErrorKind::Transport);
    assert!(harness.gate.current_identity().is_some());
}

#[tokio::test]
async fn enroll_removes_abandoned_factors_first() {
    let mut harness = Harness::new();
    harness.account(EMAIL, Some("technician"));
    let context = Context::fixture();
    harness.gate.login(&context, EMAIL, PASSWORD).await;
    assert_eq!(harness.next_audit().await, codes::LOGIN);
    harness.fixture.add_factor(EMAIL, FactorStatus::Unverified);
    harness.fixture.add_factor(EMAIL, FactorStatus::Unverified);

    let enrollment = harness.gate.enroll_second_factor(&context).await.unwrap();
    let unverified: Vec<_> = harness
        .fixture
        .factors(EMAIL)
        .into_iter()
        .filter(|factor| factor.status == FactorStatus::Unverified)
        .collect();
    assert_eq!(unverified.len(), 1);
    assert_eq!(unverified[0].id, enrollment.factor_id);
    assert!(enrollment.provisioning.uri.starts_with("otpauth://"));
    assert!(harness.gate.current_identity().is_some());
    assert_eq!(harness.next_audit().await, codes::FACTOR_ENROLL);

    // Cleanup happens strictly before the new enrollment.
    let calls = harness.fixture.calls();
    let enroll = calls
        .iter()
        .position(|op| *op == Operation::EnrollFactor)
        .unwrap();
    let unenrolls: Vec<_> = calls
        .iter()
        .enumerate()
        .filter(|(_, op)| **op == Operation::UnenrollFactor)
        .map(|(index, _)| index)
        .collect();
    assert_eq!(unenrolls.len(), 2);
    assert!(unenrolls.iter().all(|index| *index < enroll));
}

#[tokio::test]
async fn enroll_keeps_verified_factors() {
    let harness = Harness::new();
    harness.account(EMAIL, Some("technician"));
    let verified = harness.fixture.add_factor(EMAIL, FactorStatus::Verified);
    harness.fixture.set_session(EMAIL, AssuranceLevel::Multi);
    let context = Context::fixture();

    harness.gate.enroll_second_factor(&context).await.unwrap();
    let factors = harness.fixture.factors(EMAIL);
    assert_eq!(factors.len(), 2);
    assert!(factors.iter().any(|factor| factor.id == verified));
}

#[tokio::test]
async fn enroll_skips_factors_removed_by_another_session() {
    let mut harness = Harness::new();
    harness.account(EMAIL, Some("technician"));
    let context = Context::fixture();
    harness.gate.login(&context, EMAIL, PASSWORD).await;
    assert_eq!(harness.next_audit().await, codes::LOGIN);
    harness.fixture.add_factor(EMAIL, FactorStatus::Unverified);
    harness.fixture.add_stale_factor();

    let enrollment = harness.gate.enroll_second_factor(&context).await.unwrap();
    let factors = harness.fixture.factors(EMAIL);
    assert_eq!(factors.len(), 1);
    assert_eq!(factors[0].id, enrollment.factor_id);
    assert_eq!(harness.next_audit().await, codes::FACTOR_ENROLL);
}

#[tokio::test]
async fn enroll_failure_is_reported() {
    let harness = Harness::new();
    harness.account(EMAIL, Some("technician"));
    let context = Context::fixture();
    harness.gate.login(&context, EMAIL, PASSWORD).await;
    harness.fixture.fail(Operation::EnrollFactor);

    let error = harness
        .gate
        .enroll_second_factor(&context)
        .await
        .unwrap_err();
    assert_eq!(error.kind, OutcomeErrorKind::Transport);
    assert!(harness.gate.current_identity().is_some());
}

#[tokio::test]
async fn verify_with_wrong_code_changes_nothing() {
    let harness = Harness::new();
    harness.account(EMAIL, Some("technician"));
    let context = Context::fixture();
    harness.gate.login(&context, EMAIL, PASSWORD).await;
    let enrollment = harness.gate.enroll_second_factor(&context).await.unwrap();

    let outcome = harness
        .gate
        .verify_second_factor(&context, &enrollment.factor_id, "000000")
        .await;
    assert!(!outcome.success);
    assert!(!outcome.force_logout);
    assert_eq!(outcome.error.unwrap().kind, OutcomeErrorKind::SecondFactor);
    assert_eq!(
        harness.fixture.factors(EMAIL)[0].status,
        FactorStatus::Unverified
    );
    assert_eq!(
        harness.fixture.session_level(),
        Some(AssuranceLevel::Single)
    );
    assert!(harness.gate.current_identity().is_some());
}

#[tokio::test]
async fn verify_uses_a_fresh_challenge_every_time() {
    let harness = Harness::new();
    harness.account(EMAIL, Some("technician"));
    let context = Context::fixture();
    harness.gate.login(&context, EMAIL, PASSWORD).await;
    let enrollment = harness.gate.enroll_second_factor(&context).await.unwrap();

    let failed = harness
        .gate
        .verify_second_factor(&context, &enrollment.factor_id, "000000")
        .await;
    assert!(!failed.success);
    let outcome = harness
        .gate
        .verify_second_factor(&context, &enrollment.factor_id, TOTP_CODE)
        .await;
    assert!(outcome.success);

    let calls: Vec<_> = harness
        .fixture
        .calls()
        .into_iter()
        .filter(|op| matches!(op, Operation::CreateChallenge | Operation::VerifyChallenge))
        .collect();
    assert_eq!(
        calls,
        vec![
            Operation::CreateChallenge,
            Operation::VerifyChallenge,
            Operation::CreateChallenge,
            Operation::VerifyChallenge,
        ]
    );
}

#[tokio::test]
async fn verify_success_forces_relogin() {
    let mut harness = Harness::new();
    harness.account(EMAIL, Some("technician"));
    let context = Context::fixture();
    harness.gate.login(&context, EMAIL, PASSWORD).await;
    assert_eq!(harness.next_audit().await, codes::LOGIN);
    let enrollment = harness.gate.enroll_second_factor(&context).await.unwrap();
    assert_eq!(harness.next_audit().await, codes::FACTOR_ENROLL);

    let outcome = harness
        .gate
        .verify_second_factor(&context, &enrollment.factor_id, TOTP_CODE)
        .await;
    assert!(outcome.success);
    assert!(outcome.force_logout);
    assert_eq!(outcome.redirect_to.as_deref(), Some("/login"));
    assert_eq!(harness.gate.current_identity(), None);
    assert_eq!(harness.fixture.session_level(), None);
    assert_eq!(
        harness.fixture.factors(EMAIL)[0].status,
        FactorStatus::Verified
    );
    assert_eq!(harness.next_audit().await, codes::FACTOR_VERIFY);

    // The upgraded requirement is derived by the identity service on the next login.
    let login = harness.gate.login(&context, EMAIL, PASSWORD).await;
    assert_eq!(login.state, SessionState::NeedsSecondFactor);
    assert_eq!(harness.gate.current_identity(), None);
}

#[tokio::test]
async fn verify_requires_a_code() {
    let harness = Harness::new();
    let context = Context::fixture();
    let outcome = harness
        .gate
        .verify_second_factor(&context, "factor", "  ")
        .await;
    assert_eq!(outcome.error.unwrap().kind, OutcomeErrorKind::SecondFactor);
    assert!(harness.fixture.calls().is_empty());
}

#[tokio::test]
async fn disable_factor() {
    let harness = Harness::new();
    harness.account(EMAIL, Some("technician"));
    let factor = harness.fixture.add_factor(EMAIL, FactorStatus::Verified);
    harness.fixture.set_session(EMAIL, AssuranceLevel::Multi);
    let context = Context::fixture();

    let outcome = harness.gate.disable_second_factor(&context, &factor).await;
    assert!(outcome.success);
    assert!(harness.fixture.factors(EMAIL).is_empty());

    let outcome = harness.gate.disable_second_factor(&context, &factor).await;
    assert!(!outcome.success);
    assert_eq!(outcome.error.unwrap().kind, OutcomeErrorKind::SecondFactor);
}

#[tokio::test]
async fn update_password() {
    let mut harness = Harness::new();
    harness.account(EMAIL, Some("technician"));
    let context = Context::fixture();
    harness.gate.login(&context, EMAIL, PASSWORD).await;
    assert_eq!(harness.next_audit().await, codes::LOGIN);

    let outcome = harness.gate.update_password(&context, "").await;
    assert!(!outcome.success);

    let outcome = harness.gate.update_password(&context, "battery staple").await;
    assert!(outcome.success);
    assert_eq!(
        harness.fixture.password(EMAIL).as_deref(),
        Some("battery staple")
    );
    assert_eq!(harness.next_audit().await, codes::PASSWORD_UPDATE);
}

#[tokio::test]
async fn on_error_forces_logout_for_rejected_credentials() {
    let harness = Harness::new();
    harness.account(EMAIL, Some("technician"));
    let context = Context::fixture();
    harness.gate.login(&context, EMAIL, PASSWORD).await;

    assert_eq!(harness.gate.on_error(&context, 500).await, None);
    assert!(harness.gate.current_identity().is_some());

    let check = harness.gate.on_error(&context, 401).await.unwrap();
    assert!(check.force_logout);
    assert_eq!(check.redirect_to.as_deref(), Some("/login"));
    assert_eq!(harness.gate.current_identity(), None);
    assert_eq!(harness.fixture.session_level(), None);
}

#[tokio::test]
async fn persisted_cache_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("identity.json");
    let harness = Harness::with_cache(IdentityCache::file(&path).unwrap());
    let id = harness.account(EMAIL, Some("front_desk"));
    let context = Context::fixture();
    harness.gate.login(&context, EMAIL, PASSWORD).await;

    let restarted = IdentityCache::file(&path).unwrap();
    let identity = restarted.get().unwrap();
    assert_eq!(identity.id, id);
    assert_eq!(identity.role, Some(Role::FrontDesk));
}
