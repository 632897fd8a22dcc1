//! In-memory Identity Service and Profile Store for unit tests.
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use anyhow::Result;
use time::OffsetDateTime;

use crate::errors::FactorNotFound;
use crate::errors::InvalidCode;
use crate::errors::InvalidCredentials;
use crate::errors::NoSession;
use crate::errors::ServiceUnreachable;
use crate::AssuranceLevel;
use crate::AssuranceLevels;
use crate::Challenge;
use crate::Credentials;
use crate::CredentialsUpdate;
use crate::Factor;
use crate::FactorStatus;
use crate::FactorType;
use crate::IIdentity;
use crate::IProfiles;
use crate::NewFactor;
use crate::Profile;
use crate::Provisioning;
use crate::Session;

/// The only one-time code accepted by the fixture.
pub const TOTP_CODE: &str = "424242";

/// Operations performed against the fixture, recorded in call order.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Operation {
    AssuranceLevel,
    CreateChallenge,
    EnrollFactor,
    ListFactors,
    Profile,
    Session,
    SignIn,
    SignOut,
    UnenrollFactor,
    UpdateCredentials,
    VerifyChallenge,
}

/// In-memory implementation of the Identity Service and Profile Store for unit tests.
///
/// Clones share the same state so tests can inspect it after handing a copy to a client.
#[derive(Clone, Default)]
pub struct IdentityFixture {
    state: Arc<Mutex<FixtureState>>,
}

impl IdentityFixture {
    /// Register an account that can sign in with the given credentials.
    ///
    /// Returns the ID of the new principal.
    pub fn add_account<S1, S2>(&self, email: S1, password: S2) -> String
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        let email = email.into();
        let id = uuid::Uuid::new_v4().to_string();
        let account = Account {
            factors: Vec::new(),
            id: id.clone(),
            password: password.into(),
        };
        self.access().accounts.insert(email, account);
        id
    }

    /// Register a second factor with the given status for an account.
    pub fn add_factor(&self, email: &str, status: FactorStatus) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let factor = Factor {
            id: id.clone(),
            kind: FactorType::Totp,
            status,
        };
        self.access()
            .accounts
            .get_mut(email)
            .expect("IdentityFixture account to add factor to must exist")
            .factors
            .push(factor);
        id
    }

    /// Report an unverified factor in listings that was already removed by another session.
    pub fn add_stale_factor(&self) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let factor = Factor {
            id: id.clone(),
            kind: FactorType::Totp,
            status: FactorStatus::Unverified,
        };
        self.access().stale_factors.push(factor);
        id
    }

    /// Store a profile record for a principal.
    pub fn add_profile<S1, S2>(&self, id: S1, email: S2, role: Option<&str>)
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        let id = id.into();
        let profile = Profile {
            id: id.clone(),
            email: email.into(),
            full_name: None,
            role: role.map(String::from),
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        self.access().profiles.insert(id, profile);
    }

    /// List operations performed against the fixture so far.
    pub fn calls(&self) -> Vec<Operation> {
        self.access().calls.clone()
    }

    /// Make an operation fail as if the service was unreachable.
    pub fn fail(&self, op: Operation) {
        self.access().failures.insert(op);
    }

    /// List the second factors of an account.
    pub fn factors(&self, email: &str) -> Vec<Factor> {
        self.access()
            .accounts
            .get(email)
            .map(|account| account.factors.clone())
            .unwrap_or_default()
    }

    /// Check the password currently set for an account.
    pub fn password(&self, email: &str) -> Option<String> {
        self.access()
            .accounts
            .get(email)
            .map(|account| account.password.clone())
    }

    /// Undo the effects of [`IdentityFixture::fail`] and [`IdentityFixture::stall`].
    pub fn recover(&self, op: Operation) {
        let mut state = self.access();
        state.failures.remove(&op);
        state.stalls.remove(&op);
    }

    /// Remove the profile record of a principal.
    pub fn remove_profile(&self, id: &str) {
        self.access().profiles.remove(id);
    }

    /// Assurance level of the established session, if any.
    pub fn session_level(&self) -> Option<AssuranceLevel> {
        self.access().session.as_ref().map(|session| session.level)
    }

    /// Establish a session for an account directly, as if restored from storage.
    pub fn set_session(&self, email: &str, level: AssuranceLevel) {
        let mut state = self.access();
        let user_id = state
            .accounts
            .get(email)
            .expect("IdentityFixture account to start a session for must exist")
            .id
            .clone();
        state.session = Some(FixtureSession {
            email: email.to_string(),
            level,
            user_id,
        });
    }

    /// Make an operation never complete.
    pub fn stall(&self, op: Operation) {
        self.access().stalls.insert(op);
    }
}

impl IdentityFixture {
    /// Lock and access the shared inner state.
    fn access(&self) -> MutexGuard<FixtureState> {
        self.state
            .lock()
            .expect("IdentityFixture::state lock poisoned")
    }

    /// Record an operation and apply any failure injection configured for it.
    async fn enter(&self, op: Operation) -> Result<()> {
        let stall = {
            let mut state = self.access();
            state.calls.push(op);
            if state.failures.contains(&op) {
                let service = match op {
                    Operation::Profile => ServiceUnreachable::profiles(),
                    _ => ServiceUnreachable::identity(),
                };
                anyhow::bail!(service);
            }
            state.stalls.contains(&op)
        };
        if stall {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl IIdentity for IdentityFixture {
    async fn assurance_level(&self) -> Result<AssuranceLevels> {
        self.enter(Operation::AssuranceLevel).await?;
        let mut state = self.access();
        let session = state.session()?.clone();
        let verified = state
            .account(&session.email)?
            .factors
            .iter()
            .any(|factor| factor.status == FactorStatus::Verified);
        let next = match verified {
            true => AssuranceLevel::Multi,
            false => AssuranceLevel::Single,
        };
        Ok(AssuranceLevels {
            current: session.level,
            next,
        })
    }

    async fn create_challenge(&self, factor_id: &str) -> Result<Challenge> {
        self.enter(Operation::CreateChallenge).await?;
        let mut state = self.access();
        let email = state.session()?.email.clone();
        let exists = state
            .account(&email)?
            .factors
            .iter()
            .any(|factor| factor.id == factor_id);
        if !exists {
            anyhow::bail!(FactorNotFound {
                id: factor_id.to_string()
            });
        }
        let id = uuid::Uuid::new_v4().to_string();
        state.challenges.insert(id.clone(), factor_id.to_string());
        Ok(Challenge {
            id,
            expires_at: None,
        })
    }

    async fn enroll_factor(&self, kind: FactorType) -> Result<NewFactor> {
        self.enter(Operation::EnrollFactor).await?;
        let mut state = self.access();
        let email = state.session()?.email.clone();
        let id = uuid::Uuid::new_v4().to_string();
        let factor = Factor {
            id: id.clone(),
            kind,
            status: FactorStatus::Unverified,
        };
        state.account(&email)?.factors.push(factor);
        let secret = "JBSWY3DPEHPK3PXP".to_string();
        let provisioning = Provisioning {
            qr_code: format!("data:image/svg+xml;utf-8,<svg>{}</svg>", id),
            uri: format!("otpauth://totp/RepairDesk:{}?secret={}", email, secret),
            secret,
        };
        Ok(NewFactor { id, provisioning })
    }

    async fn list_factors(&self) -> Result<Vec<Factor>> {
        self.enter(Operation::ListFactors).await?;
        let mut state = self.access();
        let email = state.session()?.email.clone();
        let mut factors = state.account(&email)?.factors.clone();
        factors.extend(state.stale_factors.iter().cloned());
        Ok(factors)
    }

    async fn session(&self) -> Result<Option<Session>> {
        self.enter(Operation::Session).await?;
        let session = self.access().session.as_ref().map(|session| Session {
            email: Some(session.email.clone()),
            expires_at: None,
            user_id: session.user_id.clone(),
        });
        Ok(session)
    }

    async fn sign_in(&self, credentials: Credentials) -> Result<Session> {
        self.enter(Operation::SignIn).await?;
        let mut state = self.access();
        let user_id = match state.accounts.get(&credentials.email) {
            Some(account) if account.password == credentials.password => account.id.clone(),
            _ => anyhow::bail!(InvalidCredentials),
        };
        state.session = Some(FixtureSession {
            email: credentials.email.clone(),
            level: AssuranceLevel::Single,
            user_id: user_id.clone(),
        });
        Ok(Session {
            email: Some(credentials.email),
            expires_at: None,
            user_id,
        })
    }

    async fn sign_out(&self) -> Result<()> {
        self.enter(Operation::SignOut).await?;
        self.access().session = None;
        Ok(())
    }

    async fn unenroll_factor(&self, factor_id: &str) -> Result<()> {
        self.enter(Operation::UnenrollFactor).await?;
        let mut state = self.access();
        let email = state.session()?.email.clone();
        let factors = &mut state.account(&email)?.factors;
        let index = factors.iter().position(|factor| factor.id == factor_id);
        match index {
            Some(index) => {
                factors.remove(index);
                Ok(())
            }
            None => anyhow::bail!(FactorNotFound {
                id: factor_id.to_string()
            }),
        }
    }

    async fn update_credentials(&self, update: CredentialsUpdate) -> Result<()> {
        self.enter(Operation::UpdateCredentials).await?;
        let mut state = self.access();
        let email = state.session()?.email.clone();
        if let Some(password) = update.password {
            state.account(&email)?.password = password;
        }
        Ok(())
    }

    async fn verify_challenge(
        &self,
        factor_id: &str,
        challenge_id: &str,
        code: &str,
    ) -> Result<()> {
        self.enter(Operation::VerifyChallenge).await?;
        let mut state = self.access();
        let email = state.session()?.email.clone();

        // Challenges are consumed by verification attempts, successful or not.
        let challenge = state.challenges.remove(challenge_id);
        let invalid = InvalidCode {
            challenge_id: challenge_id.to_string(),
        };
        if challenge.as_deref() != Some(factor_id) || code != TOTP_CODE {
            anyhow::bail!(invalid);
        }

        let factor = state
            .account(&email)?
            .factors
            .iter_mut()
            .find(|factor| factor.id == factor_id);
        match factor {
            Some(factor) => factor.status = FactorStatus::Verified,
            None => anyhow::bail!(invalid),
        }
        if let Some(session) = state.session.as_mut() {
            session.level = AssuranceLevel::Multi;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl IProfiles for IdentityFixture {
    async fn profile(&self, principal_id: &str) -> Result<Option<Profile>> {
        self.enter(Operation::Profile).await?;
        let profile = self.access().profiles.get(principal_id).cloned();
        Ok(profile)
    }
}

/// Registered account details.
struct Account {
    factors: Vec<Factor>,
    id: String,
    password: String,
}

/// Container for the shared state.
#[derive(Default)]
struct FixtureState {
    accounts: HashMap<String, Account>,
    calls: Vec<Operation>,
    challenges: HashMap<String, String>,
    failures: HashSet<Operation>,
    profiles: HashMap<String, Profile>,
    session: Option<FixtureSession>,
    stale_factors: Vec<Factor>,
    stalls: HashSet<Operation>,
}

impl FixtureState {
    fn account(&mut self, email: &str) -> Result<&mut Account> {
        match self.accounts.get_mut(email) {
            Some(account) => Ok(account),
            None => anyhow::bail!(NoSession),
        }
    }

    fn session(&self) -> Result<&FixtureSession> {
        match self.session.as_ref() {
            Some(session) => Ok(session),
            None => anyhow::bail!(NoSession),
        }
    }
}

/// Session established with the fixture.
#[derive(Clone)]
struct FixtureSession {
    email: String,
    level: AssuranceLevel,
    user_id: String,
}

#[cfg(test)]
mod tests {
    use super::IdentityFixture;
    use super::Operation;
    use super::TOTP_CODE;
    use crate::errors::InvalidCode;
    use crate::errors::InvalidCredentials;
    use crate::errors::ServiceUnreachable;
    use crate::AssuranceLevel;
    use crate::Client;
    use crate::Credentials;
    use crate::FactorStatus;
    use crate::FactorType;

    fn credentials(password: &str) -> Credentials {
        Credentials {
            email: "tech@shop.example".into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn sign_in_checks_password() {
        let fixture = IdentityFixture::default();
        fixture.add_account("tech@shop.example", "secret");
        let client = Client::from(fixture.clone());

        let error = client.sign_in(credentials("wrong")).await.unwrap_err();
        assert!(error.is::<InvalidCredentials>());
        assert!(client.session().await.unwrap().is_none());

        client.sign_in(credentials("secret")).await.unwrap();
        assert_eq!(fixture.session_level(), Some(AssuranceLevel::Single));
    }

    #[tokio::test]
    async fn challenges_are_single_use() {
        let fixture = IdentityFixture::default();
        fixture.add_account("tech@shop.example", "secret");
        let client = Client::from(fixture.clone());
        client.sign_in(credentials("secret")).await.unwrap();
        let factor = client.enroll_factor(FactorType::Totp).await.unwrap();

        let challenge = client.create_challenge(&factor.id).await.unwrap();
        let error = client
            .verify_challenge(&factor.id, &challenge.id, "000000")
            .await
            .unwrap_err();
        assert!(error.is::<InvalidCode>());

        // The challenge was consumed by the failed attempt.
        let error = client
            .verify_challenge(&factor.id, &challenge.id, TOTP_CODE)
            .await
            .unwrap_err();
        assert!(error.is::<InvalidCode>());
        assert_eq!(
            fixture.factors("tech@shop.example")[0].status,
            FactorStatus::Unverified
        );
    }

    #[tokio::test]
    async fn injected_failures() {
        let fixture = IdentityFixture::default();
        fixture.fail(Operation::Session);
        let client = Client::from(fixture.clone());
        let error = client.session().await.unwrap_err();
        assert!(error.is::<ServiceUnreachable>());

        fixture.recover(Operation::Session);
        assert!(client.session().await.unwrap().is_none());
        assert_eq!(fixture.calls(), vec![Operation::Session, Operation::Session]);
    }
}
