//! Async client library to interact with the Identity Service and the Profile Store.
//!
//! The Identity Service issues sessions, tracks their assurance level and manages
//! second factors. The Profile Store holds the application specific record
//! (role, display name) of each principal.
//!
//! Both are remote services: this crate only defines the interfaces and models.
//! Transport specific implementations live in their own crates.
use std::sync::Arc;

use anyhow::Result;

pub mod errors;
mod models;

#[cfg(any(test, feature = "test-fixture"))]
pub mod fixture;

pub use self::models::AssuranceLevel;
pub use self::models::AssuranceLevels;
pub use self::models::Challenge;
pub use self::models::Credentials;
pub use self::models::CredentialsUpdate;
pub use self::models::Factor;
pub use self::models::FactorStatus;
pub use self::models::FactorType;
pub use self::models::NewFactor;
pub use self::models::Profile;
pub use self::models::Provisioning;
pub use self::models::Session;

/// Async API client to the Identity Service.
#[derive(Clone)]
pub struct Client {
    backend: Arc<dyn IIdentity>,
}

impl Client {
    /// Query the current and required assurance levels of the established session.
    pub async fn assurance_level(&self) -> Result<AssuranceLevels> {
        self.backend.assurance_level().await
    }

    /// Request a new challenge for a second factor.
    pub async fn create_challenge(&self, factor_id: &str) -> Result<Challenge> {
        self.backend.create_challenge(factor_id).await
    }

    /// Start enrolling a new second factor of the given type.
    pub async fn enroll_factor(&self, kind: FactorType) -> Result<NewFactor> {
        self.backend.enroll_factor(kind).await
    }

    /// List second factors registered for the signed in principal.
    pub async fn list_factors(&self) -> Result<Vec<Factor>> {
        self.backend.list_factors().await
    }

    /// Return the established session, if any.
    pub async fn session(&self) -> Result<Option<Session>> {
        self.backend.session().await
    }

    /// Sign in with email and password.
    pub async fn sign_in(&self, credentials: Credentials) -> Result<Session> {
        self.backend.sign_in(credentials).await
    }

    /// Terminate the established session.
    pub async fn sign_out(&self) -> Result<()> {
        self.backend.sign_out().await
    }

    /// Remove a second factor.
    pub async fn unenroll_factor(&self, factor_id: &str) -> Result<()> {
        self.backend.unenroll_factor(factor_id).await
    }

    /// Update the credentials of the signed in principal.
    pub async fn update_credentials(&self, update: CredentialsUpdate) -> Result<()> {
        self.backend.update_credentials(update).await
    }

    /// Answer a challenge with a one-time code.
    pub async fn verify_challenge(
        &self,
        factor_id: &str,
        challenge_id: &str,
        code: &str,
    ) -> Result<()> {
        self.backend
            .verify_challenge(factor_id, challenge_id, code)
            .await
    }
}

impl<I> From<I> for Client
where
    I: IIdentity + 'static,
{
    fn from(value: I) -> Self {
        let backend = Arc::new(value);
        Client { backend }
    }
}

/// Interface to Identity Service clients.
///
/// Enables implementation of Identity Service clients across different transport protocols.
#[async_trait::async_trait]
pub trait IIdentity: Send + Sync {
    /// Query the current and required assurance levels of the established session.
    async fn assurance_level(&self) -> Result<AssuranceLevels>;

    /// Request a new challenge for a second factor.
    async fn create_challenge(&self, factor_id: &str) -> Result<Challenge>;

    /// Start enrolling a new second factor of the given type.
    async fn enroll_factor(&self, kind: FactorType) -> Result<NewFactor>;

    /// List second factors registered for the signed in principal.
    async fn list_factors(&self) -> Result<Vec<Factor>>;

    /// Return the established session, if any.
    async fn session(&self) -> Result<Option<Session>>;

    /// Sign in with email and password.
    ///
    /// Rejected credentials are reported with an [`errors::InvalidCredentials`] error.
    async fn sign_in(&self, credentials: Credentials) -> Result<Session>;

    /// Terminate the established session.
    async fn sign_out(&self) -> Result<()>;

    /// Remove a second factor.
    ///
    /// Unknown factors are reported with an [`errors::FactorNotFound`] error.
    async fn unenroll_factor(&self, factor_id: &str) -> Result<()>;

    /// Update the credentials of the signed in principal.
    async fn update_credentials(&self, update: CredentialsUpdate) -> Result<()>;

    /// Answer a challenge with a one-time code.
    ///
    /// Wrong codes are reported with an [`errors::InvalidCode`] error.
    async fn verify_challenge(&self, factor_id: &str, challenge_id: &str, code: &str)
        -> Result<()>;
}

/// Async API client to the Profile Store.
#[derive(Clone)]
pub struct Profiles {
    backend: Arc<dyn IProfiles>,
}

impl Profiles {
    /// Lookup the profile of a principal by ID.
    pub async fn profile(&self, principal_id: &str) -> Result<Option<Profile>> {
        self.backend.profile(principal_id).await
    }
}

impl<P> From<P> for Profiles
where
    P: IProfiles + 'static,
{
    fn from(value: P) -> Self {
        let backend = Arc::new(value);
        Profiles { backend }
    }
}

/// Interface to Profile Store clients.
#[async_trait::async_trait]
pub trait IProfiles: Send + Sync {
    /// Lookup the profile of a principal by ID, returning `None` if it does not exist.
    async fn profile(&self, principal_id: &str) -> Result<Option<Profile>>;
}
