//! Session and identity gate: decides who is using the application and how much to trust them.
use std::future::Future;

use anyhow::Result;

use repairdesk_auth::Identity;
use repairdesk_auth::Role;
use repairdesk_context::Context;
use repairdesk_events::emit::Events;
use repairdesk_identity_client::Client;
use repairdesk_identity_client::Credentials;
use repairdesk_identity_client::Profile;
use repairdesk_identity_client::Profiles;

use crate::audit;
use crate::audit::Audit;
use crate::errors::CallTimeout;
use crate::errors::MissingProfile;
use crate::telemetry::CALL_ERR;
use crate::telemetry::CHECK_COUNT;
use crate::telemetry::LOGIN_COUNT;
use crate::IdentityCache;
use crate::LoginOutcome;
use crate::Outcome;
use crate::OutcomeError;
use crate::OutcomeErrorKind;
use crate::SessionCheck;
use crate::SessionConf;

/// Session and identity gate.
///
/// Wraps the Identity Service and Profile Store to resolve the access state of the
/// principal using the application and keeps the [`IdentityCache`] in sync with them.
/// The gate is the only writer of the cache.
#[derive(Clone)]
pub struct SessionGate {
    pub(crate) cache: IdentityCache,
    pub(crate) conf: SessionConf,
    pub(crate) events: Events,
    pub(crate) identity: Client,
    pub(crate) profiles: Profiles,
}

impl SessionGate {
    pub fn new(
        identity: Client,
        profiles: Profiles,
        cache: IdentityCache,
        events: Events,
        conf: SessionConf,
    ) -> SessionGate {
        SessionGate {
            cache,
            conf,
            events,
            identity,
            profiles,
        }
    }

    /// Resolve the access state of the principal, on every protected navigation.
    ///
    /// Fails closed: any unexpected error clears the cached identity and
    /// reports the principal as unauthenticated.
    pub async fn check_session(&self, context: &Context) -> SessionCheck {
        let check = self.check_session_inner(context).await;
        let state = check.state.as_str();
        CHECK_COUNT.with_label_values(&[state]).inc();
        check
    }

    async fn check_session_inner(&self, context: &Context) -> SessionCheck {
        let login = &self.conf.routes.login;
        let session = match self.call("session", self.identity.session()).await {
            Err(error) => return self.fail_closed(context, error).await,
            Ok(None) => {
                slog::info!(context.logger, "No active session, principal must sign in");
                self.clear_cache(context);
                return SessionCheck::unauthenticated(login, None);
            }
            Ok(Some(session)) => session,
        };
        let context = context.derive().principal(&session.user_id).build();

        // Principals mid-way through a second factor challenge are not invalid.
        let levels = match self
            .call("assurance_level", self.identity.assurance_level())
            .await
        {
            Err(error) => return self.fail_closed(&context, error).await,
            Ok(levels) => levels,
        };
        if levels.needs_second_factor() {
            slog::debug!(context.logger, "Session requires a second factor");
            self.forget_other_principal(&context, &session.user_id);
            return SessionCheck::needs_second_factor(&self.conf.routes.challenge);
        }

        // Reuse the cached identity only if it belongs to the session principal.
        if let Some(cached) = self.cache.get() {
            if cached.id == session.user_id {
                return SessionCheck::authenticated();
            }
            slog::info!(
                context.logger, "Cached identity belongs to a different principal";
                "cached_principal" => cached.id,
            );
        }

        match self.fetch_identity(&context, &session.user_id).await {
            Ok(identity) => {
                self.set_cache(&context, identity);
                SessionCheck::authenticated()
            }
            Err(error) if error.is::<MissingProfile>() => {
                slog::error!(
                    context.logger, "Session is valid but the principal has no profile";
                    replisdk::utils::error::slog::ErrorAttributes::from(&error),
                );
                self.clear_cache(&context);
                let outcome = OutcomeError::classify(&error, OutcomeErrorKind::Integrity);
                let audit = Audit::default()
                    .principal(&session.user_id)
                    .reason(outcome.kind.as_str());
                self.audit(&context, audit::FORCED_LOGOUT, audit).await;
                SessionCheck::unauthenticated(login, Some(outcome))
            }
            Err(error) => self.fail_closed(&context, error).await,
        }
    }

    /// Return the cached identity of the signed in principal, if any.
    pub fn current_identity(&self) -> Option<Identity> {
        self.cache.get()
    }

    /// Sign in with email and password.
    ///
    /// The cached identity is populated only once the session assurance is sufficient.
    pub async fn login(&self, context: &Context, email: &str, password: &str) -> LoginOutcome {
        let outcome = self.login_inner(context, email, password).await;
        let state = outcome.state.as_str();
        LOGIN_COUNT.with_label_values(&[state]).inc();
        outcome
    }

    async fn login_inner(&self, context: &Context, email: &str, password: &str) -> LoginOutcome {
        if email.is_empty() || password.is_empty() {
            let error = OutcomeError::new(OutcomeErrorKind::Credentials)
                .with_message("email and password are required");
            return LoginOutcome::failed(error);
        }

        let credentials = Credentials {
            email: email.to_string(),
            password: password.to_string(),
        };
        let session = match self
            .call("sign_in", self.identity.sign_in(credentials))
            .await
        {
            Err(error) => return self.login_failed(context, email, error).await,
            Ok(session) => session,
        };
        let context = context.derive().principal(&session.user_id).build();

        let levels = match self
            .call("assurance_level", self.identity.assurance_level())
            .await
        {
            Err(error) => return self.login_failed(&context, email, error).await,
            Ok(levels) => levels,
        };
        if levels.needs_second_factor() {
            slog::info!(context.logger, "Login requires a second factor");
            self.forget_other_principal(&context, &session.user_id);
            let audit = Audit::default().email(email).principal(&session.user_id);
            self.audit(&context, audit::LOGIN_SECOND_FACTOR, audit)
                .await;
            return LoginOutcome::needs_second_factor(&self.conf.routes.challenge);
        }

        let identity = match self.fetch_identity(&context, &session.user_id).await {
            Err(error) => {
                // Do not leave a session behind for a principal we can't serve.
                if error.is::<MissingProfile>() {
                    self.sign_out_quietly(&context).await;
                }
                return self.login_failed(&context, email, error).await;
            }
            Ok(identity) => identity,
        };
        let landing = self.conf.routes.landing(identity.role).to_string();
        self.set_cache(&context, identity);
        slog::info!(context.logger, "Principal signed in"; "landing" => &landing);
        let audit = Audit::default().email(email).principal(&session.user_id);
        self.audit(&context, audit::LOGIN, audit).await;
        LoginOutcome::authenticated(landing)
    }

    /// Terminate the session and forget the cached identity.
    ///
    /// On failure the cached identity is left untouched so the operation can be retried.
    pub async fn logout(&self, context: &Context) -> Outcome {
        let principal = self.cache.get().map(|identity| identity.id);
        if let Err(error) = self.call("sign_out", self.identity.sign_out()).await {
            slog::warn!(
                context.logger, "Unable to terminate the session";
                replisdk::utils::error::slog::ErrorAttributes::from(&error),
            );
            return Outcome::failed(OutcomeError::classify(&error, OutcomeErrorKind::Service));
        }
        self.clear_cache(context);
        let mut audit = Audit::default();
        if let Some(principal) = principal {
            audit = audit.principal(principal);
        }
        self.audit(context, audit::LOGOUT, audit).await;
        Outcome::success().redirect(&self.conf.routes.root)
    }

    /// React to an error status returned by the data layer.
    ///
    /// Rejected credentials (401 and 403 statuses) force the principal to sign in again.
    /// Other statuses are left for the caller to handle and `None` is returned.
    pub async fn on_error(&self, context: &Context, status: u16) -> Option<SessionCheck> {
        if status != 401 && status != 403 {
            return None;
        }
        slog::info!(
            context.logger, "Data layer rejected the session credentials";
            "status" => status,
        );
        let principal = self.cache.get().map(|identity| identity.id);
        self.sign_out_quietly(context).await;
        self.clear_cache(context);
        let mut audit = Audit::default().reason(format!("status {}", status));
        if let Some(principal) = principal {
            audit = audit.principal(principal);
        }
        self.audit(context, audit::FORCED_LOGOUT, audit).await;
        Some(SessionCheck::unauthenticated(&self.conf.routes.login, None))
    }

    /// Role of the signed in principal, if any.
    pub fn permissions(&self) -> Option<Role> {
        self.cache.get().and_then(|identity| identity.role)
    }
}

impl SessionGate {
    /// Emit an audit event, logging (but otherwise ignoring) failures.
    pub(crate) async fn audit(&self, context: &Context, code: &str, audit: Audit) {
        let event = match audit.event(code) {
            Ok(event) => event,
            Err(error) => {
                slog::error!(
                    context.logger,
                    "Failed to JSON serialise session audit event payload";
                    "audit" => true,
                    "code" => code,
                    replisdk::utils::error::slog::ErrorAttributes::from(&error),
                );
                return;
            }
        };
        if let Err(error) = self.events.audit(context, event).await {
            slog::error!(
                context.logger,
                "Failed to emit session audit event";
                "audit" => true,
                "code" => code,
                replisdk::utils::error::slog::ErrorAttributes::from(&error),
            );
        }
    }

    /// Bound a remote call with the configured timeout and count errors.
    pub(crate) async fn call<T, F>(&self, operation: &'static str, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let result = match tokio::time::timeout(self.conf.timeout(), future).await {
            Err(_) => Err(anyhow::anyhow!(CallTimeout { operation })),
            Ok(result) => result,
        };
        if result.is_err() {
            CALL_ERR.with_label_values(&[operation]).inc();
        }
        result
    }

    pub(crate) fn clear_cache(&self, context: &Context) {
        if let Err(error) = self.cache.clear() {
            slog::warn!(
                context.logger, "Unable to persist cleared identity cache";
                replisdk::utils::error::slog::ErrorAttributes::from(&error),
            );
        }
    }

    /// Clear the cached identity if it belongs to a principal other than the session's.
    fn forget_other_principal(&self, context: &Context, principal: &str) {
        let cached = match self.cache.get() {
            Some(cached) if cached.id != principal => cached,
            _ => return,
        };
        slog::info!(
            context.logger, "Forgetting cached identity of a different principal";
            "cached_principal" => cached.id,
        );
        self.clear_cache(context);
    }

    /// Clear the cache and report the principal as unauthenticated after an unexpected error.
    async fn fail_closed(&self, context: &Context, error: anyhow::Error) -> SessionCheck {
        let outcome = OutcomeError::classify(&error, OutcomeErrorKind::Service);
        match outcome.kind {
            OutcomeErrorKind::Session => slog::info!(
                context.logger, "Session expired";
                replisdk::utils::error::slog::ErrorAttributes::from(&error),
            ),
            _ => slog::warn!(
                context.logger, "Session check failed, treating principal as unauthenticated";
                replisdk::utils::error::slog::ErrorAttributes::from(&error),
            ),
        };
        self.clear_cache(context);
        SessionCheck::unauthenticated(&self.conf.routes.login, Some(outcome))
    }

    /// Fetch the profile of a principal and convert it into an [`Identity`].
    async fn fetch_identity(&self, context: &Context, principal: &str) -> Result<Identity> {
        let profile = self
            .call("profile", self.profiles.profile(principal))
            .await?;
        match profile {
            None => anyhow::bail!(MissingProfile {
                principal: principal.to_string()
            }),
            Some(profile) => Ok(identity_from_profile(context, profile)),
        }
    }

    async fn login_failed(&self, context: &Context, email: &str, error: anyhow::Error) -> LoginOutcome {
        let outcome = OutcomeError::classify(&error, OutcomeErrorKind::Service);
        match outcome.kind {
            OutcomeErrorKind::Credentials => slog::info!(
                context.logger, "Login rejected by the identity service";
                "email" => email,
            ),
            OutcomeErrorKind::Integrity => slog::error!(
                context.logger, "Login accepted but the principal has no profile";
                "email" => email,
                replisdk::utils::error::slog::ErrorAttributes::from(&error),
            ),
            _ => slog::warn!(
                context.logger, "Login failed";
                "email" => email,
                replisdk::utils::error::slog::ErrorAttributes::from(&error),
            ),
        };
        let audit = Audit::default().email(email).reason(outcome.kind.as_str());
        self.audit(context, audit::LOGIN_FAILED, audit).await;
        LoginOutcome::failed(outcome)
    }

    pub(crate) fn set_cache(&self, context: &Context, identity: Identity) {
        if let Err(error) = self.cache.set(identity) {
            slog::warn!(
                context.logger, "Unable to persist cached identity";
                replisdk::utils::error::slog::ErrorAttributes::from(&error),
            );
        }
    }

    /// Terminate the session, logging (but otherwise ignoring) failures.
    pub(crate) async fn sign_out_quietly(&self, context: &Context) {
        if let Err(error) = self.call("sign_out", self.identity.sign_out()).await {
            slog::warn!(
                context.logger, "Unable to terminate the session";
                replisdk::utils::error::slog::ErrorAttributes::from(&error),
            );
        }
    }
}

/// Convert a profile record into the identity used by the application.
///
/// Unrecognised roles grant no access.
fn identity_from_profile(context: &Context, profile: Profile) -> Identity {
    let role = match profile.role.as_deref().map(str::parse::<Role>) {
        None => None,
        Some(Ok(role)) => Some(role),
        Some(Err(error)) => {
            slog::warn!(
                context.logger, "Ignoring unrecognised role in principal profile";
                "role" => %error.0,
            );
            None
        }
    };
    Identity {
        id: profile.id,
        email: profile.email,
        full_name: profile.full_name,
        role,
        created_at: profile.created_at,
    }
}
