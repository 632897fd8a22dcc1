//! Second factor and credential management for the signed in principal.
use anyhow::Result;

use repairdesk_context::Context;
use repairdesk_identity_client::errors::FactorNotFound;
use repairdesk_identity_client::CredentialsUpdate;
use repairdesk_identity_client::FactorStatus;
use repairdesk_identity_client::FactorType;

use crate::audit;
use crate::audit::Audit;
use crate::telemetry::outcome_label;
use crate::telemetry::FACTOR_COUNT;
use crate::Enrollment;
use crate::Outcome;
use crate::OutcomeError;
use crate::OutcomeErrorKind;
use crate::SessionGate;

impl SessionGate {
    /// Remove a second factor of the signed in principal.
    ///
    /// Removing a factor that does not exist is reported as an error.
    pub async fn disable_second_factor(&self, context: &Context, factor_id: &str) -> Outcome {
        let result = self
            .call("unenroll_factor", self.identity.unenroll_factor(factor_id))
            .await;
        FACTOR_COUNT
            .with_label_values(&["disable", outcome_label(result.is_ok())])
            .inc();
        if let Err(error) = result {
            slog::info!(
                context.logger, "Unable to remove second factor";
                "factor_id" => factor_id,
                replisdk::utils::error::slog::ErrorAttributes::from(&error),
            );
            let outcome = OutcomeError::classify(&error, OutcomeErrorKind::SecondFactor);
            return Outcome::failed(outcome);
        }
        let audit = self.principal_audit().factor(factor_id);
        self.audit(context, audit::FACTOR_DISABLE, audit).await;
        Outcome::success()
    }

    /// Start enrolling a new time-based one-time code factor.
    ///
    /// Unverified factors left over by abandoned enrollments are removed first.
    /// The cached identity is not affected.
    pub async fn enroll_second_factor(&self, context: &Context) -> Result<Enrollment, OutcomeError> {
        let result = self.enroll_second_factor_inner(context).await;
        FACTOR_COUNT
            .with_label_values(&["enroll", outcome_label(result.is_ok())])
            .inc();
        let enrollment = match result {
            Ok(enrollment) => enrollment,
            Err(error) => {
                slog::warn!(
                    context.logger, "Unable to enroll a new second factor";
                    replisdk::utils::error::slog::ErrorAttributes::from(&error),
                );
                let mut outcome = OutcomeError::classify(&error, OutcomeErrorKind::Enrollment);
                if outcome.kind == OutcomeErrorKind::SecondFactor {
                    outcome = OutcomeError {
                        detail: outcome.detail,
                        ..OutcomeError::new(OutcomeErrorKind::Enrollment)
                    };
                }
                return Err(outcome);
            }
        };
        let audit = self.principal_audit().factor(&enrollment.factor_id);
        self.audit(context, audit::FACTOR_ENROLL, audit).await;
        Ok(enrollment)
    }

    async fn enroll_second_factor_inner(&self, context: &Context) -> Result<Enrollment> {
        let factors = self
            .call("list_factors", self.identity.list_factors())
            .await?;
        let abandoned = factors
            .into_iter()
            .filter(|factor| factor.status == FactorStatus::Unverified);
        for factor in abandoned {
            slog::debug!(
                context.logger, "Removing abandoned second factor enrollment";
                "factor_id" => &factor.id,
            );
            let result = self
                .call("unenroll_factor", self.identity.unenroll_factor(&factor.id))
                .await;
            match result {
                Err(error) if error.is::<FactorNotFound>() => slog::debug!(
                    context.logger, "Abandoned second factor was already removed";
                    "factor_id" => &factor.id,
                ),
                result => result?,
            }
        }

        let factor = self
            .call("enroll_factor", self.identity.enroll_factor(FactorType::Totp))
            .await?;
        Ok(Enrollment {
            factor_id: factor.id,
            provisioning: factor.provisioning,
        })
    }

    /// Replace the password of the signed in principal.
    pub async fn update_password(&self, context: &Context, password: &str) -> Outcome {
        if password.is_empty() {
            let error = OutcomeError::new(OutcomeErrorKind::Credentials)
                .with_message("the new password can't be empty");
            return Outcome::failed(error);
        }
        let update = CredentialsUpdate {
            password: Some(password.to_string()),
        };
        let result = self
            .call("update_credentials", self.identity.update_credentials(update))
            .await;
        if let Err(error) = result {
            slog::warn!(
                context.logger, "Unable to update password";
                replisdk::utils::error::slog::ErrorAttributes::from(&error),
            );
            let outcome = OutcomeError::classify(&error, OutcomeErrorKind::Service);
            return Outcome::failed(outcome);
        }
        let audit = self.principal_audit();
        self.audit(context, audit::PASSWORD_UPDATE, audit).await;
        Outcome::success()
    }

    /// Answer a fresh challenge for a second factor with a one-time code.
    ///
    /// A new challenge is requested on every call and the code is checked against it.
    /// On success the session is terminated and the principal is sent back to login:
    /// the upgraded assurance level is then derived by the Identity Service again.
    /// On failure nothing changes and the principal can try another code.
    pub async fn verify_second_factor(
        &self,
        context: &Context,
        factor_id: &str,
        code: &str,
    ) -> Outcome {
        if code.trim().is_empty() {
            let error = OutcomeError::new(OutcomeErrorKind::SecondFactor)
                .with_message("a one-time code is required");
            return Outcome::failed(error);
        }

        let result = self.verify_second_factor_inner(factor_id, code.trim()).await;
        FACTOR_COUNT
            .with_label_values(&["verify", outcome_label(result.is_ok())])
            .inc();
        if let Err(error) = result {
            slog::info!(
                context.logger, "Second factor verification failed";
                "factor_id" => factor_id,
                replisdk::utils::error::slog::ErrorAttributes::from(&error),
            );
            let outcome = OutcomeError::classify(&error, OutcomeErrorKind::SecondFactor);
            return Outcome::failed(outcome);
        }

        let audit = self.principal_audit().factor(factor_id);
        self.audit(context, audit::FACTOR_VERIFY, audit).await;
        self.sign_out_quietly(context).await;
        self.clear_cache(context);
        Outcome::success()
            .redirect(&self.conf.routes.login)
            .force_logout()
    }

    async fn verify_second_factor_inner(&self, factor_id: &str, code: &str) -> Result<()> {
        let challenge = self
            .call("create_challenge", self.identity.create_challenge(factor_id))
            .await?;
        self.call(
            "verify_challenge",
            self.identity
                .verify_challenge(factor_id, &challenge.id, code),
        )
        .await
    }

    /// Audit payload for the cached principal, if any.
    fn principal_audit(&self) -> Audit {
        match self.cache.get() {
            None => Audit::default(),
            Some(identity) => Audit::default().principal(identity.id).email(identity.email),
        }
    }
}
