//! Structured results returned by the session gate to its consumers.
//!
//! Errors from the Identity Service never reach consumers as they are:
//! they are classified into an [`OutcomeError`] with a generic message.
use serde::Serialize;

use repairdesk_identity_client::errors::FactorNotFound;
use repairdesk_identity_client::errors::InvalidCode;
use repairdesk_identity_client::errors::InvalidCredentials;
use repairdesk_identity_client::errors::NoSession;
use repairdesk_identity_client::errors::ServiceUnreachable;
use repairdesk_identity_client::Provisioning;

use crate::errors::CallTimeout;
use crate::errors::MissingProfile;

/// Access state of the principal using the application.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// The principal is fully trusted.
    Authenticated,

    /// The principal provided a password but still has to answer a second factor challenge.
    NeedsSecondFactor,

    /// There is no usable session.
    Unauthenticated,
}

impl SessionState {
    /// Stable label for metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Authenticated => "authenticated",
            SessionState::NeedsSecondFactor => "needs_second_factor",
            SessionState::Unauthenticated => "unauthenticated",
        }
    }
}

/// Result of a session check, evaluated on every protected navigation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct SessionCheck {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OutcomeError>,
    pub force_logout: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
    pub state: SessionState,
}

impl SessionCheck {
    pub fn authenticated() -> SessionCheck {
        SessionCheck {
            authenticated: true,
            error: None,
            force_logout: false,
            redirect_to: None,
            state: SessionState::Authenticated,
        }
    }

    pub fn needs_second_factor<S: Into<String>>(challenge: S) -> SessionCheck {
        SessionCheck {
            authenticated: false,
            error: None,
            force_logout: false,
            redirect_to: Some(challenge.into()),
            state: SessionState::NeedsSecondFactor,
        }
    }

    /// The principal must sign in again and any session leftovers should be cleaned up.
    pub fn unauthenticated<S: Into<String>>(login: S, error: Option<OutcomeError>) -> SessionCheck {
        SessionCheck {
            authenticated: false,
            error,
            force_logout: true,
            redirect_to: Some(login.into()),
            state: SessionState::Unauthenticated,
        }
    }
}

/// Result of a login attempt.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct LoginOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OutcomeError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
    pub state: SessionState,
    pub success: bool,
}

impl LoginOutcome {
    pub fn authenticated<S: Into<String>>(landing: S) -> LoginOutcome {
        LoginOutcome {
            error: None,
            redirect_to: Some(landing.into()),
            state: SessionState::Authenticated,
            success: true,
        }
    }

    pub fn failed(error: OutcomeError) -> LoginOutcome {
        LoginOutcome {
            error: Some(error),
            redirect_to: None,
            state: SessionState::Unauthenticated,
            success: false,
        }
    }

    /// Credentials were accepted but the session must be upgraded with a second factor.
    pub fn needs_second_factor<S: Into<String>>(challenge: S) -> LoginOutcome {
        LoginOutcome {
            error: None,
            redirect_to: Some(challenge.into()),
            state: SessionState::NeedsSecondFactor,
            success: true,
        }
    }
}

/// Result of logout, second factor and credential operations.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Outcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OutcomeError>,
    pub force_logout: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
    pub success: bool,
}

impl Outcome {
    pub fn failed(error: OutcomeError) -> Outcome {
        Outcome {
            error: Some(error),
            ..Default::default()
        }
    }

    pub fn success() -> Outcome {
        Outcome {
            success: true,
            ..Default::default()
        }
    }

    pub fn redirect<S: Into<String>>(mut self, to: S) -> Outcome {
        self.redirect_to = Some(to.into());
        self
    }

    pub fn force_logout(mut self) -> Outcome {
        self.force_logout = true;
        self
    }
}

/// A freshly enrolled (still unverified) second factor.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Enrollment {
    pub factor_id: String,
    pub provisioning: Provisioning,
}

/// Error reported to consumers of the session gate.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct OutcomeError {
    /// Root cause reported by the remote service, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub kind: OutcomeErrorKind,
    pub message: String,
}

impl OutcomeError {
    /// Classify an error from the Identity Service or Profile Store.
    ///
    /// Errors with no recognised marker are classified with the `fallback` kind.
    pub fn classify(error: &anyhow::Error, fallback: OutcomeErrorKind) -> OutcomeError {
        let kind = if error.is::<ServiceUnreachable>() || error.is::<CallTimeout>() {
            OutcomeErrorKind::Transport
        } else if error.is::<InvalidCredentials>() {
            OutcomeErrorKind::Credentials
        } else if error.is::<InvalidCode>() || error.is::<FactorNotFound>() {
            OutcomeErrorKind::SecondFactor
        } else if error.is::<NoSession>() {
            OutcomeErrorKind::Session
        } else if error.is::<MissingProfile>() {
            OutcomeErrorKind::Integrity
        } else {
            fallback
        };
        let mut outcome = OutcomeError::new(kind);
        // Credential rejections never carry remote details.
        if kind != OutcomeErrorKind::Credentials {
            outcome.detail = Some(error.root_cause().to_string());
        }
        outcome
    }

    /// Error of the given kind, with the generic message for that kind.
    pub fn new(kind: OutcomeErrorKind) -> OutcomeError {
        OutcomeError {
            detail: None,
            kind,
            message: kind.message().to_string(),
        }
    }

    /// Replace the generic message.
    pub fn with_message<S: Into<String>>(mut self, message: S) -> OutcomeError {
        self.message = message.into();
        self
    }
}

/// Classes of errors consumers can react differently to.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeErrorKind {
    /// Login rejected. Re-prompt, never retry automatically.
    Credentials,

    /// Second factor enrollment could not be completed.
    Enrollment,

    /// Valid session without a matching profile.
    Integrity,

    /// Second factor verification or management failed. The session is kept.
    SecondFactor,

    /// The operation needs a session but there is none (or it expired).
    Session,

    /// Any other failure reported by the remote services.
    Service,

    /// Remote services unreachable or too slow. Suggest trying again.
    Transport,
}

impl OutcomeErrorKind {
    /// Generic, user presentable, message for the error kind.
    pub fn message(&self) -> &'static str {
        match self {
            OutcomeErrorKind::Credentials => "invalid email or password",
            OutcomeErrorKind::Enrollment => "unable to enroll a new second factor",
            OutcomeErrorKind::Integrity => "the account is not configured for this application",
            OutcomeErrorKind::SecondFactor => "second factor verification failed",
            OutcomeErrorKind::Session => "the session expired, please sign in again",
            OutcomeErrorKind::Service => "the identity service reported an error",
            OutcomeErrorKind::Transport => "the identity service could not be reached, try again",
        }
    }

    /// Stable label for metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeErrorKind::Credentials => "credentials",
            OutcomeErrorKind::Enrollment => "enrollment",
            OutcomeErrorKind::Integrity => "integrity",
            OutcomeErrorKind::SecondFactor => "second_factor",
            OutcomeErrorKind::Session => "session",
            OutcomeErrorKind::Service => "service",
            OutcomeErrorKind::Transport => "transport",
        }
    }
}

#[cfg(test)]
mod tests {
    use repairdesk_identity_client::errors::InvalidCredentials;
    use repairdesk_identity_client::errors::ServiceUnreachable;

    use super::OutcomeError;
    use super::OutcomeErrorKind;
    use super::SessionCheck;
    use crate::errors::CallTimeout;

    #[test]
    fn classify_transport_apart_from_credentials() {
        let error = anyhow::anyhow!(ServiceUnreachable::identity());
        let outcome = OutcomeError::classify(&error, OutcomeErrorKind::Service);
        assert_eq!(outcome.kind, OutcomeErrorKind::Transport);

        let error = anyhow::anyhow!(CallTimeout { operation: "sign_in" });
        let outcome = OutcomeError::classify(&error, OutcomeErrorKind::Service);
        assert_eq!(outcome.kind, OutcomeErrorKind::Transport);

        let error = anyhow::anyhow!("Invalid login credentials").context(InvalidCredentials);
        let outcome = OutcomeError::classify(&error, OutcomeErrorKind::Service);
        assert_eq!(outcome.kind, OutcomeErrorKind::Credentials);
        assert_eq!(outcome.message, "invalid email or password");
        assert_eq!(outcome.detail, None);
    }

    #[test]
    fn classify_hides_credentials_detail() {
        let error = anyhow::anyhow!("Email not confirmed").context(InvalidCredentials);
        let outcome = OutcomeError::classify(&error, OutcomeErrorKind::Service);
        assert_eq!(outcome.kind, OutcomeErrorKind::Credentials);
        assert_eq!(outcome.detail, None);
        let value = serde_json::to_value(&outcome).unwrap();
        assert!(!value.to_string().contains("Email not confirmed"));

        let error = anyhow::anyhow!("connection refused").context(ServiceUnreachable::identity());
        let outcome = OutcomeError::classify(&error, OutcomeErrorKind::Service);
        assert_eq!(outcome.detail.as_deref(), Some("connection refused"));
    }

    #[test]
    fn classify_fallback() {
        let error = anyhow::anyhow!("something odd");
        let outcome = OutcomeError::classify(&error, OutcomeErrorKind::Enrollment);
        assert_eq!(outcome.kind, OutcomeErrorKind::Enrollment);
    }

    #[test]
    fn serialise_session_check() {
        let check = SessionCheck::unauthenticated("/login", None);
        let value = serde_json::to_value(check).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "authenticated": false,
                "force_logout": true,
                "redirect_to": "/login",
                "state": "unauthenticated",
            })
        );
    }
}
