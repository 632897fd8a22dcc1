//! Audit events emitted on session transitions.
use anyhow::Result;
use opentelemetry_api::trace::TraceContextExt;
use opentelemetry_api::trace::TraceId;
use opentelemetry_api::Context as OTelContext;
use serde::Deserialize;
use serde::Serialize;

use repairdesk_events::Event;

/// A second factor was removed.
pub const FACTOR_DISABLE: &str = "SESSION_FACTOR_DISABLE";

/// Enrollment of a new second factor started.
pub const FACTOR_ENROLL: &str = "SESSION_FACTOR_ENROLL";

/// A second factor challenge was answered correctly.
pub const FACTOR_VERIFY: &str = "SESSION_FACTOR_VERIFY";

/// The gate terminated the session without the principal asking for it.
pub const FORCED_LOGOUT: &str = "SESSION_FORCED_LOGOUT";

/// A principal signed in and is fully trusted.
pub const LOGIN: &str = "SESSION_LOGIN";

/// A login attempt was rejected.
pub const LOGIN_FAILED: &str = "SESSION_LOGIN_FAILED";

/// A principal signed in with a password but must still answer a second factor challenge.
pub const LOGIN_SECOND_FACTOR: &str = "SESSION_LOGIN_SECOND_FACTOR";

/// A principal signed out.
pub const LOGOUT: &str = "SESSION_LOGOUT";

/// A principal changed their password.
pub const PASSWORD_UPDATE: &str = "SESSION_PASSWORD_UPDATE";

/// Payload for session audit events.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Audit {
    /// Email the operation was attempted with, when known.
    #[serde(default)]
    pub email: Option<String>,

    /// Second factor the operation acted on, if any.
    #[serde(default)]
    pub factor_id: Option<String>,

    /// ID of the principal the operation was performed for, when known.
    #[serde(default)]
    pub principal: Option<String>,

    /// Reason for failed operations and forced transitions.
    #[serde(default)]
    pub reason: Option<String>,

    /// Tracing ID to link this audit event to a larger context, if tracing is available.
    #[serde(default)]
    pub trace_id: Option<String>,
}

impl Audit {
    /// Compose a session audit event with the given code.
    pub fn event(mut self, code: &str) -> Result<Event> {
        let trace_id = OTelContext::current().span().span_context().trace_id();
        if trace_id != TraceId::INVALID {
            self.trace_id = Some(trace_id.to_string());
        }
        Event::new_with_payload(code, self)
    }

    pub fn email<S: Into<String>>(mut self, email: S) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn factor<S: Into<String>>(mut self, factor_id: S) -> Self {
        self.factor_id = Some(factor_id.into());
        self
    }

    pub fn principal<S: Into<String>>(mut self, principal: S) -> Self {
        self.principal = Some(principal.into());
        self
    }

    pub fn reason<S: Into<String>>(mut self, reason: S) -> Self {
        self.reason = Some(reason.into());
        self
    }
}
