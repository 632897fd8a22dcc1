//! Errors reported by Identity Service and Profile Store clients.
//!
//! Client implementations attach these markers to the errors they return
//! so callers can classify failures with [`anyhow::Error::is`].

/// The second factor does not exist for the signed in principal.
#[derive(Debug, thiserror::Error)]
#[error("second factor '{id}' not found")]
pub struct FactorNotFound {
    pub id: String,
}

/// The Identity Service rejected the credentials.
#[derive(Debug, thiserror::Error)]
#[error("the identity service rejected the credentials")]
pub struct InvalidCredentials;

/// The one-time code does not answer the challenge.
#[derive(Debug, thiserror::Error)]
#[error("the one-time code does not answer challenge '{challenge_id}'")]
pub struct InvalidCode {
    pub challenge_id: String,
}

/// The operation requires a session but none is established.
#[derive(Debug, thiserror::Error)]
#[error("the operation requires a session but none is established")]
pub struct NoSession;

/// The remote service could not be reached or did not respond in time.
#[derive(Debug, thiserror::Error)]
#[error("the {service} could not be reached")]
pub struct ServiceUnreachable {
    pub service: &'static str,
}

impl ServiceUnreachable {
    /// The Identity Service could not be reached.
    pub fn identity() -> Self {
        ServiceUnreachable {
            service: "identity service",
        }
    }

    /// The Profile Store could not be reached.
    pub fn profiles() -> Self {
        ServiceUnreachable {
            service: "profile store",
        }
    }
}
