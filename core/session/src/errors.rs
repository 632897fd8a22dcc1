//! Errors detected by the session gate itself.

/// A call to a remote service did not complete in time.
#[derive(Debug, thiserror::Error)]
#[error("the {operation} call did not complete in time")]
pub struct CallTimeout {
    pub operation: &'static str,
}

/// The session is valid but the principal has no matching profile.
#[derive(Debug, thiserror::Error)]
#[error("no profile found for principal '{principal}'")]
pub struct MissingProfile {
    pub principal: String,
}
