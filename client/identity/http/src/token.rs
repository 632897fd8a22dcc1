//! Tokens issued by the Identity Service and their local storage.
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use serde::Serialize;

use repairdesk_identity_client::AssuranceLevel;
use repairdesk_identity_client::Session;

/// The access token is not a well formed JWT.
#[derive(Debug, thiserror::Error)]
#[error("the access token is not a well formed JWT")]
pub struct MalformedToken;

/// Unable to persist the session to the given path.
#[derive(Debug, thiserror::Error)]
#[error("unable to persist the session to '{path}'")]
pub struct PersistFailed {
    pub path: String,
}

/// Response of the token endpoints (password sign in, refresh and factor verification).
#[derive(Clone, Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub refresh_token: String,
    pub user: UserInfo,
}

/// User record returned by the auth API.
#[derive(Clone, Debug, Deserialize)]
pub struct UserInfo {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub factors: Option<Vec<repairdesk_identity_client::Factor>>,
}

/// Session tokens kept by the client between requests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub access_token: String,
    pub email: Option<String>,
    pub expires_at: Option<i64>,
    pub refresh_token: String,
    pub user_id: String,
}

impl StoredSession {
    /// Build the stored session from a token endpoint response.
    pub fn from_response(response: TokenResponse, now: i64) -> StoredSession {
        let expires_at = response
            .expires_at
            .or_else(|| response.expires_in.map(|expires_in| now + expires_in));
        StoredSession {
            access_token: response.access_token,
            email: response.user.email,
            expires_at,
            refresh_token: response.refresh_token,
            user_id: response.user.id,
        }
    }

    /// The access token expired (or is about to) and should be refreshed before use.
    pub fn expired(&self, now: i64) -> bool {
        match self.expires_at {
            None => false,
            Some(expires_at) => expires_at - EXPIRY_MARGIN_SEC <= now,
        }
    }

    /// Public view of the session.
    pub fn session(&self) -> Session {
        Session {
            email: self.email.clone(),
            expires_at: self.expires_at,
            user_id: self.user_id.clone(),
        }
    }
}

/// Seconds before expiry at which access tokens are refreshed.
const EXPIRY_MARGIN_SEC: i64 = 10;

#[derive(Deserialize)]
struct Claims {
    #[serde(default)]
    aal: Option<AssuranceLevel>,
}

/// Decode the assurance level claim from an access token.
///
/// The signature is NOT checked: the token was received from the Identity Service
/// and the claim is only used to decide which view to present.
pub fn assurance_level(token: &str) -> Result<AssuranceLevel> {
    let payload = token.split('.').nth(1).ok_or(MalformedToken)?;
    let payload = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .context(MalformedToken)?;
    let claims: Claims = serde_json::from_slice(&payload).context(MalformedToken)?;
    Ok(claims.aal.unwrap_or(AssuranceLevel::Single))
}

/// Optional JSON file storage for the established session.
#[derive(Clone, Debug, Default)]
pub struct SessionFile {
    path: Option<PathBuf>,
}

impl SessionFile {
    pub fn new(path: Option<&str>) -> SessionFile {
        SessionFile {
            path: path.map(PathBuf::from),
        }
    }

    /// Load the stored session, if any.
    ///
    /// Unreadable or corrupt files are treated as no session.
    pub fn load(&self) -> Option<StoredSession> {
        let path = self.path.as_ref()?;
        let data = std::fs::read(path).ok()?;
        serde_json::from_slice(&data).ok()
    }

    /// Replace the stored session, removing the file when no session is given.
    pub fn store(&self, session: Option<&StoredSession>) -> Result<()> {
        let path = match &self.path {
            None => return Ok(()),
            Some(path) => path,
        };
        let failed = || PersistFailed {
            path: path.display().to_string(),
        };
        match session {
            None if path.exists() => std::fs::remove_file(path).with_context(failed),
            None => Ok(()),
            Some(session) => {
                let data = serde_json::to_vec(session).with_context(failed)?;
                std::fs::write(path, data).with_context(failed)
            }
        }
    }
}
