//! Data exchanged with the Identity Service and Profile Store.
use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

/// How strongly a session has been verified.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssuranceLevel {
    /// Password verified only.
    #[serde(alias = "aal1")]
    Single,

    /// Password plus a second factor verified.
    #[serde(alias = "aal2")]
    Multi,
}

/// Current and required assurance levels of a session.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AssuranceLevels {
    /// Assurance level the session has reached.
    pub current: AssuranceLevel,

    /// Assurance level the account requires.
    pub next: AssuranceLevel,
}

impl AssuranceLevels {
    /// The account requires a second factor the session has not provided yet.
    pub fn needs_second_factor(&self) -> bool {
        self.next == AssuranceLevel::Multi && self.current == AssuranceLevel::Single
    }
}

/// Credentials to sign in with.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Changes to apply to the credentials of the signed in principal.
#[derive(Clone, Default, Serialize)]
pub struct CredentialsUpdate {
    /// Replace the password of the principal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Challenge issued for a second factor, to be answered with a one-time code.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    /// Identifier of the challenge to reference when verifying.
    pub id: String,

    /// Unix timestamp after which the challenge can no longer be verified.
    #[serde(default)]
    pub expires_at: Option<i64>,
}

/// A second factor registered for the signed in principal.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Factor {
    /// Opaque identifier of the factor.
    pub id: String,

    /// Mechanism used by the factor.
    #[serde(rename = "factor_type")]
    pub kind: FactorType,

    /// Verification status of the factor.
    pub status: FactorStatus,
}

/// Verification status of a second factor.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorStatus {
    Unverified,
    Verified,
}

/// Mechanisms supported as second factors.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorType {
    /// Time-based one-time codes.
    Totp,
}

/// A newly enrolled (and still unverified) second factor.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct NewFactor {
    /// Opaque identifier of the factor.
    pub id: String,

    /// Information the principal needs to configure their authenticator app.
    pub provisioning: Provisioning,
}

/// Information to configure a time-based one-time code authenticator.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Provisioning {
    /// Image (SVG or data URL) of a scannable QR code.
    pub qr_code: String,

    /// Shared secret, for manual entry.
    pub secret: String,

    /// `otpauth://` URI encoding the secret.
    pub uri: String,
}

/// Profile record of a principal stored alongside business data.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A session established with the Identity Service.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// ID of the principal the session belongs to.
    pub user_id: String,

    /// Email of the principal the session belongs to, if known.
    #[serde(default)]
    pub email: Option<String>,

    /// Unix timestamp the session access token expires at, if known.
    #[serde(default)]
    pub expires_at: Option<i64>,
}
