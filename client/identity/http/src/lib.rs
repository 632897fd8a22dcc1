//! Identity Service and Profile Store client for the HTTP(S) protocol.
//!
//! Talks to a GoTrue compatible auth API (mounted at `auth/v1/`) and to
//! a PostgREST compatible data API (mounted at `rest/v1/`) for profiles.
use std::sync::Arc;
use std::sync::Mutex;

use anyhow::Context;
use anyhow::Result;
use reqwest::Client as ReqwestClient;
use reqwest::Method;
use reqwest::RequestBuilder;
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use repairdesk_client_utils::ClientOptions;
use repairdesk_client_utils::ServerError;
use repairdesk_identity_client::errors::NoSession;
use repairdesk_identity_client::errors::ServiceUnreachable;
use repairdesk_identity_client::AssuranceLevel;
use repairdesk_identity_client::AssuranceLevels;
use repairdesk_identity_client::Challenge;
use repairdesk_identity_client::Credentials;
use repairdesk_identity_client::CredentialsUpdate;
use repairdesk_identity_client::Factor;
use repairdesk_identity_client::FactorStatus;
use repairdesk_identity_client::FactorType;
use repairdesk_identity_client::IIdentity;
use repairdesk_identity_client::IProfiles;
use repairdesk_identity_client::NewFactor;
use repairdesk_identity_client::Profile;
use repairdesk_identity_client::Provisioning;
use repairdesk_identity_client::Session;

mod conf;
mod responses;
mod token;

pub use self::conf::HttpIdentityConf;
pub use self::token::MalformedToken;
pub use self::token::PersistFailed;

use self::token::SessionFile;
use self::token::StoredSession;
use self::token::UserInfo;

/// String to set as the user agent in HTTP request.
static CLIENT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Identity Service and Profile Store client for the HTTP(S) protocol.
///
/// Clones share the established session so the same client can back
/// both the [`Client`](repairdesk_identity_client::Client) and
/// [`Profiles`](repairdesk_identity_client::Profiles) wrappers.
#[derive(Clone)]
pub struct HttpIdentity {
    /// Public API key of the project.
    api_key: String,

    /// Base URL of the project API, with trailing slash.
    base: String,

    /// Low-level [`Client`](reqwest::Client) to perform HTTP requests with.
    client: ReqwestClient,

    /// Name of the table holding principal profiles.
    profiles_table: String,

    /// Tokens of the established session, if any.
    session: Arc<Mutex<Option<StoredSession>>>,

    /// Storage for the established session.
    store: SessionFile,
}

impl HttpIdentity {
    /// Initialise a client from configuration, restoring any persisted session.
    pub fn with(conf: &HttpIdentityConf) -> Result<HttpIdentity> {
        let options = ClientOptions::from(conf);
        let client = options.client(CLIENT_USER_AGENT);
        let store = SessionFile::new(conf.session_path.as_deref());
        let client = HttpIdentity {
            api_key: conf.api_key.clone(),
            base: options.address,
            client: client.build()?,
            profiles_table: conf.profiles_table.clone(),
            session: Arc::new(Mutex::new(store.load())),
            store,
        };
        Ok(client)
    }
}

impl HttpIdentity {
    /// Return a valid access token for the established session, refreshing it if needed.
    async fn access_token(&self) -> Result<String> {
        let stored = match self.stored() {
            None => anyhow::bail!(NoSession),
            Some(stored) => stored,
        };
        if !stored.expired(now()) {
            return Ok(stored.access_token);
        }
        let refreshed = self.refresh(&stored).await?;
        Ok(refreshed.access_token)
    }

    /// Fetch the user record of the signed in principal.
    async fn current_user(&self) -> Result<UserInfo> {
        let token = self.access_token().await?;
        let request = self.auth(Method::GET, "user", Some(&token));
        let response = send(request, ServiceUnreachable::identity()).await?;
        responses::required(decode(response, ServiceUnreachable::identity()).await)
    }

    /// Exchange the refresh token for a new session.
    async fn refresh(&self, stored: &StoredSession) -> Result<StoredSession> {
        let request = self
            .auth(Method::POST, "token?grant_type=refresh_token", None)
            .json(&serde_json::json!({ "refresh_token": stored.refresh_token }));
        let response = send(request, ServiceUnreachable::identity()).await?;
        let response = decode(response, ServiceUnreachable::identity()).await;
        let response = match responses::refresh(response) {
            Err(error) if error.is::<NoSession>() => {
                self.replace_session(None)?;
                return Err(error);
            }
            result => result?,
        };
        let refreshed = StoredSession::from_response(response, now());
        self.replace_session(Some(refreshed.clone()))?;
        Ok(refreshed)
    }

    /// Replace the established session, in memory and in storage.
    fn replace_session(&self, session: Option<StoredSession>) -> Result<()> {
        self.store.store(session.as_ref())?;
        *self
            .session
            .lock()
            .expect("HttpIdentity::session lock poisoned") = session;
        Ok(())
    }

    fn stored(&self) -> Option<StoredSession> {
        self.session
            .lock()
            .expect("HttpIdentity::session lock poisoned")
            .clone()
    }

    /// Prepare a request to the auth API.
    fn auth(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let url = format!("{}auth/v1/{}", self.base, path);
        self.request(method, url, token)
    }

    /// Prepare a request with the project API key and optional access token.
    fn request(&self, method: Method, url: String, token: Option<&str>) -> RequestBuilder {
        let bearer = token.unwrap_or(&self.api_key);
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
    }
}

#[async_trait::async_trait]
impl IIdentity for HttpIdentity {
    async fn assurance_level(&self) -> Result<AssuranceLevels> {
        let token = self.access_token().await?;
        let current = self::token::assurance_level(&token)?;
        let user = self.current_user().await?;
        let next = required_level(user.factors.as_deref().unwrap_or_default());
        Ok(AssuranceLevels { current, next })
    }

    async fn create_challenge(&self, factor_id: &str) -> Result<Challenge> {
        let token = self.access_token().await?;
        let path = format!("factors/{}/challenge", factor_id);
        let request = self.auth(Method::POST, &path, Some(&token));
        let response = send(request, ServiceUnreachable::identity()).await?;
        let response = decode(response, ServiceUnreachable::identity()).await;
        responses::challenge(response, factor_id)
    }

    async fn enroll_factor(&self, kind: FactorType) -> Result<NewFactor> {
        let token = self.access_token().await?;
        let request = self
            .auth(Method::POST, "factors", Some(&token))
            .json(&serde_json::json!({ "factor_type": kind }));
        let response = send(request, ServiceUnreachable::identity()).await?;
        let enrolled: EnrollResponse =
            responses::required(decode(response, ServiceUnreachable::identity()).await)?;
        Ok(NewFactor {
            id: enrolled.id,
            provisioning: enrolled.totp,
        })
    }

    async fn list_factors(&self) -> Result<Vec<Factor>> {
        let user = self.current_user().await?;
        Ok(user.factors.unwrap_or_default())
    }

    async fn session(&self) -> Result<Option<Session>> {
        let stored = match self.stored() {
            None => return Ok(None),
            Some(stored) => stored,
        };
        if !stored.expired(now()) {
            return Ok(Some(stored.session()));
        }
        match self.refresh(&stored).await {
            Ok(refreshed) => Ok(Some(refreshed.session())),
            Err(error) if error.is::<NoSession>() => Ok(None),
            Err(error) => Err(error),
        }
    }

    async fn sign_in(&self, credentials: Credentials) -> Result<Session> {
        let request = self
            .auth(Method::POST, "token?grant_type=password", None)
            .json(&credentials);
        let response = send(request, ServiceUnreachable::identity()).await?;
        let response = decode(response, ServiceUnreachable::identity()).await;
        let response = responses::sign_in(response)?;
        let stored = StoredSession::from_response(response, now());
        let session = stored.session();
        self.replace_session(Some(stored))?;
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        let stored = match self.stored() {
            None => return Ok(()),
            Some(stored) => stored,
        };
        let request = self.auth(Method::POST, "logout", Some(&stored.access_token));
        let response = send(request, ServiceUnreachable::identity()).await?;
        responses::sign_out(decode(response, ServiceUnreachable::identity()).await)?;
        self.replace_session(None)
    }

    async fn unenroll_factor(&self, factor_id: &str) -> Result<()> {
        let token = self.access_token().await?;
        let path = format!("factors/{}", factor_id);
        let request = self.auth(Method::DELETE, &path, Some(&token));
        let response = send(request, ServiceUnreachable::identity()).await?;
        let response = decode(response, ServiceUnreachable::identity()).await;
        responses::unenroll(response, factor_id)
    }

    async fn update_credentials(&self, update: CredentialsUpdate) -> Result<()> {
        let token = self.access_token().await?;
        let request = self.auth(Method::PUT, "user", Some(&token)).json(&update);
        let response = send(request, ServiceUnreachable::identity()).await?;
        decode::<serde_json::Value>(response, ServiceUnreachable::identity()).await?;
        Ok(())
    }

    async fn verify_challenge(
        &self,
        factor_id: &str,
        challenge_id: &str,
        code: &str,
    ) -> Result<()> {
        let token = self.access_token().await?;
        let path = format!("factors/{}/verify", factor_id);
        let request = self
            .auth(Method::POST, &path, Some(&token))
            .json(&serde_json::json!({ "challenge_id": challenge_id, "code": code }));
        let response = send(request, ServiceUnreachable::identity()).await?;
        let response = decode(response, ServiceUnreachable::identity()).await;
        let response = responses::verify(response, challenge_id)?;
        let stored = StoredSession::from_response(response, now());
        self.replace_session(Some(stored))
    }
}

#[async_trait::async_trait]
impl IProfiles for HttpIdentity {
    async fn profile(&self, principal_id: &str) -> Result<Option<Profile>> {
        let token = self.access_token().await?;
        let url = format!("{}rest/v1/{}", self.base, self.profiles_table);
        let request = self
            .request(Method::GET, url, Some(&token))
            .query(&[("id", format!("eq.{}", principal_id))])
            .query(&[("select", "*")]);
        let response = send(request, ServiceUnreachable::profiles()).await?;
        responses::profile(decode(response, ServiceUnreachable::profiles()).await)
    }
}

/// Response of the factor enrollment endpoint.
#[derive(Deserialize)]
struct EnrollResponse {
    id: String,
    totp: Provisioning,
}

/// Decode a response, marking server failures as the remote service being unreachable.
async fn decode<T>(response: Response, service: ServiceUnreachable) -> Result<Option<T>>
where
    T: DeserializeOwned,
{
    match repairdesk_client_utils::inspect(response).await {
        Err(error) if error.is::<ServerError>() => Err(error.context(service)),
        result => result,
    }
}

fn now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

/// Assurance level required of sessions for a principal with the given factors.
fn required_level(factors: &[Factor]) -> AssuranceLevel {
    let verified = factors
        .iter()
        .any(|factor| factor.status == FactorStatus::Verified);
    match verified {
        true => AssuranceLevel::Multi,
        false => AssuranceLevel::Single,
    }
}

/// Send a request, marking transport failures as the remote service being unreachable.
async fn send(request: RequestBuilder, service: ServiceUnreachable) -> Result<Response> {
    request.send().await.context(service)
}
