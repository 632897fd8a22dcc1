//! Errors encountered during API requests or reported by the remote server.
use anyhow::Result;
use reqwest::Response;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// The client sent and invalid API request.
#[derive(Debug, thiserror::Error)]
#[error("the client sent and invalid API request")]
pub struct ClientError;

/// The server returned an empty API response.
#[derive(Debug, thiserror::Error)]
#[error("the server returned an empty API response")]
pub struct EmptyResponse;

/// Invalid API response received.
#[derive(Debug, thiserror::Error)]
#[error("invalid API response received: {response}")]
pub struct InvalidResponse {
    pub response: String,
}

/// Error reported by the remote server.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct RemoteError {
    /// Machine readable error code, when the server provides one.
    pub code: Option<String>,

    /// Human readable error message.
    pub message: String,

    /// HTTP status code of the response.
    pub status: u16,
}

/// The resource is not available, or access to it is restricted.
#[derive(Debug, thiserror::Error)]
#[error("the resource is not available, or access to it is restricted")]
pub struct ResourceNotFound;

/// The server failed to process the API request.
#[derive(Debug, thiserror::Error)]
#[error("the server failed to process the API request")]
pub struct ServerError;

/// The request was rejected because the credentials attached to it are missing or invalid.
#[derive(Debug, thiserror::Error)]
#[error("the request credentials are missing or invalid")]
pub struct Unauthorized;

/// Error payloads returned by the auth and REST APIs.
///
/// Different endpoints use different field names for the same information.
#[derive(Default, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    msg: Option<String>,
}

impl ErrorPayload {
    fn into_remote(self, status: StatusCode) -> RemoteError {
        let code = self.error_code.or_else(|| match self.code {
            Some(serde_json::Value::String(code)) => Some(code),
            _ => None,
        });
        let code = code.or_else(|| self.error.clone());
        let message = self
            .error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
            .unwrap_or_else(|| status.to_string());
        RemoteError {
            code,
            message,
            status: status.as_u16(),
        }
    }
}

/// Decode the body of an HTTP response and correctly handle errors in the process.
pub async fn inspect<T>(response: Response) -> Result<Option<T>>
where
    T: DeserializeOwned,
{
    let code = response.status();
    let text = response.text().await?;

    // Expect 404 errors to not have a useful response body.
    if matches!(code, StatusCode::NOT_FOUND) {
        anyhow::bail!(ResourceNotFound);
    }

    // On error, attempt to decode a JSON object and convert into appropriate errors.
    // Bodies that are not JSON (such as gateway error pages) are kept as the message.
    if code.is_client_error() || code.is_server_error() {
        let payload = match text.trim() {
            "" => ErrorPayload::default(),
            body => serde_json::from_str::<ErrorPayload>(body).unwrap_or_else(|_| ErrorPayload {
                message: Some(body.to_string()),
                ..ErrorPayload::default()
            }),
        };
        let error = anyhow::anyhow!(payload.into_remote(code));
        let error = match code {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => error.context(Unauthorized),
            code if code.is_client_error() => error.context(ClientError),
            _ => error.context(ServerError),
        };
        return Err(error);
    }

    // On success decode the payload, if any, into the requested type.
    if text.is_empty() {
        return Ok(None);
    }
    serde_json::from_str::<T>(&text)
        .map_err(|error| {
            let decode = InvalidResponse { response: text };
            anyhow::anyhow!(error).context(decode)
        })
        .map(Some)
}
