//! Map decoded API responses onto Identity Service errors, endpoint by endpoint.
use anyhow::Result;

use repairdesk_client_utils::ClientError;
use repairdesk_client_utils::EmptyResponse;
use repairdesk_client_utils::ResourceNotFound;
use repairdesk_client_utils::Unauthorized;
use repairdesk_identity_client::errors::FactorNotFound;
use repairdesk_identity_client::errors::InvalidCode;
use repairdesk_identity_client::errors::InvalidCredentials;
use repairdesk_identity_client::errors::NoSession;
use repairdesk_identity_client::Challenge;
use repairdesk_identity_client::Profile;

use crate::token::TokenResponse;

/// Require a response body for endpoints that always return one.
pub fn required<T>(result: Result<Option<T>>) -> Result<T> {
    match result? {
        None => anyhow::bail!(EmptyResponse),
        Some(value) => Ok(value),
    }
}

/// Rejected sign in requests are credential errors.
pub fn sign_in(result: Result<Option<TokenResponse>>) -> Result<TokenResponse> {
    match result {
        Err(error) if error.is::<ClientError>() || error.is::<Unauthorized>() => {
            Err(error.context(InvalidCredentials))
        }
        result => required(result),
    }
}

/// Rejected refresh tokens mean the session is over.
pub fn refresh(result: Result<Option<TokenResponse>>) -> Result<TokenResponse> {
    match result {
        Err(error) if error.is::<ClientError>() || error.is::<Unauthorized>() => {
            Err(error.context(NoSession))
        }
        result => required(result),
    }
}

/// Sessions the service no longer recognises are already terminated.
pub fn sign_out(result: Result<Option<serde_json::Value>>) -> Result<()> {
    match result {
        Err(error) if error.is::<Unauthorized>() || error.is::<ResourceNotFound>() => Ok(()),
        Err(error) => Err(error),
        Ok(_) => Ok(()),
    }
}

pub fn challenge(result: Result<Option<Challenge>>, factor_id: &str) -> Result<Challenge> {
    match result {
        Err(error) if error.is::<ResourceNotFound>() || error.is::<ClientError>() => {
            let id = factor_id.to_string();
            Err(error.context(FactorNotFound { id }))
        }
        result => required(result),
    }
}

pub fn unenroll(result: Result<Option<serde_json::Value>>, factor_id: &str) -> Result<()> {
    match result {
        Err(error) if error.is::<ResourceNotFound>() || error.is::<ClientError>() => {
            let id = factor_id.to_string();
            Err(error.context(FactorNotFound { id }))
        }
        Err(error) => Err(error),
        Ok(_) => Ok(()),
    }
}

/// Rejected verifications are reported against the challenge they answered.
pub fn verify(result: Result<Option<TokenResponse>>, challenge_id: &str) -> Result<TokenResponse> {
    match result {
        Err(error) if error.is::<ResourceNotFound>() || error.is::<ClientError>() => {
            let challenge_id = challenge_id.to_string();
            Err(error.context(InvalidCode { challenge_id }))
        }
        result => required(result),
    }
}

/// Profile lookups return a list with at most one matching record.
pub fn profile(result: Result<Option<Vec<Profile>>>) -> Result<Option<Profile>> {
    let profiles = result?.unwrap_or_default();
    Ok(profiles.into_iter().next())
}
