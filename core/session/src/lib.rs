//! Session and identity gate for RepairDesk.
//!
//! The gate wraps the remote Identity Service and Profile Store to answer, on every
//! protected navigation, whether the principal using the application is:
//!
//! - [`SessionState::Authenticated`]: fully trusted, with a cached [`Identity`].
//! - [`SessionState::NeedsSecondFactor`]: signed in with a password but still required
//!   to answer a second factor challenge.
//! - [`SessionState::Unauthenticated`]: without a usable session.
//!
//! The cached [`Identity`] is only ever written by the gate and only once the session
//! assurance level is sufficient. Unexpected errors fail closed.
//!
//! [`Identity`]: repairdesk_auth::Identity
mod audit;
mod cache;
mod conf;
mod errors;
mod factors;
mod gate;
mod outcome;
mod telemetry;

#[cfg(test)]
mod tests;

pub use self::audit::Audit;
pub use self::cache::CacheLoadFailed;
pub use self::cache::CachePersistFailed;
pub use self::cache::FileCache;
pub use self::cache::IdentityCache;
pub use self::cache::IdentityCacheBackend;
pub use self::cache::MemoryCache;
pub use self::conf::LandingRoutes;
pub use self::conf::RoutesConf;
pub use self::conf::SessionConf;
pub use self::errors::CallTimeout;
pub use self::errors::MissingProfile;
pub use self::gate::SessionGate;
pub use self::outcome::Enrollment;
pub use self::outcome::LoginOutcome;
pub use self::outcome::Outcome;
pub use self::outcome::OutcomeError;
pub use self::outcome::OutcomeErrorKind;
pub use self::outcome::SessionCheck;
pub use self::outcome::SessionState;
pub use self::telemetry::register_metrics;

/// Codes of the audit events emitted by the session gate.
pub mod codes {
    pub use super::audit::FACTOR_DISABLE;
    pub use super::audit::FACTOR_ENROLL;
    pub use super::audit::FACTOR_VERIFY;
    pub use super::audit::FORCED_LOGOUT;
    pub use super::audit::LOGIN;
    pub use super::audit::LOGIN_FAILED;
    pub use super::audit::LOGIN_SECOND_FACTOR;
    pub use super::audit::LOGOUT;
    pub use super::audit::PASSWORD_UPDATE;
}
