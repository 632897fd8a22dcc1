//! Initialisation logic for RepairDesk session commands.
use anyhow::Context as AnyContext;
use anyhow::Result;

use replisdk::runtime::telemetry;
use replisdk::runtime::telemetry::Telemetry;
use replisdk::runtime::telemetry::TelemetryConfig;
use replisdk::runtime::telemetry::TelemetryOptions;

use repairdesk_conf::BackendConf;
use repairdesk_conf::Conf;
use repairdesk_context::Context;
use repairdesk_events::emit::Events;
use repairdesk_events::emit::EventsLog;
use repairdesk_identity_client::Client;
use repairdesk_identity_client::Profiles;
use repairdesk_identity_client_http::HttpIdentity;
use repairdesk_identity_client_http::HttpIdentityConf;
use repairdesk_session::IdentityCache;
use repairdesk_session::SessionGate;

/// ID of the repairdesk release in sentry recommanded format.
const RELEASE_ID: &str = concat!(env!("CARGO_PKG_NAME"), "@", env!("CARGO_PKG_VERSION"));

/// Error looking for a specific backend implementation.
#[derive(Debug, thiserror::Error)]
pub enum BackendNotFound {
    /// Identity Service client backend not recognised.
    #[error("identity service backend '{0}' not recognised")]
    // (id,)
    Identity(String),
}

/// Invalid options for the selected backend.
#[derive(Debug, thiserror::Error)]
#[error("invalid options for the '{0}' backend")]
pub struct InvalidBackendOptions(String);

/// Process builder to initialise RepairDesk session commands.
pub struct SessionInit {
    pub context: Context,
    pub gate: SessionGate,
    pub telemetry: Telemetry,
}

impl SessionInit {
    /// Initialise telemetry and the session gate from the loaded configuration.
    pub async fn configure(conf: Conf) -> Result<SessionInit> {
        let telemetry = init_telemetry(conf.telemetry.clone()).await?;
        repairdesk_session::register_metrics(&telemetry.metrics)?;
        let context = Context::root(telemetry.logger.clone()).log_trace().build();

        let (identity, profiles) = identity_clients(&conf.identity)?;
        let cache = match &conf.session.cache_path {
            None => IdentityCache::memory(),
            Some(path) => IdentityCache::file(path)?,
        };
        let events = Events::from(EventsLog);
        let gate = SessionGate::new(identity, profiles, cache, events, conf.session);
        slog::debug!(
            context.logger, "Session gate initialised";
            "identity_backend" => &conf.identity.backend,
        );
        Ok(SessionInit {
            context,
            gate,
            telemetry,
        })
    }
}

/// Initialise Identity Service and Profile Store clients for the configured backend.
pub fn identity_clients(conf: &BackendConf) -> Result<(Client, Profiles)> {
    match conf.backend.as_str() {
        "http" => {
            let options: HttpIdentityConf = serde_json::from_value(conf.options.clone())
                .with_context(|| InvalidBackendOptions(conf.backend.clone()))?;
            let client = HttpIdentity::with(&options)?;
            Ok((Client::from(client.clone()), Profiles::from(client)))
        }
        id => anyhow::bail!(BackendNotFound::Identity(id.to_string())),
    }
}

/// Initialise process telemetry.
pub async fn init_telemetry(conf: TelemetryConfig) -> Result<Telemetry> {
    let telemetry_options = TelemetryOptions::for_sentry_release(RELEASE_ID)
        .for_app(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
        .finish();
    let telemetry = telemetry::initialise(conf, telemetry_options).await?;
    slog::debug!(telemetry.logger, "Process telemetry initialised");
    Ok(telemetry)
}
