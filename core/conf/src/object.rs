//! Data object storing RepairDesk configuration.
use serde::Deserialize;
use serde::Serialize;

use replisdk::runtime::telemetry::TelemetryConfig;

use repairdesk_auth::RuleTable;
use repairdesk_session::SessionConf;

use super::RuntimeConf;

/// Global configuration for the RepairDesk process.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conf {
    /// Role based access rules configuration.
    #[serde(default)]
    pub access: AccessConf,

    /// Identity Service client configuration.
    pub identity: BackendConf,

    /// Process runtime configuration.
    #[serde(default)]
    pub runtime: RuntimeConf,

    /// Session gate configuration.
    #[serde(default)]
    pub session: SessionConf,

    /// Telemetry configuration for the process.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Role based access rules configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessConf {
    /// Replace the rule table shipped with the application.
    ///
    /// The override must stay consistent with the backend row-level security policies.
    #[serde(default)]
    pub rules: Option<RuleTable>,
}

impl AccessConf {
    /// Rule table to evaluate access requests against.
    pub fn rule_table(&self) -> RuleTable {
        self.rules.clone().unwrap_or_default()
    }
}

/// Unstructured configuration for runtime selected service backends.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BackendConf {
    /// ID of the backend selected to provide the service.
    pub backend: String,

    /// Backend specific configuration options.
    #[serde(default, flatten)]
    pub options: serde_json::Value,
}
