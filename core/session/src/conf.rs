//! Session gate configuration.
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use repairdesk_auth::Role;

/// Session gate configuration.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConf {
    /// Persist the cached identity to a JSON file at this path.
    ///
    /// When not set the identity is cached in memory only.
    pub cache_path: Option<String>,

    /// Views the gate redirects principals to.
    pub routes: RoutesConf,

    /// Timeout (in seconds) for each Identity Service and Profile Store call.
    pub timeout_sec: u64,
}

impl SessionConf {
    /// Timeout for each Identity Service and Profile Store call.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_sec)
    }
}

impl Default for SessionConf {
    fn default() -> Self {
        SessionConf {
            cache_path: None,
            routes: RoutesConf::default(),
            timeout_sec: 10,
        }
    }
}

/// Views the gate redirects principals to.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutesConf {
    /// Second factor challenge view.
    pub challenge: String,

    /// Landing view for each role after a successful login.
    pub landing: LandingRoutes,

    /// Login view.
    pub login: String,

    /// Application root, also used as landing for principals without a role.
    pub root: String,
}

impl RoutesConf {
    /// Landing view for principals with the given role.
    pub fn landing(&self, role: Option<Role>) -> &str {
        match role {
            None => &self.root,
            Some(Role::Admin) => &self.landing.admin,
            Some(Role::FrontDesk) => &self.landing.front_desk,
            Some(Role::Partner) => &self.landing.partner,
            Some(Role::Technician) => &self.landing.technician,
        }
    }
}

impl Default for RoutesConf {
    fn default() -> Self {
        RoutesConf {
            challenge: "/mfa-challenge".into(),
            landing: LandingRoutes::default(),
            login: "/login".into(),
            root: "/".into(),
        }
    }
}

/// Landing view for each role.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandingRoutes {
    pub admin: String,
    pub front_desk: String,
    pub partner: String,
    pub technician: String,
}

impl Default for LandingRoutes {
    fn default() -> Self {
        LandingRoutes {
            admin: "/".into(),
            front_desk: "/pos/create".into(),
            partner: "/quotes".into(),
            technician: "/repair-orders".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use repairdesk_auth::Role;

    use super::SessionConf;

    #[test]
    fn landing_by_role() {
        let conf = SessionConf::default();
        let routes = &conf.routes;
        assert_eq!(routes.landing(Some(Role::FrontDesk)), "/pos/create");
        assert_eq!(routes.landing(Some(Role::Technician)), "/repair-orders");
        assert_eq!(routes.landing(Some(Role::Partner)), "/quotes");
        assert_eq!(routes.landing(Some(Role::Admin)), "/");
        assert_eq!(routes.landing(None), "/");
    }

    #[test]
    fn partial_override() {
        let conf: SessionConf = serde_json::from_value(serde_json::json!({
            "timeout_sec": 3,
            "routes": {"landing": {"partner": "/partner/quotes"}},
        }))
        .unwrap();
        assert_eq!(conf.timeout_sec, 3);
        assert_eq!(conf.routes.login, "/login");
        assert_eq!(conf.routes.landing.partner, "/partner/quotes");
        assert_eq!(conf.routes.landing.technician, "/repair-orders");
    }
}
