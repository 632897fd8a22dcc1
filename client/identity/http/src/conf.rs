//! Configuration of the HTTP(S) Identity Service client.
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use repairdesk_client_utils::ClientOptions;

/// Options to connect to the Identity Service and Profile Store over HTTP(S).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct HttpIdentityConf {
    /// Public API key of the project, sent with every request.
    pub api_key: String,

    /// Name of the table holding principal profiles.
    #[serde(default = "HttpIdentityConf::default_profiles_table")]
    pub profiles_table: String,

    /// Persist the established session to a JSON file so it survives restarts.
    #[serde(default)]
    pub session_path: Option<String>,

    /// Timeout (in seconds) for requests to the remote services.
    #[serde(default = "HttpIdentityConf::default_timeout_sec")]
    pub timeout_sec: u64,

    /// Timeout (in seconds) for new connections to the remote services.
    #[serde(default = "HttpIdentityConf::default_timeout_connect_sec")]
    pub timeout_connect_sec: u64,

    /// Base URL of the project API.
    pub url: String,
}

impl HttpIdentityConf {
    fn default_profiles_table() -> String {
        "profiles".into()
    }

    fn default_timeout_sec() -> u64 {
        30
    }

    fn default_timeout_connect_sec() -> u64 {
        5
    }
}

impl From<&HttpIdentityConf> for ClientOptions {
    fn from(value: &HttpIdentityConf) -> Self {
        ClientOptions::url(&value.url)
            .timeout(Duration::from_secs(value.timeout_sec))
            .timeout_connect(Duration::from_secs(value.timeout_connect_sec))
            .client()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use repairdesk_client_utils::ClientOptions;

    use super::HttpIdentityConf;

    #[test]
    fn decode_with_defaults() {
        let conf: HttpIdentityConf = serde_json::from_value(serde_json::json!({
            "url": "https://project.example.com",
            "api_key": "anon",
        }))
        .unwrap();
        assert_eq!(conf.profiles_table, "profiles");
        assert_eq!(conf.session_path, None);
        assert_eq!(conf.timeout_sec, 30);

        let options = ClientOptions::from(&conf);
        assert_eq!(options.address, "https://project.example.com/");
        assert_eq!(options.timeout_connect, Duration::from_secs(5));
    }
}
