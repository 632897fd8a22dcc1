//! Container for the complete process runtime configuration.
use serde::Deserialize;
use serde::Serialize;

use replisdk::runtime::tokio_conf::TokioRuntimeConf;

/// Container for the complete process runtime configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConf {
    /// Tokio Runtime configuration.
    #[serde(default, flatten)]
    pub tokio: TokioRuntimeConf,
}
