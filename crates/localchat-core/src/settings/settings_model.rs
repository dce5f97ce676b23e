use serde::{Deserialize, Serialize};

use crate::services::inference_client::DEFAULT_ENDPOINT;

/// User-editable client settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Full URL of the chat-completions endpoint
    pub endpoint: String,
    /// Connect timeout for the HTTP client; transport defaults apply when unset
    pub connect_timeout_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            connect_timeout_secs: None,
        }
    }
}
