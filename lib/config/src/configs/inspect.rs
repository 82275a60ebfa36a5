use serde::Deserialize;

/// Body-read limits applied at the `Inspect` stage.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct InspectConfig {
    #[serde(default = "default_max_request_body_bytes")]
    pub max_request_body_bytes: usize,
}

fn default_max_request_body_bytes() -> usize {
    1024 * 1024
}

impl InspectConfig {
    pub fn from_env() -> Self {
        crate::envy_load!("inspect", "INSPECT_")
    }
}

impl Default for InspectConfig {
    fn default() -> Self {
        Self {
            max_request_body_bytes: default_max_request_body_bytes(),
        }
    }
}
