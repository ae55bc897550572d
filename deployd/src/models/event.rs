//! Webhook event payloads

use serde::Deserialize;

/// The part of a push event deployd cares about
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushEvent {
    /// Fully qualified reference that was pushed, e.g. `refs/heads/main`
    #[serde(rename = "ref", default)]
    pub git_ref: String,
}

impl PushEvent {
    /// Decode a push event from a raw webhook body. A JSON `null` is an empty event.
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice::<Option<Self>>(body).map(Option::unwrap_or_default)
    }
}

/// Fully qualified reference for a configured branch name
pub fn branch_ref(branch: &str) -> String {
    if branch.starts_with("refs/") {
        branch.to_string()
    } else {
        format!("refs/heads/{}", branch)
    }
}
