use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Headers the HTTP client manages itself; replaying captured values would
/// conflict with the connection it opens.
const CLIENT_MANAGED_HEADERS: &[&str] = &["host", "content-length", "accept-encoding", "connection"];

/// One authorized request template observed in browser traffic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
}

impl Credentials {
    /// Captured headers that should be sent on replay.
    pub fn replay_headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .filter(|(name, _)| !name.starts_with(':'))
            .filter(|(name, _)| {
                !CLIENT_MANAGED_HEADERS
                    .iter()
                    .any(|managed| managed.eq_ignore_ascii_case(name))
            })
    }
}
