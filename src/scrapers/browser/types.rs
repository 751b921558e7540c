//! Browser session types shared with the HTTP client.

use serde::{Deserialize, Serialize};

/// Cookie extracted from a browser session, replayed on direct downloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
}
