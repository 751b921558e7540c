//! User agent selection for portal requests.
//!
//! Several municipal sites behind the portal answer unknown or bot-looking
//! clients with an empty shell, so every mode sends a desktop browser string
//! unless the config names one explicitly.

/// Desktop Chrome on Windows, the most common client in the portal's logs.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Chromium-family desktop strings rotated in `impersonate` mode.
///
/// Firefox and Safari are left out: the PrimeFaces widgets on some sites
/// degrade to a non-interactive fallback for them.
pub const IMPERSONATE_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
];

/// How the configured `portal.user_agent` value is interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAgentMode {
    Default,
    Impersonate,
    Custom(String),
}

impl UserAgentMode {
    pub fn from_config(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") => Self::Default,
            Some(v) if v.eq_ignore_ascii_case("impersonate") => Self::Impersonate,
            Some(v) => Self::Custom(v.to_string()),
        }
    }

    pub fn user_agent(&self) -> String {
        match self {
            Self::Default => USER_AGENT.to_string(),
            Self::Impersonate => rotated_user_agent().to_string(),
            Self::Custom(ua) => ua.clone(),
        }
    }
}

/// Pick an impersonation string, varying between engine instances.
fn rotated_user_agent() -> &'static str {
    let seed = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as usize)
        .unwrap_or(0);
    IMPERSONATE_USER_AGENTS[seed % IMPERSONATE_USER_AGENTS.len()]
}

/// User agent string for a configured value.
pub fn resolve_user_agent(config: Option<&str>) -> String {
    UserAgentMode::from_config(config).user_agent()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modes_from_config() {
        assert_eq!(UserAgentMode::from_config(None), UserAgentMode::Default);
        assert_eq!(UserAgentMode::from_config(Some("  ")), UserAgentMode::Default);
        assert_eq!(UserAgentMode::from_config(Some("Impersonate")), UserAgentMode::Impersonate);
        assert_eq!(
            UserAgentMode::from_config(Some("munidata-test/1.0")),
            UserAgentMode::Custom("munidata-test/1.0".into())
        );
    }

    #[test]
    fn test_resolved_strings() {
        assert_eq!(resolve_user_agent(None), USER_AGENT);
        assert!(IMPERSONATE_USER_AGENTS.contains(&resolve_user_agent(Some("impersonate")).as_str()));
        assert_eq!(resolve_user_agent(Some("munidata-test/1.0")), "munidata-test/1.0");
    }
}
