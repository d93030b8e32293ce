use std::time::Duration;

use labmatch_common::chat::ATTACHMENT_BUCKET;
use labmatch_common::identity::UserId;

use crate::error::GatewayError;

/// Local development stack, overridden at compile time via LABMATCH_URL.
const DEFAULT_URL: &str = "http://localhost:54321";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Connection settings for the hosted backend.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// REST/storage/realtime base URL, always ending in `/`.
    pub base_url: String,
    /// Public project key, sent as `apikey` on every request.
    pub anon_key: String,
    /// Session JWT. Falls back to the anon key when signed out.
    pub access_token: Option<String>,
    /// Signed-in user; required for sending messages and applying.
    pub user_id: Option<UserId>,
    pub attachment_bucket: String,
    pub request_timeout: Duration,
}

impl GatewayConfig {
    pub fn new(base_url: impl AsRef<str>, anon_key: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base(base_url.as_ref()),
            anon_key: anon_key.into(),
            access_token: None,
            user_id: None,
            attachment_bucket: ATTACHMENT_BUCKET.to_string(),
            request_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Build from `LABMATCH_*` environment variables. Values baked in at compile
    /// time are used when the runtime variable is unset.
    pub fn from_env() -> Result<Self, GatewayError> {
        let url = Self::default_url();
        let anon_key = setting("LABMATCH_ANON_KEY", option_env!("LABMATCH_ANON_KEY"))
            .ok_or(GatewayError::Config("LABMATCH_ANON_KEY"))?;

        let mut config = Self::new(url, anon_key);
        config.access_token = setting("LABMATCH_ACCESS_TOKEN", None);
        config.user_id = setting("LABMATCH_USER_ID", None).map(UserId);
        if let Some(bucket) = setting(
            "LABMATCH_ATTACHMENT_BUCKET",
            option_env!("LABMATCH_ATTACHMENT_BUCKET"),
        ) {
            config.attachment_bucket = bucket;
        }
        Ok(config)
    }

    /// `LABMATCH_URL` from the environment or the build, else the local stack.
    pub fn default_url() -> String {
        setting("LABMATCH_URL", option_env!("LABMATCH_URL")).unwrap_or_else(|| DEFAULT_URL.to_string())
    }

    pub fn with_session(mut self, access_token: impl Into<String>, user_id: UserId) -> Self {
        self.access_token = Some(access_token.into());
        self.user_id = Some(user_id);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Token for the `Authorization: Bearer` header.
    pub fn bearer(&self) -> &str {
        self.access_token.as_deref().unwrap_or(&self.anon_key)
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Public download URL of a stored object.
    pub fn public_object_url(&self, bucket: &str, path: &str) -> String {
        self.endpoint(&format!("storage/v1/object/public/{bucket}/{path}"))
    }

    /// Realtime websocket URL: the base URL with a `ws`/`wss` scheme.
    pub fn realtime_url(&self) -> Result<String, GatewayError> {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            return Err(GatewayError::Url(self.base_url.clone()));
        };
        Ok(format!(
            "{ws_base}realtime/v1/websocket?apikey={}&vsn=1.0.0",
            self.anon_key
        ))
    }
}

fn setting(name: &str, compiled: Option<&'static str>) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| compiled.filter(|v| !v.is_empty()).map(String::from))
}

fn normalize_base(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    format!("{trimmed}/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_single_trailing_slash() {
        assert_eq!(GatewayConfig::new("https://x.example.co", "k").base_url, "https://x.example.co/");
        assert_eq!(GatewayConfig::new("https://x.example.co//", "k").base_url, "https://x.example.co/");
    }

    #[test]
    fn endpoints_join_without_double_slash() {
        let config = GatewayConfig::new("http://127.0.0.1:9000", "anon");
        assert_eq!(config.endpoint("/rest/v1/projects"), "http://127.0.0.1:9000/rest/v1/projects");
        assert_eq!(
            config.public_object_url("message-attachments", "1-ab-notes.pdf"),
            "http://127.0.0.1:9000/storage/v1/object/public/message-attachments/1-ab-notes.pdf"
        );
    }

    #[test]
    fn realtime_url_swaps_scheme() {
        let config = GatewayConfig::new("https://x.example.co", "anon");
        assert_eq!(
            config.realtime_url().unwrap(),
            "wss://x.example.co/realtime/v1/websocket?apikey=anon&vsn=1.0.0"
        );
        assert!(GatewayConfig::new("ftp://x", "anon").realtime_url().is_err());
    }

    #[test]
    fn bearer_falls_back_to_anon_key() {
        let config = GatewayConfig::new("http://localhost", "anon");
        assert_eq!(config.bearer(), "anon");
        let config = config.with_session("jwt", UserId::from("u1"));
        assert_eq!(config.bearer(), "jwt");
    }
}
