//! Outbound alert channel.
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::config::{Config, ENV_CREDENTIAL, ENV_DESTINATION_ID};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notifier is not configured: {0} is missing")]
    ConfigMissing(&'static str),
    #[error("invalid messaging API URL: {0}")]
    InvalidEndpoint(String),
    /// The wrapped error never carries the request URL, which embeds the credential.
    #[error("failed to reach messaging API: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("messaging API returned {status}: {body}")]
    NonSuccessStatus { status: StatusCode, body: String },
}

fn transport(err: reqwest::Error) -> NotifyError {
    NotifyError::Transport(err.without_url())
}

/// Sends one plain-text message to the single configured destination.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> Result<(), NotifyError>;
}

/// Telegram Bot API `sendMessage`, form encoded.
#[derive(Clone)]
pub struct TelegramNotifier {
    http: Client,
    api_base: String,
    destination_id: Option<String>,
    credential: Option<String>,
}

impl fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("api_base", &self.api_base)
            .field("destination_id", &self.destination_id)
            .finish_non_exhaustive()
    }
}

impl TelegramNotifier {
    pub fn new(
        api_base: impl Into<String>,
        destination_id: Option<String>,
        credential: Option<String>,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let http = Client::builder()
            .user_agent(concat!("matcha-stockbot/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .no_proxy()
            .build()
            .map_err(transport)?;
        Ok(Self {
            http,
            api_base: api_base.into(),
            destination_id,
            credential,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self, NotifyError> {
        Self::new(
            cfg.notify.api_base.clone(),
            cfg.notify.destination_id.clone(),
            cfg.notify.credential.clone(),
            Duration::from_secs(cfg.app.request_timeout_secs),
        )
    }

    fn settings(&self) -> Result<(&str, &str), NotifyError> {
        let destination = self
            .destination_id
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(NotifyError::ConfigMissing(ENV_DESTINATION_ID))?;
        let credential = self
            .credential
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(NotifyError::ConfigMissing(ENV_CREDENTIAL))?;
        Ok((destination, credential))
    }

    /// Build the `sendMessage` request without sending it.
    pub fn build_request(&self, text: &str) -> Result<reqwest::Request, NotifyError> {
        let (destination, credential) = self.settings()?;
        let base = Url::parse(&self.api_base)
            .map_err(|e| NotifyError::InvalidEndpoint(format!("{}: {e}", self.api_base)))?;
        // Tokens contain ':', so the segment must not parse as a scheme.
        let endpoint = base
            .join(&format!("./bot{}/sendMessage", credential))
            .map_err(|e| NotifyError::InvalidEndpoint(e.to_string()))?;
        let request = self
            .http
            .post(endpoint)
            .form(&[("chat_id", destination), ("text", text)])
            .build()
            .map_err(transport)?;
        Ok(request)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    #[instrument(skip_all, fields(chars = message.chars().count()))]
    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        let request = self.build_request(message)?;
        let res = self.http.execute(request).await.map_err(transport)?;
        let status = res.status();
        if !status.is_success() {
            let body = match res.text().await {
                Ok(body) => body,
                Err(e) => return Err(transport(e)),
            };
            warn!(%status, "messaging API rejected the message");
            return Err(NotifyError::NonSuccessStatus { status, body });
        }
        info!("notification delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notifier(dest: Option<&str>, cred: Option<&str>) -> TelegramNotifier {
        TelegramNotifier::new(
            "https://api.telegram.org/",
            dest.map(str::to_string),
            cred.map(str::to_string),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn build_request_posts_form() {
        let n = notifier(Some("-100123"), Some("42:secret"));
        let request = n.build_request("Matcha & more").unwrap();
        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(request.url().path(), "/bot42:secret/sendMessage");
        assert_eq!(
            request
                .headers()
                .get("Content-Type")
                .and_then(|h| h.to_str().ok())
                .unwrap(),
            "application/x-www-form-urlencoded"
        );
        let body = request.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(
            std::str::from_utf8(body).unwrap(),
            "chat_id=-100123&text=Matcha+%26+more"
        );
    }

    #[tokio::test]
    async fn missing_destination_fails_before_any_call() {
        // The base URL is unroutable; reaching the network would be a Transport error.
        let n = TelegramNotifier::new(
            "http://127.0.0.1:9/",
            None,
            Some("42:secret".into()),
            Duration::from_secs(1),
        )
        .unwrap();
        match n.send("hi").await {
            Err(NotifyError::ConfigMissing(var)) => assert_eq!(var, ENV_DESTINATION_ID),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn blank_credential_counts_as_missing() {
        let n = notifier(Some("-100123"), Some("  "));
        match n.send("hi").await {
            Err(NotifyError::ConfigMissing(var)) => assert_eq!(var, ENV_CREDENTIAL),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn debug_hides_credential() {
        let n = notifier(Some("-100123"), Some("42:secret"));
        assert!(!format!("{n:?}").contains("secret"));
    }
}
