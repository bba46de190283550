// Notification dispatch over an HTTP webhook.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use teamsheet_core::config::Config;
use teamsheet_core::error::ProviderError;
use teamsheet_core::provider::{NotificationDispatcher, NotificationEvent};

/// Posts events as JSON to a configured URL.
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl WebhookNotifier {
    pub fn new(url: String, token: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, url, token })
    }
}

#[async_trait]
impl NotificationDispatcher for WebhookNotifier {
    async fn notify(&self, event: &NotificationEvent) -> Result<(), ProviderError> {
        let mut request = self.http.post(&self.url).json(event);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        response
            .error_for_status()
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        debug!("Webhook accepted event for fixture {}", event.fixture);
        Ok(())
    }
}

/// Configured notification target, or nothing.
pub enum Notifier {
    Webhook(WebhookNotifier),
    /// No webhook configured; events are dropped.
    Disabled,
}

impl Notifier {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        match &config.notifications.webhook_url {
            Some(url) => Ok(Notifier::Webhook(WebhookNotifier::new(
                url.clone(),
                config.credentials.webhook_token.clone(),
                Duration::from_secs(config.notifications.timeout_secs),
            )?)),
            None => Ok(Notifier::Disabled),
        }
    }
}

#[async_trait]
impl NotificationDispatcher for Notifier {
    async fn notify(&self, event: &NotificationEvent) -> Result<(), ProviderError> {
        match self {
            Notifier::Webhook(hook) => hook.notify(event).await,
            Notifier::Disabled => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teamsheet_core::provider::NotificationKind;

    #[tokio::test]
    async fn disabled_notifier_accepts_everything() {
        let event = NotificationEvent::now(
            "f1".into(),
            "teamA".into(),
            NotificationKind::PeriodsChanged { count: 2 },
        );
        assert!(Notifier::Disabled.notify(&event).await.is_ok());
    }

    #[tokio::test]
    async fn unreachable_webhook_reports_http_error() {
        // Port 9 (discard) on localhost is closed in test environments
        let hook = WebhookNotifier::new(
            "http://127.0.0.1:9/hook".into(),
            None,
            Duration::from_millis(500),
        )
        .unwrap();
        let event = NotificationEvent::now(
            "f1".into(),
            "teamA".into(),
            NotificationKind::PeriodsChanged { count: 1 },
        );
        assert!(matches!(hook.notify(&event).await, Err(ProviderError::Http(_))));
    }

    #[test]
    fn event_serializes_flat() {
        let event = NotificationEvent::now(
            "f1".into(),
            "teamA".into(),
            NotificationKind::SelectionSaved {
                period: teamsheet_core::types::PeriodId(2),
                players: 7,
            },
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "selection_saved");
        assert_eq!(json["period"], 2);
        assert_eq!(json["players"], 7);
        assert_eq!(json["fixture"], "f1");
    }
}
