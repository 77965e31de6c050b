use fleet_types::ScalingNotification;

/// Emits a structured event per scaling decision. Delivery is
/// best-effort: failure to deliver never rolls back the underlying
/// decision, so this deliberately swallows transport errors and only logs.
pub struct Notifier {
    client: reqwest::Client,
    webhook_url: Option<String>,
    auth_token: Option<String>,
}

impl Notifier {
    pub fn new(webhook_url: Option<String>, auth_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url,
            auth_token,
        }
    }

    pub async fn notify(&self, event: &ScalingNotification) {
        let Some(url) = &self.webhook_url else {
            tracing::info!(?event, "notification (no sink configured)");
            return;
        };
        let mut req = self.client.post(url).json(event);
        if let Some(token) = &self.auth_token {
            req = req.bearer_auth(token);
        }
        if let Err(e) = req.send().await {
            tracing::warn!(error = %e, "failed to deliver scaling notification");
        }
    }
}
