use serde_json::json;
use tracing::{debug, info, warn};

use tasker_types::events::Notification;

const SENDGRID_URL: &str = "https://api.sendgrid.com/v3/mail/send";

/// Outbound account mail. Implementations must return immediately; delivery
/// failures are logged and never reach the request that triggered them.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Used when no mail provider is configured.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        info!("Notification for {}: {}", notification.email(), notification.subject());
    }
}

pub struct SendGridNotifier {
    client: reqwest::Client,
    api_key: String,
    from: String,
}

impl SendGridNotifier {
    pub fn new(api_key: String, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            from,
        }
    }
}

impl Notifier for SendGridNotifier {
    fn notify(&self, notification: Notification) {
        let payload = json!({
            "personalizations": [{ "to": [{ "email": notification.email() }] }],
            "from": { "email": self.from },
            "subject": notification.subject(),
            "content": [{ "type": "text/plain", "value": notification.body() }],
        });
        let request = self.client.post(SENDGRID_URL).bearer_auth(&self.api_key).json(&payload);

        tokio::spawn(async move {
            match request.send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!("Sent '{}' to {}", notification.subject(), notification.email());
                }
                Ok(resp) => warn!(
                    "Mail provider rejected '{}' for {}: {}",
                    notification.subject(),
                    notification.email(),
                    resp.status()
                ),
                Err(e) => warn!("Mail delivery to {} failed: {}", notification.email(), e),
            }
        });
    }
}
