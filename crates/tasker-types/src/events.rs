use serde::{Deserialize, Serialize};

/// Outbound account notifications. Delivery is best effort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Notification {
    /// Sent once after a successful signup
    Welcome { email: String, name: String },

    /// Sent once after the account and its tasks are deleted
    Goodbye { email: String, name: String },
}

impl Notification {
    pub fn email(&self) -> &str {
        match self {
            Notification::Welcome { email, .. } | Notification::Goodbye { email, .. } => email,
        }
    }

    pub fn subject(&self) -> String {
        match self {
            Notification::Welcome { .. } => "Welcome aboard!".to_string(),
            Notification::Goodbye { name, .. } => format!("Goodbye, {}!", name),
        }
    }

    pub fn body(&self) -> String {
        match self {
            Notification::Welcome { name, .. } => format!(
                "Hey {}, thanks for joining in! Let me know how you get along with the app.",
                name
            ),
            Notification::Goodbye { name, .. } => format!(
                "We are sad to see you go {}. Let us know what we could have done better. Feel free to come back to us!",
                name
            ),
        }
    }
}
