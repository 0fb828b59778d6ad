use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    /// Mail is only sent when a provider key is set.
    pub sendgrid_api_key: Option<String>,
    pub mail_from: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let jwt_secret = std::env::var("TASKER_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("TASKER_JWT_SECRET is unset or still a placeholder");
        }

        let port = std::env::var("TASKER_PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .context("TASKER_PORT must be a port number")?;

        Ok(Self {
            host: std::env::var("TASKER_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            db_path: std::env::var("TASKER_DB_PATH")
                .unwrap_or_else(|_| "tasker.db".into())
                .into(),
            jwt_secret,
            sendgrid_api_key: std::env::var("SENDGRID_API_KEY").ok().filter(|k| !k.is_empty()),
            mail_from: std::env::var("TASKER_MAIL_FROM")
                .unwrap_or_else(|_| "no-reply@tasker.local".into()),
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}
