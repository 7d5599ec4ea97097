use std::{env, net::SocketAddr};

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub jwt_secret: String,
    pub api_base_url: String,
    pub web_base_url: String,
    pub smtp_url: Option<String>,
    pub mail_from: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://planner.db".to_string());
        let listen_addr: SocketAddr = env::var("APP_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3333".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid APP_LISTEN_ADDR: {err}")))?;

        let jwt_secret = env::var("JWT_SECRET")
            .unwrap_or_else(|_| "change-me-super-secret-signing-key".to_string());

        let api_base_url =
            env::var("API_BASE_URL").unwrap_or_else(|_| "http://localhost:3333".to_string());
        let web_base_url =
            env::var("WEB_BASE_URL").unwrap_or_else(|_| "http://localhost:5173".to_string());

        // No SMTP url means outgoing mail is disabled, which is fine for
        // local development.
        let smtp_url = env::var("SMTP_URL").ok().filter(|url| !url.trim().is_empty());
        let mail_from = env::var("MAIL_FROM")
            .unwrap_or_else(|_| "Trip Planner <no-reply@planner.local>".to_string());

        Ok(Self {
            database_url,
            listen_addr,
            jwt_secret,
            api_base_url,
            web_base_url,
            smtp_url,
            mail_from,
        })
    }
}
