//! Telegram Bot API sink

use super::error::{NotifyError, NotifyResult};
use serde::Serialize;
use std::time::Duration;

const API_BASE: &str = "https://api.telegram.org";
pub const TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";
pub const CHAT_ID_ENV: &str = "TELEGRAM_CHAT_ID";

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

pub struct TelegramClient {
    http: reqwest::Client,
    token: String,
    chat_id: String,
}

impl TelegramClient {
    pub fn new(token: String, chat_id: String) -> NotifyResult<Self> {
        if token.trim().is_empty() || chat_id.trim().is_empty() {
            return Err(NotifyError::MissingCredentials);
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            token,
            chat_id,
        })
    }

    /// Explicit values win over the environment
    pub fn from_parts(token: Option<String>, chat_id: Option<String>) -> NotifyResult<Self> {
        let token = token
            .or_else(|| std::env::var(TOKEN_ENV).ok())
            .ok_or(NotifyError::MissingCredentials)?;
        let chat_id = chat_id
            .or_else(|| std::env::var(CHAT_ID_ENV).ok())
            .ok_or(NotifyError::MissingCredentials)?;
        Self::new(token, chat_id)
    }

    pub async fn send(&self, text: &str) -> NotifyResult<()> {
        let url = format!("{API_BASE}/bot{}/sendMessage", self.token);
        let response = self
            .http
            .post(url)
            .json(&SendMessage {
                chat_id: &self.chat_id,
                text,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
