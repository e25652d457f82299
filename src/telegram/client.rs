//! Thin Bot API client over a shared `reqwest::Client`.

use std::time::Duration;

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use super::types::{BotCommand, File, Update, User};

const API_BASE: &str = "https://api.telegram.org";
/// Long-poll window for `getUpdates`, in seconds.
const POLL_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("telegram request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("telegram rejected the call: {0}")]
    Api(String),
}

/// Bot API envelope: `result` is only meaningful when `ok` is true.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T, TelegramError> {
        if self.ok {
            self.result
                .ok_or_else(|| TelegramError::Api("empty result".into()))
        } else {
            Err(TelegramError::Api(
                self.description.unwrap_or_else(|| "unknown error".into()),
            ))
        }
    }
}

#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    token: String,
}

impl Client {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: token.into(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{API_BASE}/bot{}/{method}", self.token)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: serde_json::Value,
    ) -> Result<T, TelegramError> {
        let response = self
            .http
            .post(self.method_url(method))
            .timeout(Duration::from_secs(15))
            .json(&payload)
            .send()
            .await?;
        response.json::<ApiResponse<T>>().await?.into_result()
    }

    pub async fn get_me(&self) -> Result<User, TelegramError> {
        self.call("getMe", json!({})).await
    }

    /// Long-poll for the next batch of updates at or past `offset`.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, TelegramError> {
        let payload = json!({
            "offset": offset,
            "timeout": POLL_TIMEOUT_SECS,
            "allowed_updates": ["message"],
        });
        let response = self
            .http
            .post(self.method_url("getUpdates"))
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 10))
            .json(&payload)
            .send()
            .await?;
        response.json::<ApiResponse<Vec<Update>>>().await?.into_result()
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        let _: serde_json::Value = self
            .call("sendMessage", json!({ "chat_id": chat_id, "text": text }))
            .await?;
        Ok(())
    }

    /// Like `send_message`, with Markdown formatting enabled.
    pub async fn send_message_markdown(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        let _: serde_json::Value = self
            .call(
                "sendMessage",
                json!({ "chat_id": chat_id, "text": text, "parse_mode": "Markdown" }),
            )
            .await?;
        Ok(())
    }

    /// Upload raw photo bytes with a caption.
    pub async fn send_photo(
        &self,
        chat_id: i64,
        photo: Vec<u8>,
        caption: &str,
    ) -> Result<(), TelegramError> {
        let part = Part::bytes(photo)
            .file_name("homework.jpg")
            .mime_str("image/jpeg")?;
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part("photo", part);
        let response = self
            .http
            .post(self.method_url("sendPhoto"))
            .multipart(form)
            .send()
            .await?;
        response
            .json::<ApiResponse<serde_json::Value>>()
            .await?
            .into_result()?;
        Ok(())
    }

    pub async fn get_file(&self, file_id: &str) -> Result<File, TelegramError> {
        self.call("getFile", json!({ "file_id": file_id })).await
    }

    /// Fetch the raw bytes behind a `get_file` reference.
    pub async fn download(&self, file_path: &str) -> Result<Bytes, TelegramError> {
        let url = format!("{API_BASE}/file/bot{}/{file_path}", self.token);
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?)
    }

    /// Register the static command list shown in the chat UI.
    pub async fn set_my_commands(&self, commands: &[BotCommand]) -> Result<(), TelegramError> {
        let _: bool = self
            .call("setMyCommands", json!({ "commands": commands }))
            .await?;
        Ok(())
    }
}
