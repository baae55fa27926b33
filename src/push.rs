//! Outbound push notifications.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::AppError;

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("push gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("push gateway answered {0}")]
    Rejected(StatusCode),
}

impl From<PushError> for AppError {
    fn from(err: PushError) -> Self {
        AppError::PushDelivery(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushMessage<'a> {
    pub to: &'a str,
    pub title: &'a str,
    pub body: &'a str,
    pub sound: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
}

#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send_push(
        &self,
        token: &str,
        title: &str,
        body: &str,
        data: Option<Map<String, Value>>,
    ) -> Result<(), PushError>;
}

/// Posts messages to an Expo-compatible push gateway.
pub struct HttpPushSender {
    client: Client,
    endpoint: String,
}

impl HttpPushSender {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_owned(),
        })
    }
}

#[async_trait]
impl PushSender for HttpPushSender {
    async fn send_push(
        &self,
        token: &str,
        title: &str,
        body: &str,
        data: Option<Map<String, Value>>,
    ) -> Result<(), PushError> {
        let message = PushMessage {
            to: token,
            title,
            body,
            sound: "default",
            data,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&message)
            .send()
            .await?;

        let status = response.status();
        log::info!("push gateway responded {}", status);
        if !status.is_success() {
            return Err(PushError::Rejected(status));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_omits_missing_data() {
        let message = PushMessage {
            to: "ExponentPushToken[abc]",
            title: "Booking confirmed",
            body: "See you on the 5th",
            sound: "default",
            data: None,
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({
                "to": "ExponentPushToken[abc]",
                "title": "Booking confirmed",
                "body": "See you on the 5th",
                "sound": "default"
            })
        );
    }

    #[test]
    fn message_carries_data() {
        let mut data = Map::new();
        data.insert("booking_id".into(), json!(12));
        let message = PushMessage {
            to: "t",
            title: "x",
            body: "y",
            sound: "default",
            data: Some(data),
        };
        assert_eq!(serde_json::to_value(&message).unwrap()["data"]["booking_id"], 12);
    }

    #[test]
    fn rejection_maps_to_bad_gateway_error() {
        let err: AppError = PushError::Rejected(StatusCode::SERVICE_UNAVAILABLE).into();
        assert!(matches!(err, AppError::PushDelivery(ref m) if m.contains("503")));
    }
}
