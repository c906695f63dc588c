use crate::config::TwilioConfig;
use crate::entities::order_entity as orders;
use crate::error::{AppError, AppResult};
use crate::services::PickupCodeChannel;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SendSmsResponse {
    pub sid: String,
    pub status: String,
    pub error_code: Option<i64>,
    pub error_message: Option<String>,
}

#[derive(Clone)]
pub struct TwilioService {
    client: Client,
    config: TwilioConfig,
}

impl TwilioService {
    pub fn new(config: TwilioConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn pickup_code_message(order_id: i32, code: &str) -> String {
        format!("Your pickup code for order #{order_id} is: {code}. Show it to the restaurant when collecting your meal.")
    }

    pub async fn send_sms(&self, phone: &str, body: &str) -> AppResult<SendSmsResponse> {
        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.config.account_sid
        );

        let params = [
            ("To", phone),
            ("From", self.config.from_phone.as_str()),
            ("Body", body),
        ];

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&params)
            .send()
            .await?;

        if response.status().is_success() {
            let sent: SendSmsResponse = response.json().await?;
            log::info!("Pickup code SMS queued: sid={} status={}", sent.sid, sent.status);
            Ok(sent)
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            log::error!("Pickup code SMS failed to send, Error: {}", error_text);
            Err(AppError::ExternalApiError(format!(
                "SMS sending failed: {}",
                error_text
            )))
        }
    }
}

#[async_trait]
impl PickupCodeChannel for TwilioService {
    fn name(&self) -> &'static str {
        "twilio_sms"
    }

    async fn deliver(&self, order: &orders::Model, code: &str) -> AppResult<()> {
        let phone = order
            .customer_phone
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| {
                AppError::ExternalApiError(format!("Order {} has no customer phone", order.id))
            })?;

        let sent = self
            .send_sms(phone, &Self::pickup_code_message(order.id, code))
            .await?;
        if let Some(code) = sent.error_code {
            return Err(AppError::ExternalApiError(format!(
                "Twilio error {code}: {}",
                sent.error_message.unwrap_or_default()
            )));
        }
        Ok(())
    }
}
