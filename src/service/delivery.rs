//! Code Delivery
//!
//! The delivery collaborator: hands raw one-time codes to an SMTP relay or
//! an HTTP SMS gateway. Callers treat sends as fire-and-forget; a delivery
//! failure never rolls back the challenge that triggered it.

use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;

use crate::config::{SmsConfig, SmtpConfig};
use crate::models::otp::OtpPurpose;
use crate::utils::error::{AppError, AppResult};

/// Delivery collaborator errors
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("delivery rejected: {0}")]
    Rejected(String),

    #[error("no delivery channel configured for destination {0}")]
    NoChannel(String),
}

/// Hands a one-time code to a destination out of band
#[async_trait]
pub trait CodeDelivery: Send + Sync {
    async fn send(
        &self,
        destination: &str,
        purpose: OtpPurpose,
        code: &str,
    ) -> Result<(), DeliveryError>;
}

fn subject_for(purpose: OtpPurpose) -> &'static str {
    match purpose {
        OtpPurpose::PhoneVerification => "Confirm your contact details",
        OtpPurpose::PasswordReset => "Your password reset code",
        OtpPurpose::Login => "Your sign-in code",
        OtpPurpose::GuestCheckout => "Confirm your order",
    }
}

fn body_for(purpose: OtpPurpose, code: &str) -> String {
    format!(
        "Your {} code is {}. It expires in {} minutes. \
         If you did not request it, you can ignore this message.",
        match purpose {
            OtpPurpose::PhoneVerification => "verification",
            OtpPurpose::PasswordReset => "password reset",
            OtpPurpose::Login => "sign-in",
            OtpPurpose::GuestCheckout => "checkout confirmation",
        },
        code,
        purpose.policy().code_ttl_seconds / 60,
    )
}

/// Email delivery over async SMTP
pub struct SmtpCodeDelivery {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpCodeDelivery {
    pub fn new(config: &SmtpConfig) -> AppResult<Self> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| AppError::Internal(format!("Failed to configure SMTP relay: {e}")))?
            .port(config.port)
            .credentials(creds)
            .build();

        Ok(Self {
            transport,
            from: format!("{} <{}>", config.from_name, config.from_email),
        })
    }
}

#[async_trait]
impl CodeDelivery for SmtpCodeDelivery {
    async fn send(
        &self,
        destination: &str,
        purpose: OtpPurpose,
        code: &str,
    ) -> Result<(), DeliveryError> {
        let message = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| DeliveryError::Rejected(format!("invalid sender: {e}")))?,
            )
            .to(destination
                .parse()
                .map_err(|e| DeliveryError::Rejected(format!("invalid recipient: {e}")))?)
            .subject(subject_for(purpose))
            .header(ContentType::TEXT_PLAIN)
            .body(body_for(purpose, code))
            .map_err(|e| DeliveryError::Rejected(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| DeliveryError::Rejected(e.to_string()))?;

        log::debug!("sent {} code email to {}", purpose, destination);
        Ok(())
    }
}

/// SMS delivery through an HTTP gateway
pub struct SmsGatewayDelivery {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    sender_id: String,
}

impl SmsGatewayDelivery {
    pub fn new(config: &SmsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            sender_id: config.sender_id.clone(),
        }
    }
}

#[async_trait]
impl CodeDelivery for SmsGatewayDelivery {
    async fn send(
        &self,
        destination: &str,
        purpose: OtpPurpose,
        code: &str,
    ) -> Result<(), DeliveryError> {
        let payload = serde_json::json!({
            "to": destination,
            "from": self.sender_id,
            "message": body_for(purpose, code),
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Rejected(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DeliveryError::Rejected(format!(
                "gateway answered {}",
                response.status()
            )));
        }

        log::debug!("sent {} code SMS to {}", purpose, destination);
        Ok(())
    }
}

/// Routes codes to email or SMS based on the destination's shape. Either
/// channel may be absent; sending to a channel that is not configured
/// reports `NoChannel`.
pub struct DeliveryRouter {
    email: Option<SmtpCodeDelivery>,
    sms: Option<SmsGatewayDelivery>,
}

impl DeliveryRouter {
    pub fn new(email: Option<SmtpCodeDelivery>, sms: Option<SmsGatewayDelivery>) -> Self {
        Self { email, sms }
    }
}

#[async_trait]
impl CodeDelivery for DeliveryRouter {
    async fn send(
        &self,
        destination: &str,
        purpose: OtpPurpose,
        code: &str,
    ) -> Result<(), DeliveryError> {
        if destination.contains('@') {
            match &self.email {
                Some(channel) => channel.send(destination, purpose, code).await,
                None => Err(DeliveryError::NoChannel(destination.to_string())),
            }
        } else {
            match &self.sms {
                Some(channel) => channel.send(destination, purpose, code).await,
                None => Err(DeliveryError::NoChannel(destination.to_string())),
            }
        }
    }
}
