//! Outbound notifications: transactional email (SendGrid) and SMS (Twilio).
//!
//! Both channels degrade to a warn log when their credentials are not
//! configured, so a local instance works without any external accounts.

use base64::Engine;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::ApiError;

const SENDGRID_SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";
const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

// ---------------------------------------------------------------------------
// Email
// ---------------------------------------------------------------------------

/// A PDF (or other) file attached to an outgoing email.
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Serialize)]
struct MailRequest<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: EmailAddress<'a>,
    subject: &'a str,
    content: Vec<MailContent<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<MailAttachment>,
}

#[derive(Serialize)]
struct Personalization<'a> {
    to: Vec<EmailAddress<'a>>,
}

#[derive(Serialize)]
struct EmailAddress<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct MailContent<'a> {
    #[serde(rename = "type")]
    content_type: &'a str,
    value: &'a str,
}

#[derive(Serialize)]
struct MailAttachment {
    content: String,
    #[serde(rename = "type")]
    content_type: String,
    filename: String,
    disposition: &'static str,
}

/// SendGrid-backed transactional mailer.
pub struct Mailer {
    http: reqwest::Client,
    api_key: Option<String>,
    from_email: String,
}

impl Mailer {
    pub fn new(config: &ServerConfig) -> Self {
        if config.sendgrid_api_key.is_none() {
            warn!("SENDGRID_API_KEY not set, outgoing email is disabled");
        }
        Self {
            http: reqwest::Client::new(),
            api_key: config.sendgrid_api_key.clone(),
            from_email: config.from_email.clone(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// Send an HTML email. A no-op (logged) when no API key is configured.
    pub async fn send(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
        attachments: Vec<Attachment>,
    ) -> Result<(), ApiError> {
        let Some(api_key) = &self.api_key else {
            warn!(%to, %subject, "email not sent, mailer is disabled");
            return Ok(());
        };

        let attachments = attachments
            .into_iter()
            .map(|a| MailAttachment {
                content: base64::engine::general_purpose::STANDARD.encode(&a.bytes),
                content_type: a.content_type,
                filename: a.filename,
                disposition: "attachment",
            })
            .collect();

        let body = MailRequest {
            personalizations: vec![Personalization {
                to: vec![EmailAddress { email: to }],
            }],
            from: EmailAddress {
                email: &self.from_email,
            },
            subject,
            content: vec![MailContent {
                content_type: "text/html",
                value: html_body,
            }],
            attachments,
        };

        let resp = self
            .http
            .post(SENDGRID_SEND_URL)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("sendgrid: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            warn!(%status, %detail, "sendgrid rejected the message");
            return Err(ApiError::Upstream(format!("sendgrid returned {status}")));
        }

        info!(%to, %subject, "email accepted by sendgrid");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SMS
// ---------------------------------------------------------------------------

struct TwilioCreds {
    account_sid: String,
    auth_token: String,
    from_number: String,
}

/// Twilio-backed SMS sender.
pub struct Texter {
    http: reqwest::Client,
    creds: Option<TwilioCreds>,
}

impl Texter {
    pub fn new(config: &ServerConfig) -> Self {
        let creds = match (
            &config.twilio_account_sid,
            &config.twilio_auth_token,
            &config.twilio_from_number,
        ) {
            (Some(sid), Some(token), Some(from)) => Some(TwilioCreds {
                account_sid: sid.clone(),
                auth_token: token.clone(),
                from_number: from.clone(),
            }),
            _ => {
                warn!("Twilio credentials not set, outgoing SMS is disabled");
                None
            }
        };
        Self {
            http: reqwest::Client::new(),
            creds,
        }
    }

    pub fn enabled(&self) -> bool {
        self.creds.is_some()
    }

    /// Send an SMS. A no-op (logged) when Twilio is not configured.
    pub async fn send(&self, to: &str, body: &str) -> Result<(), ApiError> {
        let Some(creds) = &self.creds else {
            warn!(%to, "sms not sent, texter is disabled");
            return Ok(());
        };

        let url = format!(
            "{TWILIO_API_BASE}/Accounts/{}/Messages.json",
            creds.account_sid
        );
        let form = [
            ("To", to),
            ("From", creds.from_number.as_str()),
            ("Body", body),
        ];

        let resp = self
            .http
            .post(&url)
            .basic_auth(&creds.account_sid, Some(&creds.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("twilio: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            warn!(%status, %detail, "twilio rejected the message");
            return Err(ApiError::Upstream(format!("twilio returned {status}")));
        }

        info!(%to, "sms accepted by twilio");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_config() -> ServerConfig {
        ServerConfig::default()
    }

    #[tokio::test]
    async fn disabled_mailer_is_a_noop() {
        let mailer = Mailer::new(&bare_config());
        assert!(!mailer.enabled());
        mailer
            .send("nobody@example.com", "hi", "<p>hi</p>", Vec::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn disabled_texter_is_a_noop() {
        let texter = Texter::new(&bare_config());
        assert!(!texter.enabled());
        texter.send("+15550001111", "ping").await.unwrap();
    }

    #[test]
    fn mail_request_shape() {
        let req = MailRequest {
            personalizations: vec![Personalization {
                to: vec![EmailAddress {
                    email: "a@b.example",
                }],
            }],
            from: EmailAddress {
                email: "noreply@invoica.example",
            },
            subject: "Invoice INV-0001",
            content: vec![MailContent {
                content_type: "text/html",
                value: "<p>attached</p>",
            }],
            attachments: vec![MailAttachment {
                content: "QUJD".into(),
                content_type: "application/pdf".into(),
                filename: "INV-0001.pdf".into(),
                disposition: "attachment",
            }],
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["personalizations"][0]["to"][0]["email"], "a@b.example");
        assert_eq!(json["attachments"][0]["type"], "application/pdf");
        assert_eq!(json["attachments"][0]["disposition"], "attachment");
    }
}
