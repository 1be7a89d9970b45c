//! Email channel over a mail-gateway REST endpoint

use crate::config::EmailConfig;
use crate::error::WatchError;
use crate::models::{AlertDirection, AlertEvent};
use crate::notify::{classify_status, AlertChannel, NotifyError};
use async_trait::async_trait;
use std::time::Duration;

/// Sends alert emails through a Mailgun-style `POST /messages` API.
/// The alert address is both sender and recipient.
pub struct EmailChannel {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    address: String,
}

impl EmailChannel {
    pub fn new(config: &EmailConfig, timeout: Duration) -> Result<Self, WatchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: &EmailConfig, client: reqwest::Client) -> Self {
        Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            address: config.address.clone(),
        }
    }
}

fn render_alert_html(event: &AlertEvent) -> String {
    let color = match event.direction {
        AlertDirection::Above => "green",
        AlertDirection::Below => "red",
    };
    let mut html = String::from("<h2 style='color:#2E86C1;'>Bursa Stock Alerts</h2>");
    html.push_str(
        "<table border='1' cellpadding='5' cellspacing='0' style='border-collapse: collapse;'>",
    );
    html.push_str(
        "<tr style='background-color:#f0f0f0;'><th>Stock</th><th>Price</th><th>Alert</th><th>Threshold</th></tr>",
    );
    html.push_str(&format!(
        "<tr><td>{}</td><td>{:.2}</td><td style='color:{}; font-weight:bold;'>{}</td><td>{:.2}</td></tr>",
        event.symbol,
        event.price,
        color,
        event.direction.alert_word(),
        event.threshold
    ));
    html.push_str("</table>");
    html.push_str(&format!(
        "<p style='color:#666; font-size:12px;'>Observed at {}</p>",
        event.observed_at.format("%Y-%m-%d %H:%M:%S")
    ));
    html
}

#[async_trait]
impl AlertChannel for EmailChannel {
    fn name(&self) -> &str {
        "email"
    }

    async fn send(&self, event: &AlertEvent) -> Result<(), NotifyError> {
        let subject = format!(
            "Bursa Stock Alert: {} {}",
            event.symbol,
            event.direction.alert_word()
        );
        let html = render_alert_html(event);

        let response = self
            .client
            .post(format!("{}/messages", self.api_url))
            .basic_auth("api", Some(&self.api_key))
            .form(&[
                ("from", self.address.as_str()),
                ("to", self.address.as_str()),
                ("subject", subject.as_str()),
                ("html", html.as_str()),
            ])
            .send()
            .await
            .map_err(NotifyError::from_http)?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status("email", status));
        }
        Ok(())
    }
}
