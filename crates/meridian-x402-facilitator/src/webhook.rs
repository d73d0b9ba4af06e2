use serde::Serialize;

/// Notification fired after a successful settlement.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementWebhook {
    pub event: String,
    pub payer: String,
    /// Amount in atomic units.
    pub amount: String,
    pub transaction: Option<String>,
    pub network: String,
    pub timestamp: u64,
}

/// Validate webhook URLs at startup. Unparseable URLs are a hard error;
/// plain-HTTP URLs only warn so local development keeps working.
pub fn validate_webhook_urls(urls: &[String]) -> Result<(), String> {
    for raw in urls {
        let parsed =
            url::Url::parse(raw).map_err(|e| format!("invalid webhook URL {raw}: {e}"))?;
        match parsed.scheme() {
            "https" => {}
            "http" => tracing::warn!(
                url = %raw,
                "webhook URL does not use HTTPS, payloads will be sent in cleartext"
            ),
            other => return Err(format!("webhook URL {raw} has unsupported scheme {other}")),
        }
    }
    Ok(())
}

/// HTTP client used for webhook delivery.
pub fn webhook_client() -> reqwest::Client {
    reqwest::Client::new()
}

/// Fire-and-forget POST to each webhook URL.
/// If `hmac_secret` is provided, includes an `X-Webhook-Signature` HMAC header.
pub fn fire_webhooks(
    client: &reqwest::Client,
    urls: &[String],
    webhook: SettlementWebhook,
    hmac_secret: Option<&[u8]>,
) {
    let body_bytes = match serde_json::to_vec(&webhook) {
        Ok(b) => b,
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize webhook payload");
            return;
        }
    };

    for url in urls {
        let client = client.clone();
        let url = url.clone();
        let body = body_bytes.clone();
        let hmac_sig = hmac_secret.map(|secret| x402::hmac::compute_hmac(secret, &body));

        tokio::spawn(async move {
            let mut req = client
                .post(&url)
                .header("content-type", "application/json")
                .timeout(std::time::Duration::from_secs(5));

            if let Some(ref sig) = hmac_sig {
                req = req.header("X-Webhook-Signature", sig.as_str());
            }

            match req.body(body).send().await {
                Ok(resp) => {
                    tracing::debug!(url = %url, status = %resp.status(), "webhook delivered")
                }
                Err(e) => tracing::warn!(url = %url, error = %e, "webhook delivery failed"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn https_urls_validate() {
        assert!(validate_webhook_urls(&["https://example.com/hook".to_string()]).is_ok());
    }

    #[test]
    fn garbage_urls_fail() {
        assert!(validate_webhook_urls(&["not a url".to_string()]).is_err());
    }

    #[test]
    fn non_http_schemes_fail() {
        assert!(validate_webhook_urls(&["ftp://example.com/hook".to_string()]).is_err());
    }
}
