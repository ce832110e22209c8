use axum::http::HeaderMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::PayPalConfig;
use crate::error::{AppError, Result};
use crate::payments::{check_gateway_response, format_amount, GATEWAY_TIMEOUT};

const PROVIDER: &str = "paypal";

// ============ REST payloads ============

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
struct Money<'a> {
    currency_code: &'a str,
    value: String,
}

#[derive(Debug, Serialize)]
struct PurchaseUnit<'a> {
    amount: Money<'a>,
    description: &'a str,
    custom_id: &'a str,
    invoice_id: &'a str,
}

#[derive(Debug, Serialize)]
struct ApplicationContext<'a> {
    return_url: &'a str,
    cancel_url: &'a str,
    user_action: &'static str,
}

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    intent: &'static str,
    purchase_units: Vec<PurchaseUnit<'a>>,
    application_context: ApplicationContext<'a>,
}

#[derive(Debug, Deserialize)]
pub struct PayPalLink {
    pub href: String,
    pub rel: String,
}

/// Order representation returned by create/capture/get.
#[derive(Debug, Deserialize)]
pub struct PayPalOrder {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub links: Vec<PayPalLink>,
}

impl PayPalOrder {
    /// Buyer-facing approval URL from the hypermedia links.
    pub fn approve_url(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|l| l.rel == "approve")
            .map(|l| l.href.as_str())
    }
}

#[derive(Debug, Serialize)]
struct RefundRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    amount: Option<Money<'a>>,
}

#[derive(Debug, Deserialize)]
pub struct PayPalRefund {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
struct VerifySignatureRequest<'a> {
    transmission_id: &'a str,
    transmission_time: &'a str,
    cert_url: &'a str,
    auth_algo: &'a str,
    transmission_sig: &'a str,
    webhook_id: &'a str,
    webhook_event: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct VerifySignatureResponse {
    verification_status: String,
}

// ============ Webhook event shape ============

/// Typed PayPal webhook event, decoded at the trust boundary before any
/// business logic runs.
#[derive(Debug, Deserialize)]
pub struct PayPalWebhookEvent {
    pub id: String,
    pub event_type: String,
    pub resource: PayPalEventResource,
}

#[derive(Debug, Deserialize)]
pub struct PayPalEventResource {
    /// Order ID for CHECKOUT.* events, capture ID for PAYMENT.CAPTURE.*.
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    /// Echo of the custom_id set at order creation - our correlation ID.
    #[serde(default)]
    pub custom_id: Option<String>,
    #[serde(default)]
    pub invoice_id: Option<String>,
}

/// The five transmission headers PayPal signs each delivery with.
/// Extracted up front so a forged request missing any of them is rejected
/// before any network round trip.
#[derive(Debug)]
pub struct PayPalTransmission {
    transmission_id: String,
    transmission_time: String,
    cert_url: String,
    auth_algo: String,
    transmission_sig: String,
}

impl PayPalTransmission {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self> {
        let get = |name: &str| -> Result<String> {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string())
                .ok_or_else(|| AppError::BadRequest(format!("Missing {} header", name)))
        };

        Ok(Self {
            transmission_id: get("paypal-transmission-id")?,
            transmission_time: get("paypal-transmission-time")?,
            cert_url: get("paypal-cert-url")?,
            auth_algo: get("paypal-auth-algo")?,
            transmission_sig: get("paypal-transmission-sig")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PayPalClient {
    client: Client,
    config: PayPalConfig,
}

impl PayPalClient {
    pub fn new(config: PayPalConfig) -> Self {
        let client = Client::builder()
            .timeout(GATEWAY_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");
        Self { client, config }
    }

    fn base_url(&self) -> &'static str {
        self.config.base_url()
    }

    /// Trade client credentials for a fresh bearer token. Tokens are not
    /// cached or persisted; every authenticated call obtains its own.
    async fn access_token(&self) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/v1/oauth2/token", self.base_url()))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await
            .map_err(|e| AppError::from_reqwest(PROVIDER, e))?;

        let response = check_gateway_response(PROVIDER, response).await?;
        let token: AccessTokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse PayPal token response: {}", e)))?;

        Ok(token.access_token)
    }

    /// Create a CAPTURE-intent order and return (order id, approval URL).
    ///
    /// `correlation_id` is stored as both custom_id and invoice_id so the
    /// capture webhooks echo it back for intent lookup.
    pub async fn create_order(
        &self,
        amount_cents: i64,
        currency: &str,
        description: &str,
        correlation_id: &str,
        return_url: &str,
        cancel_url: &str,
    ) -> Result<(String, String)> {
        let token = self.access_token().await?;

        let request = CreateOrderRequest {
            intent: "CAPTURE",
            purchase_units: vec![PurchaseUnit {
                amount: Money {
                    currency_code: currency,
                    value: format_amount(amount_cents),
                },
                description,
                custom_id: correlation_id,
                invoice_id: correlation_id,
            }],
            application_context: ApplicationContext {
                return_url,
                cancel_url,
                user_action: "PAY_NOW",
            },
        };

        let response = self
            .client
            .post(format!("{}/v2/checkout/orders", self.base_url()))
            .bearer_auth(&token)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::from_reqwest(PROVIDER, e))?;

        let response = check_gateway_response(PROVIDER, response).await?;
        let order: PayPalOrder = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse PayPal order: {}", e)))?;

        let approve_url = order.approve_url().ok_or_else(|| AppError::Gateway {
            provider: PROVIDER,
            http_status: None,
            message: format!("Order {} has no approval link", order.id),
            retryable: false,
        })?;

        tracing::info!(
            "PayPal order created: id={}, status={}, amount={}",
            order.id,
            order.status,
            format_amount(amount_cents)
        );

        Ok((order.id.clone(), approve_url.to_string()))
    }

    /// Capture an approved order.
    pub async fn capture_order(&self, order_id: &str) -> Result<PayPalOrder> {
        let token = self.access_token().await?;

        let response = self
            .client
            .post(format!(
                "{}/v2/checkout/orders/{}/capture",
                self.base_url(),
                order_id
            ))
            .bearer_auth(&token)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| AppError::from_reqwest(PROVIDER, e))?;

        let response = check_gateway_response(PROVIDER, response).await?;
        let order: PayPalOrder = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse PayPal capture: {}", e)))?;

        tracing::info!("PayPal order captured: id={}, status={}", order.id, order.status);
        Ok(order)
    }

    /// Fetch current order state (reconciliation path).
    pub async fn get_order(&self, order_id: &str) -> Result<PayPalOrder> {
        let token = self.access_token().await?;

        let response = self
            .client
            .get(format!("{}/v2/checkout/orders/{}", self.base_url(), order_id))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| AppError::from_reqwest(PROVIDER, e))?;

        let response = check_gateway_response(PROVIDER, response).await?;
        response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse PayPal order: {}", e)))
    }

    /// Refund a captured payment. `amount_cents = None` refunds in full.
    pub async fn refund_capture(
        &self,
        capture_id: &str,
        amount_cents: Option<i64>,
        currency: &str,
    ) -> Result<String> {
        let token = self.access_token().await?;

        let request = RefundRequest {
            amount: amount_cents.map(|cents| Money {
                currency_code: currency,
                value: format_amount(cents),
            }),
        };

        let response = self
            .client
            .post(format!(
                "{}/v2/payments/captures/{}/refund",
                self.base_url(),
                capture_id
            ))
            .bearer_auth(&token)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::from_reqwest(PROVIDER, e))?;

        let response = check_gateway_response(PROVIDER, response).await?;
        let refund: PayPalRefund = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse PayPal refund: {}", e)))?;

        tracing::info!("PayPal capture refunded: id={}, status={}", refund.id, refund.status);
        Ok(refund.id)
    }

    /// Ask PayPal whether a webhook delivery is authentic. Only an explicit
    /// `SUCCESS` verification status is accepted.
    pub async fn verify_webhook(
        &self,
        transmission: &PayPalTransmission,
        raw_body: &[u8],
    ) -> Result<bool> {
        let webhook_event: serde_json::Value = serde_json::from_slice(raw_body)
            .map_err(|e| AppError::BadRequest(format!("Invalid webhook body: {}", e)))?;

        let request = VerifySignatureRequest {
            transmission_id: &transmission.transmission_id,
            transmission_time: &transmission.transmission_time,
            cert_url: &transmission.cert_url,
            auth_algo: &transmission.auth_algo,
            transmission_sig: &transmission.transmission_sig,
            webhook_id: &self.config.webhook_id,
            webhook_event,
        };

        let token = self.access_token().await?;

        let response = self
            .client
            .post(format!(
                "{}/v1/notifications/verify-webhook-signature",
                self.base_url()
            ))
            .bearer_auth(&token)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::from_reqwest(PROVIDER, e))?;

        if !response.status().is_success() {
            tracing::warn!(
                "PayPal signature verification endpoint returned {}",
                response.status()
            );
            return Ok(false);
        }

        let result: VerifySignatureResponse = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse verification response: {}", e)))?;

        Ok(result.verification_status == "SUCCESS")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approve_url_picks_the_approve_rel() {
        let order = PayPalOrder {
            id: "5O190127TN364715T".into(),
            status: "CREATED".into(),
            links: vec![
                PayPalLink {
                    href: "https://api-m.paypal.com/v2/checkout/orders/5O1".into(),
                    rel: "self".into(),
                },
                PayPalLink {
                    href: "https://www.paypal.com/checkoutnow?token=5O1".into(),
                    rel: "approve".into(),
                },
            ],
        };
        assert_eq!(
            order.approve_url(),
            Some("https://www.paypal.com/checkoutnow?token=5O1")
        );
    }

    #[test]
    fn missing_transmission_header_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert("paypal-transmission-id", "t-1".parse().unwrap());
        // the other four are absent
        assert!(PayPalTransmission::from_headers(&headers).is_err());
    }

    #[test]
    fn full_transmission_headers_extract() {
        let mut headers = HeaderMap::new();
        for (name, value) in [
            ("paypal-transmission-id", "t-1"),
            ("paypal-transmission-time", "2026-01-01T00:00:00Z"),
            ("paypal-cert-url", "https://api.paypal.com/cert"),
            ("paypal-auth-algo", "SHA256withRSA"),
            ("paypal-transmission-sig", "sig=="),
        ] {
            headers.insert(name, value.parse().unwrap());
        }
        assert!(PayPalTransmission::from_headers(&headers).is_ok());
    }

    #[test]
    fn webhook_event_decodes_capture_payload() {
        let body = serde_json::json!({
            "id": "WH-58D329510W468432D-8HN650336L201105X",
            "event_type": "PAYMENT.CAPTURE.COMPLETED",
            "resource": {
                "id": "42311647XV020574X",
                "status": "COMPLETED",
                "custom_id": "ORDER-123",
                "invoice_id": "ORDER-123"
            }
        });
        let event: PayPalWebhookEvent = serde_json::from_value(body).unwrap();
        assert_eq!(event.event_type, "PAYMENT.CAPTURE.COMPLETED");
        assert_eq!(event.resource.custom_id.as_deref(), Some("ORDER-123"));
    }
}
