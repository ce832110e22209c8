use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::MollieConfig;
use crate::error::{AppError, Result};
use crate::payments::{check_gateway_response, format_amount, GATEWAY_TIMEOUT};

const PROVIDER: &str = "mollie";

// ============ REST payloads ============

#[derive(Debug, Serialize, Deserialize)]
pub struct MollieAmount {
    /// Fixed-point decimal string, e.g. "99.99"
    pub value: String,
    pub currency: String,
}

#[derive(Debug, Serialize)]
struct CreatePaymentRequest<'a> {
    amount: MollieAmount,
    description: &'a str,
    #[serde(rename = "redirectUrl")]
    redirect_url: &'a str,
    #[serde(rename = "webhookUrl")]
    webhook_url: &'a str,
    metadata: MollieMetadata,
}

/// Correlation data we attach at creation and read back on fetch.
#[derive(Debug, Serialize, Deserialize)]
pub struct MollieMetadata {
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MollieLink {
    pub href: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct MollieLinks {
    #[serde(default)]
    pub checkout: Option<MollieLink>,
}

/// Payment representation returned by create/fetch. On the webhook path the
/// fetched copy of this struct is the only thing we trust - never the
/// webhook body's claims.
#[derive(Debug, Deserialize)]
pub struct MolliePayment {
    pub id: String,
    #[serde(default)]
    pub mode: Option<String>,
    pub status: String,
    pub amount: MollieAmount,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Option<MollieMetadata>,
    #[serde(rename = "_links", default)]
    pub links: MollieLinks,
}

impl MolliePayment {
    pub fn checkout_url(&self) -> Option<&str> {
        self.links.checkout.as_ref().map(|l| l.href.as_str())
    }
}

#[derive(Debug, Serialize)]
struct CreateRefundRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    amount: Option<MollieAmount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MollieRefund {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct MollieClient {
    client: Client,
    config: MollieConfig,
}

impl MollieClient {
    pub fn new(config: MollieConfig) -> Self {
        let client = Client::builder()
            .timeout(GATEWAY_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");
        Self { client, config }
    }

    fn base_url(&self) -> &'static str {
        self.config.base_url()
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .bearer_auth(&self.config.api_key)
            .header("Content-Type", "application/json")
    }

    /// Create a payment and return (payment id, checkout URL).
    ///
    /// Mollie settles without an explicit capture call; the status webhook
    /// is the only completion signal. A create response without a checkout
    /// link is a hard error - there is nothing to retry.
    pub async fn create_payment(
        &self,
        amount_cents: i64,
        currency: &str,
        description: &str,
        correlation_id: &str,
        account_id: &str,
        redirect_url: &str,
        webhook_url: &str,
    ) -> Result<(String, String)> {
        let request = CreatePaymentRequest {
            amount: MollieAmount {
                value: format_amount(amount_cents),
                currency: currency.to_string(),
            },
            description,
            redirect_url,
            webhook_url,
            metadata: MollieMetadata {
                order_id: Some(correlation_id.to_string()),
                account_id: Some(account_id.to_string()),
            },
        };

        let response = self
            .authorized(self.client.post(format!("{}/payments", self.base_url())))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::from_reqwest(PROVIDER, e))?;

        let response = check_gateway_response(PROVIDER, response).await?;
        let payment: MolliePayment = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse Mollie payment: {}", e)))?;

        let checkout_url = payment.checkout_url().ok_or_else(|| AppError::Gateway {
            provider: PROVIDER,
            http_status: None,
            message: format!("Payment {} has no checkout link", payment.id),
            retryable: false,
        })?;

        tracing::info!(
            "Mollie payment created: id={}, status={}, amount={}",
            payment.id,
            payment.status,
            payment.amount.value
        );

        Ok((payment.id.clone(), checkout_url.to_string()))
    }

    /// Fetch a payment by ID. This is both fetchStatus and the webhook
    /// trust anchor: a forged webhook cannot forge what this returns.
    pub async fn get_payment(&self, payment_id: &str) -> Result<MolliePayment> {
        let response = self
            .authorized(
                self.client
                    .get(format!("{}/payments/{}", self.base_url(), payment_id)),
            )
            .send()
            .await
            .map_err(|e| AppError::from_reqwest(PROVIDER, e))?;

        let response = check_gateway_response(PROVIDER, response).await?;
        response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse Mollie payment: {}", e)))
    }

    /// Cancel a payment that has not completed yet. The resulting status
    /// change arrives through the regular webhook/sync path.
    pub async fn cancel_payment(&self, payment_id: &str) -> Result<MolliePayment> {
        let response = self
            .authorized(
                self.client
                    .delete(format!("{}/payments/{}", self.base_url(), payment_id)),
            )
            .send()
            .await
            .map_err(|e| AppError::from_reqwest(PROVIDER, e))?;

        let response = check_gateway_response(PROVIDER, response).await?;
        let payment: MolliePayment = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse Mollie payment: {}", e)))?;

        tracing::info!("Mollie payment canceled: id={}, status={}", payment.id, payment.status);
        Ok(payment)
    }

    /// Refund a paid payment. `amount_cents = None` refunds in full.
    pub async fn refund_payment(
        &self,
        payment_id: &str,
        amount_cents: Option<i64>,
        currency: &str,
        description: Option<&str>,
    ) -> Result<String> {
        let request = CreateRefundRequest {
            amount: amount_cents.map(|cents| MollieAmount {
                value: format_amount(cents),
                currency: currency.to_string(),
            }),
            description: description.map(|d| d.to_string()),
        };

        let response = self
            .authorized(self.client.post(format!(
                "{}/payments/{}/refunds",
                self.base_url(),
                payment_id
            )))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::from_reqwest(PROVIDER, e))?;

        let response = check_gateway_response(PROVIDER, response).await?;
        let refund: MollieRefund = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse Mollie refund: {}", e)))?;

        tracing::info!(
            "Mollie refund created: id={}, payment={}, status={}",
            refund.id,
            payment_id,
            refund.status
        );
        Ok(refund.id)
    }
}
