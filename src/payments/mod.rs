mod mollie;
mod paypal;

pub use mollie::*;
pub use paypal::*;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Bounded timeout for all gateway calls. Once a request is in flight it is
/// not canceled provider-side; the timeout only stops waiting, and the
/// reconciliation pass picks up anything that settled after we gave up.
pub(crate) const GATEWAY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    Paypal,
    Mollie,
}

impl PaymentProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentProvider::Paypal => "paypal",
            PaymentProvider::Mollie => "mollie",
        }
    }
}

impl std::str::FromStr for PaymentProvider {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "paypal" => Ok(PaymentProvider::Paypal),
            "mollie" => Ok(PaymentProvider::Mollie),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Format integer cents as the fixed-point 2-decimal string both gateways
/// expect on the wire ("9999" cents -> "99.99").
pub fn format_amount(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Parse a caller-supplied decimal amount ("99.99", "100", "7.5") into
/// cents. Rejects zero, negatives, more than 2 decimals, and garbage.
pub fn parse_amount(s: &str) -> Result<i64> {
    let s = s.trim();
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return Err(AppError::BadRequest("Invalid amount".into()));
    }
    if frac.len() > 2 {
        return Err(AppError::BadRequest(
            "Amount has more than 2 decimal places".into(),
        ));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::BadRequest("Invalid amount".into()));
    }

    let whole: i64 = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .map_err(|_| AppError::BadRequest("Amount too large".into()))?
    };
    let frac_cents: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().map_err(|_| AppError::BadRequest("Invalid amount".into()))? * 10,
        _ => frac.parse().map_err(|_| AppError::BadRequest("Invalid amount".into()))?,
    };

    let cents = whole
        .checked_mul(100)
        .and_then(|c| c.checked_add(frac_cents))
        .ok_or_else(|| AppError::BadRequest("Amount too large".into()))?;

    if cents <= 0 {
        return Err(AppError::BadRequest("Amount must be positive".into()));
    }

    Ok(cents)
}

/// Turn a non-2xx gateway response into a typed error, consuming the body
/// for the server-side log.
pub(crate) async fn check_gateway_response(
    provider: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AppError::from_gateway_status(provider, status, body))
}
