//! Prefixed ID generation for tally entities.
//!
//! All internally-minted IDs use a `ty_` brand prefix so they can never
//! collide with provider-issued IDs (PayPal order IDs, Mollie `tr_`/`re_`
//! IDs). Payment intents are the exception: their primary key IS the
//! provider-issued payment/order ID.
//!
//! Format: `ty_{entity}_{uuid_simple}` (32 hex chars, no hyphens)

use uuid::Uuid;

const ALL_PREFIXES: &[&str] = &["ty_txn_", "ty_ref_", "ty_evt_"];

/// Validate that a string is a valid tally prefixed ID.
///
/// Cheap format check to reject garbage before hitting the database.
pub fn is_valid_prefixed_id(s: &str) -> bool {
    let Some(prefix) = ALL_PREFIXES.iter().find(|p| s.starts_with(*p)) else {
        return false;
    };

    let hex_part = &s[prefix.len()..];
    hex_part.len() == 32 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
}

/// Entity types that have prefixed IDs.
#[derive(Debug, Clone, Copy)]
pub enum EntityType {
    WalletTransaction,
    RefundRequest,
    WebhookEvent,
}

impl EntityType {
    fn prefix(self) -> &'static str {
        match self {
            EntityType::WalletTransaction => "ty_txn_",
            EntityType::RefundRequest => "ty_ref_",
            EntityType::WebhookEvent => "ty_evt_",
        }
    }
}

/// Generate a new prefixed ID for the given entity type.
pub fn generate(entity: EntityType) -> String {
    format!("{}{}", entity.prefix(), Uuid::new_v4().simple())
}
