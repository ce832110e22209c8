use serde::{Deserialize, Serialize};

/// One immutable ledger entry. Balance is always derived by folding over
/// completed rows; no stored total exists anywhere. The only permitted
/// mutation is the one-shot pending -> completed|failed status settle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: String,
    pub account_id: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// Positive cents; the kind decides the sign in the balance fold.
    pub amount_cents: i64,
    pub description: String,
    pub status: TransactionStatus,
    pub payment_method: Option<PaymentMethod>,
    /// Set on settlement credits - at most one credit per intent.
    pub intent_id: Option<String>,
    /// Set on refund-workflow credits - at most one per request.
    pub refund_request_id: Option<String>,
    pub created_at: i64,
    /// Derived, never stored: a pending bank transfer the account holder
    /// may still cancel before administrative confirmation.
    pub deletable: bool,
}

impl WalletTransaction {
    pub fn is_deletable(status: TransactionStatus, method: Option<PaymentMethod>) -> bool {
        status == TransactionStatus::Pending && method == Some(PaymentMethod::BankTransfer)
    }
}

/// Data required to append a ledger entry.
#[derive(Debug, Clone)]
pub struct CreateWalletTransaction {
    pub account_id: String,
    pub kind: TransactionKind,
    pub amount_cents: i64,
    pub description: String,
    pub status: TransactionStatus,
    pub payment_method: Option<PaymentMethod>,
    pub intent_id: Option<String>,
    pub refund_request_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Credit,
    Debit,
    Refund,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Credit => "credit",
            Self::Debit => "debit",
            Self::Refund => "refund",
        }
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit" => Ok(Self::Credit),
            "debit" => Ok(Self::Debit),
            "refund" => Ok(Self::Refund),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    BankTransfer,
    Card,
    Paypal,
    Mollie,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BankTransfer => "bank_transfer",
            Self::Card => "card",
            Self::Paypal => "paypal",
            Self::Mollie => "mollie",
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bank_transfer" => Ok(Self::BankTransfer),
            "card" => Ok(Self::Card),
            "paypal" => Ok(Self::Paypal),
            "mollie" => Ok(Self::Mollie),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pending_bank_transfers_are_deletable() {
        assert!(WalletTransaction::is_deletable(
            TransactionStatus::Pending,
            Some(PaymentMethod::BankTransfer)
        ));
        assert!(!WalletTransaction::is_deletable(
            TransactionStatus::Completed,
            Some(PaymentMethod::BankTransfer)
        ));
        assert!(!WalletTransaction::is_deletable(
            TransactionStatus::Pending,
            Some(PaymentMethod::Card)
        ));
        assert!(!WalletTransaction::is_deletable(TransactionStatus::Pending, None));
    }
}
