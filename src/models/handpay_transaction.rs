use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::identifiers::TransactionId;

/// Ledger lifecycle of a handpay transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandpayState {
    /// Handpay was requested and the machine is locked up waiting for key-off
    Requested,
    /// Key-off is in progress
    Pending,
    /// Key-off completed and the payout was committed to the meters
    Committed,
    /// Committed and acknowledged by the validating host
    Acknowledged,
}

impl HandpayState {
    /// Check if the financial obligation behind this handpay has been closed out
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Committed | Self::Acknowledged)
    }
}

impl fmt::Display for HandpayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested => write!(f, "requested"),
            Self::Pending => write!(f, "pending"),
            Self::Committed => write!(f, "committed"),
            Self::Acknowledged => write!(f, "acknowledged"),
        }
    }
}

/// What caused the handpay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandpayType {
    GameWin,
    BonusPay,
    CancelledCredit,
    Progressive,
}

/// How the handpay was keyed off by the attendant or host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyOffType {
    LocalHandpay,
    LocalVoucher,
    LocalWat,
    LocalCredit,
    RemoteHandpay,
    RemoteVoucher,
    RemoteWat,
    RemoteCredit,
    Cancelled,
    Unknown,
}

impl KeyOffType {
    /// Check if the payout was moved onto the credit meter instead of paid by hand
    pub fn is_credit(&self) -> bool {
        matches!(self, Self::LocalCredit | Self::RemoteCredit)
    }
}

/// Externally owned financial record of a handpay.
///
/// The reporting core never creates or deletes these. It reads them from the
/// ledger and only flips `read` back through the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandpayTransaction {
    pub transaction_id: TransactionId,
    /// Monotonic ledger sequence, used to find the oldest outstanding handpay
    pub log_sequence: u64,
    pub state: HandpayState,
    /// Set once every interested host has been told the handpay was reset
    pub read: bool,
    pub handpay_type: HandpayType,
    pub key_off_type: KeyOffType,
    pub cashable_amount: u64,
    pub promo_amount: u64,
    pub non_cash_amount: u64,
    pub partial_pay_amount: u64,
    pub transaction_time: DateTime<Utc>,
}

impl HandpayTransaction {
    /// Create a freshly requested handpay with only cashable credits
    pub fn requested(
        transaction_id: i64,
        log_sequence: u64,
        handpay_type: HandpayType,
        cashable_amount: u64,
    ) -> Self {
        Self {
            transaction_id: TransactionId(transaction_id),
            log_sequence,
            state: HandpayState::Requested,
            read: false,
            handpay_type,
            key_off_type: KeyOffType::Unknown,
            cashable_amount,
            promo_amount: 0,
            non_cash_amount: 0,
            partial_pay_amount: 0,
            transaction_time: Utc::now(),
        }
    }

    /// Sum of all credit types, clamped at `u64::MAX`
    pub fn total_amount(&self) -> u64 {
        self.cashable_amount
            .saturating_add(self.promo_amount)
            .saturating_add(self.non_cash_amount)
    }

    pub fn is_resolved(&self) -> bool {
        self.state.is_resolved()
    }

    /// A game-win jackpot that ended up on the credit meter instead of being paid by hand
    pub fn is_jackpot_keyed_off_to_credits(&self) -> bool {
        self.handpay_type == HandpayType::GameWin && self.key_off_type.is_credit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolved_states() {
        assert!(!HandpayState::Requested.is_resolved());
        assert!(!HandpayState::Pending.is_resolved());
        assert!(HandpayState::Committed.is_resolved());
        assert!(HandpayState::Acknowledged.is_resolved());
    }

    #[test]
    fn test_total_amount_sums_all_credit_types() {
        let mut tx = HandpayTransaction::requested(1, 1, HandpayType::GameWin, 500);
        tx.promo_amount = 20;
        tx.non_cash_amount = 5;
        assert_eq!(tx.total_amount(), 525);
    }

    #[test]
    fn test_jackpot_to_credits_requires_game_win_and_credit_key_off() {
        let mut tx = HandpayTransaction::requested(1, 1, HandpayType::GameWin, 500);
        tx.key_off_type = KeyOffType::LocalCredit;
        assert!(tx.is_jackpot_keyed_off_to_credits());

        tx.key_off_type = KeyOffType::LocalHandpay;
        assert!(!tx.is_jackpot_keyed_off_to_credits());

        tx.handpay_type = HandpayType::CancelledCredit;
        tx.key_off_type = KeyOffType::RemoteCredit;
        assert!(!tx.is_jackpot_keyed_off_to_credits());
    }

    #[test]
    fn test_total_amount_saturates() {
        let mut tx = HandpayTransaction::requested(1, 1, HandpayType::BonusPay, u64::MAX);
        tx.promo_amount = 10;
        tx.non_cash_amount = u64::MAX;
        assert_eq!(tx.total_amount(), u64::MAX);
    }
}
