//! # Handpay Record
//!
//! The immutable report handed to a host. One record is built per client from the
//! ledger transaction plus a snapshot of machine state (progressive win details and
//! session meters) taken when the handpay became pending.

use serde::{Deserialize, Serialize};

use super::handpay_transaction::{HandpayTransaction, HandpayType};
use super::identifiers::TransactionId;
use crate::constants::levels;

/// Whether the handpay was reset to the credit meter or paid by hand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetId {
    StandardHandpay,
    ResetToCreditMeter,
}

/// Machine state captured alongside a handpay transaction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandpaySnapshot {
    pub progressive_group_id: u8,
    /// Progressive level that hit, for progressive handpays
    pub progressive_level_id: Option<u8>,
    pub session_game_pay_amount: u64,
    pub session_game_win_amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandpayRecord {
    progressive_group_id: u8,
    level_id: u8,
    amount: u64,
    partial_pay_amount: u64,
    session_game_pay_amount: u64,
    session_game_win_amount: u64,
    reset_id: ResetId,
    transaction_id: TransactionId,
}

impl HandpayRecord {
    /// Project a ledger transaction and a machine snapshot into a report record
    pub fn from_transaction(transaction: &HandpayTransaction, snapshot: &HandpaySnapshot) -> Self {
        let (progressive_group_id, level_id) = match transaction.handpay_type {
            HandpayType::Progressive => (
                snapshot.progressive_group_id,
                snapshot
                    .progressive_level_id
                    .unwrap_or(levels::NON_PROGRESSIVE_TOP_AWARD),
            ),
            HandpayType::CancelledCredit => (0, levels::CANCELLED_CREDIT),
            HandpayType::GameWin | HandpayType::BonusPay => {
                (0, levels::NON_PROGRESSIVE_TOP_AWARD)
            }
        };

        let reset_id = if transaction.key_off_type.is_credit() {
            ResetId::ResetToCreditMeter
        } else {
            ResetId::StandardHandpay
        };

        Self {
            progressive_group_id,
            level_id,
            amount: transaction.total_amount(),
            partial_pay_amount: transaction.partial_pay_amount,
            session_game_pay_amount: snapshot.session_game_pay_amount,
            session_game_win_amount: snapshot.session_game_win_amount,
            reset_id,
            transaction_id: transaction.transaction_id,
        }
    }

    pub fn progressive_group_id(&self) -> u8 {
        self.progressive_group_id
    }

    pub fn level_id(&self) -> u8 {
        self.level_id
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn partial_pay_amount(&self) -> u64 {
        self.partial_pay_amount
    }

    pub fn session_game_pay_amount(&self) -> u64 {
        self.session_game_pay_amount
    }

    pub fn session_game_win_amount(&self) -> u64 {
        self.session_game_win_amount
    }

    pub fn reset_id(&self) -> ResetId {
        self.reset_id
    }

    pub fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }
}
