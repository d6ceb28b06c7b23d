use proptest::prelude::*;
use handpay_reporting::models::{HandpayRecord, HandpaySnapshot, HandpayTransaction, HandpayType};

/// Strategy for queue capacities seen in the field
pub fn capacity_strategy() -> impl Strategy<Value = usize> {
    1usize..=8
}

/// Strategy for a run of distinct, increasing transaction ids
pub fn transaction_ids_strategy() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(1i64..1_000, 0..24).prop_map(|gaps| {
        gaps.into_iter()
            .scan(0i64, |next, gap| {
                *next += gap;
                Some(*next)
            })
            .collect()
    })
}

pub fn handpay_type_strategy() -> impl Strategy<Value = HandpayType> {
    prop_oneof![
        Just(HandpayType::GameWin),
        Just(HandpayType::BonusPay),
        Just(HandpayType::CancelledCredit),
        Just(HandpayType::Progressive),
    ]
}

pub fn record_for(id: i64, handpay_type: HandpayType) -> HandpayRecord {
    let tx = HandpayTransaction::requested(id, id as u64, handpay_type, 500);
    HandpayRecord::from_transaction(&tx, &HandpaySnapshot::default())
}
