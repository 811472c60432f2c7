//! Late-checkout fee and ban policy.
//!
//! Lateness is always derived from the wall clock at read time; nothing in
//! this module is cached.

use serde::Serialize;

use crate::types::{Cents, Timestamp};

/// Lateness below this many minutes is free.
pub const FIRST_TIER_MINUTES: i64 = 30;

/// Lateness at or above this many minutes moves to the second fee tier.
pub const SECOND_TIER_MINUTES: i64 = 60;

/// Lateness at or above this many minutes also bans the customer.
pub const BAN_THRESHOLD_MINUTES: i64 = 90;

/// Fee for the first late tier.
pub const FIRST_TIER_FEE: Cents = Cents::dollars(15);

/// Fee for the second late tier (and above).
pub const SECOND_TIER_FEE: Cents = Cents::dollars(35);

/// How long a ban lasts once applied.
pub const BAN_DURATION_DAYS: i64 = 30;

/// Result of evaluating the policy for a given lateness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LateFee {
    pub amount: Cents,
    pub ban: bool,
}

impl LateFee {
    pub const NONE: LateFee = LateFee {
        amount: Cents::ZERO,
        ban: false,
    };
}

/// Full read-time lateness assessment for a scheduled checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LateAssessment {
    pub late_minutes: i64,
    pub late_fee_amount: Cents,
    pub ban_applied: bool,
}

/// Late-fee policy with its configuration injected.
///
/// `demo_mode` suppresses every fee and ban, for rehearsals on a live
/// floor. It is checked before any tier is evaluated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LateFeePolicy {
    pub demo_mode: bool,
}

impl LateFeePolicy {
    pub fn new(demo_mode: bool) -> Self {
        Self { demo_mode }
    }

    /// Map whole minutes of lateness to a fee and ban decision.
    pub fn calculate(&self, late_minutes: i64) -> LateFee {
        if self.demo_mode {
            return LateFee::NONE;
        }

        match late_minutes {
            m if m < FIRST_TIER_MINUTES => LateFee::NONE,
            m if m < SECOND_TIER_MINUTES => LateFee {
                amount: FIRST_TIER_FEE,
                ban: false,
            },
            m if m < BAN_THRESHOLD_MINUTES => LateFee {
                amount: SECOND_TIER_FEE,
                ban: false,
            },
            _ => LateFee {
                amount: SECOND_TIER_FEE,
                ban: true,
            },
        }
    }

    /// Assess a scheduled checkout against `now`.
    pub fn assess(&self, scheduled_checkout_at: Timestamp, now: Timestamp) -> LateAssessment {
        let minutes = late_minutes(scheduled_checkout_at, now);
        let fee = self.calculate(minutes);
        LateAssessment {
            late_minutes: minutes,
            late_fee_amount: fee.amount,
            ban_applied: fee.ban,
        }
    }
}

/// Whole minutes past `scheduled`, floored, never negative.
pub fn late_minutes(scheduled: Timestamp, now: Timestamp) -> i64 {
    let seconds = (now - scheduled).num_seconds();
    if seconds <= 0 {
        0
    } else {
        seconds / 60
    }
}
