//! Donation records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ActorId, AssetId, DisasterId, DonationId, PoolId};

/// Where a donation was directed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum DonationTarget {
    /// Direct to a verified beneficiary.
    Beneficiary(ActorId),
    /// Into a fund pool for weighted distribution.
    Pool(PoolId),
}

/// Immutable receipt of one donation, written once at donation time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DonationRecord {
    pub id: DonationId,
    pub donor: ActorId,
    pub target: DonationTarget,
    pub disaster: DisasterId,
    pub asset: AssetId,

    /// Gross amount given by the donor.
    pub amount: u64,
    /// Platform fee taken out of the gross amount.
    pub fee_charged: u64,
    /// Amount reaching the target. `amount - fee_charged`.
    pub net_amount: u64,

    pub is_anonymous: bool,
    pub message: Option<String>,

    pub donated_at: DateTime<Utc>,
}
